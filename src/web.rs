use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{self, AppState};
use crate::audit::{self, RequestContext};

/// Build the full application: plugin assets, data routes, fallbacks and CORS
pub fn app(state: Arc<AppState>, allowed_origin: &str) -> Result<Router> {
    let origin = HeaderValue::from_str(allowed_origin)
        .with_context(|| format!("Invalid CORS origin: {allowed_origin}"))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/.well-known/ai-plugin.json", get(plugin_manifest))
        .route("/openapi.yaml", get(openapi_schema))
        .route("/logo.jpg", get(logo))
        .merge(api::router())
        .fallback(not_implemented)
        .method_not_allowed_fallback(not_implemented)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    Ok(router)
}

/// Serve until Ctrl-C or SIGTERM, letting in-flight requests finish
pub async fn run(app: Router, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    tracing::info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

async fn plugin_manifest(State(state): State<Arc<AppState>>, context: RequestContext) -> Response {
    let path = state.asset_dir.join(".well-known").join("ai-plugin.json");
    serve_asset(&state, context, path, "application/json").await
}

async fn openapi_schema(State(state): State<Arc<AppState>>, context: RequestContext) -> Response {
    let path = state.asset_dir.join("openapi.yaml");
    serve_asset(&state, context, path, "text/yaml").await
}

async fn logo(State(state): State<Arc<AppState>>, context: RequestContext) -> Response {
    let path = state.asset_dir.join("logo.png");
    serve_asset(&state, context, path, "image/png").await
}

/// Send a file from the asset directory. Text content is kept in the audit entry.
async fn serve_asset(
    state: &AppState,
    context: RequestContext,
    path: PathBuf,
    content_type: &'static str,
) -> Response {
    match tokio::fs::read(&path).await {
        Ok(data) => {
            let captured = String::from_utf8(data.clone()).map_or(Value::Null, Value::String);
            audit::spawn_record(&state.audit, context, Value::Null, StatusCode::OK, captured);
            ([(header::CONTENT_TYPE, content_type)], data).into_response()
        }
        Err(e) => {
            tracing::error!("Error reading file {}: {}", path.display(), e);
            let message = "An error occurred while reading the file.";
            audit::spawn_record(
                &state.audit,
                context,
                Value::Null,
                StatusCode::INTERNAL_SERVER_ERROR,
                Value::String(message.to_string()),
            );
            (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
        }
    }
}

async fn not_implemented(State(state): State<Arc<AppState>>, context: RequestContext) -> Response {
    let message = format!(
        "Method {} not implemented for path {}",
        context.method, context.endpoint
    );
    audit::spawn_record(
        &state.audit,
        context,
        Value::Null,
        StatusCode::NOT_IMPLEMENTED,
        Value::String(message.clone()),
    );
    (StatusCode::NOT_IMPLEMENTED, message).into_response()
}
