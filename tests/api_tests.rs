//! End-to-end tests of the plugin HTTP surface against a mocked upstream

use std::sync::Arc;
use std::time::Duration;

use aerodex::audit::{AuditError, AuditLogEntry, AuditSink};
use aerodex::config::UpstreamConfig;
use aerodex::{AppState, AviationClient, MemoryAuditSink, web};
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const ORIGIN: &str = "https://chat.openai.com";

struct FailingSink;

#[async_trait]
impl AuditSink for FailingSink {
    async fn record(&self, _entry: AuditLogEntry) -> Result<(), AuditError> {
        Err(AuditError::Write("store unavailable".to_string()))
    }
}

fn build_app(
    server: &MockServer,
    audit: Arc<dyn AuditSink>,
    asset_dir: &std::path::Path,
) -> Router {
    let client = AviationClient::new(&UpstreamConfig {
        weather_base_url: server.base_url(),
        airports_base_url: server.base_url(),
        api_key: Some("test-key".to_string()),
        timeout_seconds: Some(5),
    })
    .unwrap();
    let state = Arc::new(AppState::new(client, audit, asset_dir));
    web::app(state, ORIGIN).unwrap()
}

async fn send(app: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn wait_for_entries(sink: &MemoryAuditSink, count: usize) -> Vec<AuditLogEntry> {
    for _ in 0..100 {
        let entries = sink.entries();
        if entries.len() >= count {
            return entries;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    sink.entries()
}

#[tokio::test]
async fn test_wrong_method_on_data_route_is_not_implemented() {
    let server = MockServer::start_async().await;
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(MemoryAuditSink::new()), assets.path());

    let (status, body) = send(&app, "PUT", "/airport-data", None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body, "Method PUT not implemented for path /airport-data");
}

#[tokio::test]
async fn test_unknown_path_is_not_implemented() {
    let server = MockServer::start_async().await;
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(MemoryAuditSink::new()), assets.path());

    let (status, body) = send(&app, "GET", "/winds", None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert!(body.contains("GET"));
    assert!(body.contains("/winds"));
}

#[tokio::test]
async fn test_get_sigmet_returns_only_sigmets() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/data/airsigmet")
                .query_param("format", "decoded");
            then.status(200)
                .body("SIGMET for A\nSIGMET for B\nAIRMET for C");
        })
        .await;
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(MemoryAuditSink::new()), assets.path());

    let (status, body) = send(&app, "POST", "/get-sigmet", None).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value, json!({"sigmets": ["SIGMET for A\n", "SIGMET for B\n"]}));

    let (status, body) = send(&app, "POST", "/get-airmet", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value, json!({"airmets": ["AIRMET for C"]}));
}

#[tokio::test]
async fn test_metar_with_taf_combines_both_reports() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/data/metar")
                .query_param("ids", "KJFK")
                .query_param("format", "decoded");
            then.status(200).body("METAR KJFK decoded");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/data/metar")
                .query_param("ids", "KJFK")
                .query_param("taf", "on");
            then.status(200).body("Data at: 1200 UTC\nKJFK 121151Z\nTAF KJFK");
        })
        .await;
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(MemoryAuditSink::new()), assets.path());

    let body = Some(json!({"stations": ["jfk"]}));
    let (status, body) = send(&app, "POST", "/metar-with-taf", body).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["metar"], "METAR KJFK decoded");
    assert_eq!(value["taf"], "KJFK 121151Z\nTAF KJFK");
}

#[tokio::test]
async fn test_upstream_failure_hides_detail() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/data/metar");
            then.status(500).body("stack trace: upstream database exploded");
        })
        .await;
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(MemoryAuditSink::new()), assets.path());

    let (status, body) = send(
        &app,
        "POST",
        "/multiple-stations-metar",
        Some(json!({"stations": ["KJFK"]})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Error occurred while fetching metar data");
    assert!(!body.contains("exploded"));
}

#[tokio::test]
async fn test_partial_metar_with_taf_is_a_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/data/metar")
                .query_param("format", "decoded");
            then.status(200).body("METAR KJFK decoded");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/data/metar").query_param("taf", "on");
            then.status(503);
        })
        .await;
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(MemoryAuditSink::new()), assets.path());

    let body = Some(json!({"stations": ["KJFK"]}));
    let (status, body) = send(&app, "POST", "/metar-with-taf", body).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.contains("METAR KJFK"));
}

#[tokio::test]
async fn test_missing_field_never_reaches_upstream() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/data/pirep");
            then.status(200).body("PIREP");
        })
        .await;
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(MemoryAuditSink::new()), assets.path());

    let body = Some(json!({"station": "ORD"}));
    let (status, body) = send(&app, "POST", "/get-pireps-within-range", body).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Error occurred while fetching pireps");

    let (status, _) = send(&app, "POST", "/get-pireps-standard", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_handled_request_is_audited() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/data/fcstdisc")
                .query_param("cwa", "KHGX");
            then.status(200).body("AREA FORECAST DISCUSSION");
        })
        .await;
    let sink = MemoryAuditSink::new();
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(sink.clone()), assets.path());

    let request = Request::builder()
        .method("POST")
        .uri("/forecast-discussion")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "plugin-test")
        .header("openai-conversation-id", "conv-42")
        .body(Body::from(json!({"code": "HGX"}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entries = wait_for_entries(&sink, 1).await;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.method, "POST");
    assert_eq!(entry.endpoint, "/forecast-discussion");
    assert_eq!(entry.request_body, json!({"code": "HGX"}));
    assert_eq!(entry.response, json!("AREA FORECAST DISCUSSION"));
    assert_eq!(entry.status, 200);
    assert_eq!(entry.headers.user_agent.as_deref(), Some("plugin-test"));
    assert_eq!(entry.headers.conversation_id.as_deref(), Some("conv-42"));
}

#[tokio::test]
async fn test_failed_request_is_audited_with_its_message() {
    let server = MockServer::start_async().await;
    let sink = MemoryAuditSink::new();
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(sink.clone()), assets.path());

    let (status, _) = send(&app, "POST", "/airport-data", Some(json!({}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let entries = wait_for_entries(&sink, 1).await;
    assert_eq!(entries[0].status, 500);
    assert_eq!(entries[0].response, json!("Error occurred while fetching airport data"));
}

#[tokio::test]
async fn test_audit_failure_does_not_affect_response() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/airports").query_param("name", "Houston");
            then.status(200).json_body(json!([{"iata": "IAH"}]));
        })
        .await;
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(FailingSink), assets.path());

    let body = Some(json!({"city": "Houston"}));
    let (status, body) = send(&app, "POST", "/airport-data", body).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value, json!([{"iata": "IAH"}]));
}

#[tokio::test]
async fn test_winds_aloft_uses_defaults() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/data/windtemp")
                .query_param("region", "us")
                .query_param("level", "low")
                .query_param("fcst", "12");
            then.status(200).body("FD1US1");
        })
        .await;
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(MemoryAuditSink::new()), assets.path());

    let (status, body) = send(&app, "POST", "/get-winds-aloft", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"winds": "FD1US1"}));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_plugin_assets_are_served() {
    let server = MockServer::start_async().await;
    let assets = TempDir::new().unwrap();
    std::fs::create_dir_all(assets.path().join(".well-known")).unwrap();
    std::fs::write(
        assets.path().join(".well-known").join("ai-plugin.json"),
        r#"{"name_for_model": "aerodex"}"#,
    )
    .unwrap();
    let app = build_app(&server, Arc::new(MemoryAuditSink::new()), assets.path());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/.well-known/ai-plugin.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

    // No openapi.yaml in this asset directory
    let (status, body) = send(&app, "GET", "/openapi.yaml", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "An error occurred while reading the file.");
}

#[tokio::test]
async fn test_cors_allows_only_the_plugin_origin() {
    let server = MockServer::start_async().await;
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(MemoryAuditSink::new()), assets.path());

    let preflight = |origin: &'static str| {
        Request::builder()
            .method("OPTIONS")
            .uri("/get-sigmet")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    };

    let allowed = app.clone().oneshot(preflight(ORIGIN)).await.unwrap();
    assert_eq!(allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);

    let denied = app.clone().oneshot(preflight("https://evil.example")).await.unwrap();
    assert!(denied.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_pireps_routes_forward_station_and_range() {
    let server = MockServer::start_async().await;
    let standard = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/data/pirep")
                .query_param("id", "KORD")
                .query_param("format", "decoded")
                .query_param_missing("distance");
            then.status(200).body("UA /OV ORD");
        })
        .await;
    let ranged = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/data/pirep")
                .query_param("id", "KORD")
                .query_param("format", "decoded")
                .query_param("distance", "40");
            then.status(200).body("UA /OV ORD090040");
        })
        .await;
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(MemoryAuditSink::new()), assets.path());

    let body = Some(json!({"station": "ord"}));
    let (status, body) = send(&app, "POST", "/get-pireps-standard", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!("UA /OV ORD"));

    let body = Some(json!({"station": "KORD", "range": "40"}));
    let (status, body) = send(&app, "POST", "/get-pireps-within-range", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!("UA /OV ORD090040")
    );

    standard.assert_async().await;
    ranged.assert_async().await;
}

#[tokio::test]
async fn test_logo_is_served_as_png() {
    let server = MockServer::start_async().await;
    let assets = TempDir::new().unwrap();
    let png = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    std::fs::write(assets.path().join("logo.png"), png).unwrap();
    let app = build_app(&server, Arc::new(MemoryAuditSink::new()), assets.path());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/logo.jpg").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), png.as_slice());
}

#[tokio::test]
async fn test_fallbacks_and_assets_are_audited() {
    let server = MockServer::start_async().await;
    let sink = MemoryAuditSink::new();
    let assets = TempDir::new().unwrap();
    let app = build_app(&server, Arc::new(sink.clone()), assets.path());

    let (status, _) = send(&app, "PUT", "/airport-data", None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    let (status, _) = send(&app, "GET", "/logo.jpg", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let mut entries = wait_for_entries(&sink, 2).await;
    assert_eq!(entries.len(), 2);
    entries.sort_by(|a, b| a.method.cmp(&b.method));

    assert_eq!(entries[0].method, "GET");
    assert_eq!(entries[0].endpoint, "/logo.jpg");
    assert_eq!(entries[0].status, 500);
    assert_eq!(
        entries[0].response,
        json!("An error occurred while reading the file.")
    );

    assert_eq!(entries[1].method, "PUT");
    assert_eq!(entries[1].endpoint, "/airport-data");
    assert_eq!(entries[1].status, 501);
    assert_eq!(
        entries[1].response,
        json!("Method PUT not implemented for path /airport-data")
    );
}
