use std::sync::Arc;

use aerodex::{
    AeroDexConfig, AppState, AuditSink, AviationClient, SurrealAuditSink, TracingAuditSink,
    logging, web,
};
use anyhow::{Context, Result};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AeroDexConfig::load().context("Failed to load configuration")?;
    logging::init(&config.logging);

    tracing::info!("Starting AeroDex {}", aerodex::VERSION);

    let audit: Arc<dyn AuditSink> = match &config.audit.url {
        Some(url) => Arc::new(
            SurrealAuditSink::connect(url, &config.audit)
                .await
                .context("Failed to connect to the audit store")?,
        ),
        None => {
            tracing::warn!("No audit store configured, audit entries go to the log");
            Arc::new(TracingAuditSink)
        }
    };

    let client =
        AviationClient::new(&config.upstream).context("Failed to create upstream HTTP client")?;
    let state = Arc::new(AppState::new(client, audit, &config.server.asset_dir));

    let app = web::app(state, &config.server.allowed_origin)?;
    web::run(app, &config.listen_addr()).await
}
