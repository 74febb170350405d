//! Audit trail of handled plugin requests
//!
//! Every handled request produces one [`AuditLogEntry`], handed to an
//! [`AuditSink`] by [`spawn_record`] without the client response waiting on
//! it. Sinks:
//! - [`SurrealAuditSink`]: document store, local (`mem://`) or remote (`ws://`, `wss://`)
//! - [`TracingAuditSink`]: writes entries to the log when no store is configured
//! - [`MemoryAuditSink`]: keeps entries in memory, for tests

use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, Method, StatusCode, Uri, request::Parts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::AuditConfig;

/// Errors that can occur while recording an audit entry
#[derive(Error, Debug)]
pub enum AuditError {
    /// Store connection error
    #[error("Audit store connection failed: {0}")]
    Connection(String),

    /// Store write error
    #[error("Audit store write failed: {0}")]
    Write(String),
}

impl From<surrealdb::Error> for AuditError {
    fn from(err: surrealdb::Error) -> Self {
        AuditError::Write(err.to_string())
    }
}

/// Request headers kept in the audit trail
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditHeaders {
    pub host: Option<String>,
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub conversation_id: Option<String>,
    pub ephemeral_user_id: Option<String>,
}

impl AuditHeaders {
    /// Pick the audited headers out of a request
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        Self {
            host: get("host"),
            user_agent: get("user-agent"),
            platform: get("sec-ch-ua-platform"),
            conversation_id: get("openai-conversation-id"),
            ephemeral_user_id: get("openai-ephemeral-user-id"),
        }
    }
}

/// What is known about a request before its handler runs
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub endpoint: String,
    pub headers: AuditHeaders,
    started: Instant,
}

impl RequestContext {
    #[must_use]
    pub fn capture(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        Self {
            method: method.clone(),
            endpoint: uri.path().to_string(),
            headers: AuditHeaders::from_headers(headers),
            started: Instant::now(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::capture(&parts.method, &parts.uri, &parts.headers))
    }
}

/// One handled request, as written to the audit store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub method: String,
    pub endpoint: String,
    pub request_body: Value,
    pub headers: AuditHeaders,
    pub response: Value,
    pub status: u16,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Append-only destination for audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditLogEntry) -> Result<(), AuditError>;
}

/// Build the entry for a finished request and record it in the background.
///
/// Sink failures are logged and never reach the caller.
pub fn spawn_record(
    sink: &Arc<dyn AuditSink>,
    context: RequestContext,
    request_body: Value,
    status: StatusCode,
    response: Value,
) {
    let entry = AuditLogEntry {
        method: context.method.to_string(),
        endpoint: context.endpoint,
        request_body,
        headers: context.headers,
        response,
        status: status.as_u16(),
        duration_ms: u64::try_from(context.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        timestamp: Utc::now(),
    };

    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        let endpoint = entry.endpoint.clone();
        if let Err(e) = sink.record(entry).await {
            warn!(%endpoint, error = %e, "Failed to record audit entry");
        }
    });
}

/// Document store sink
#[derive(Clone)]
pub struct SurrealAuditSink {
    db: Surreal<Any>,
    table: String,
}

impl SurrealAuditSink {
    /// Connect to the store described by `config`.
    ///
    /// Signs in as root when both a username and a password are configured.
    #[instrument(skip(config), fields(namespace = %config.namespace, database = %config.database))]
    pub async fn connect(url: &str, config: &AuditConfig) -> Result<Self, AuditError> {
        info!("Connecting to audit store");

        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| AuditError::Connection(format!("Failed to connect to {url}: {e}")))?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root {
                username,
                password,
            })
            .await
            .map_err(|e| AuditError::Connection(format!("Root authentication failed: {e}")))?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                AuditError::Connection(format!("Failed to select namespace/database: {e}"))
            })?;

        info!("Audit store connected");
        Ok(Self {
            db,
            table: config.table.clone(),
        })
    }
}

#[async_trait]
impl AuditSink for SurrealAuditSink {
    async fn record(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        self.db
            .query("CREATE type::table($table) CONTENT $entry")
            .bind(("table", self.table.clone()))
            .bind(("entry", entry))
            .await?
            .check()?;
        Ok(())
    }
}

/// Sink used when no audit store is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        let entry = serde_json::to_string(&entry).map_err(|e| AuditError::Write(e.to_string()))?;
        debug!(target: "aerodex::audit", %entry, "audit entry");
        Ok(())
    }
}

/// Sink that keeps every entry in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditLogEntry>>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded entries
    #[must_use]
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .map_err(|e| AuditError::Write(e.to_string()))?
            .push(entry);
        Ok(())
    }
}
