//! `AeroDex` - aviation data for AI assistant plugins
//!
//! This library proxies airport, METAR/TAF, PIREP, SIGMET/AIRMET, winds aloft
//! and forecast discussion data from public providers, reshapes it lightly,
//! and keeps an audit trail of every handled request.

pub mod advisory;
pub mod api;
pub mod audit;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod web;

// Re-export core types for public API
pub use advisory::{Advisories, split};
pub use api::{AppState, Operation};
pub use audit::{
    AuditLogEntry, AuditSink, MemoryAuditSink, RequestContext, SurrealAuditSink, TracingAuditSink,
};
pub use client::AviationClient;
pub use config::AeroDexConfig;
pub use error::AeroDexError;
pub use models::{AirmetReport, DistanceRange, MetarWithTaf, SigmetReport, WindsQuery, WindsReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, AeroDexError>;
