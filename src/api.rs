//! Plugin data endpoints
//!
//! Each route reads its fields from a JSON body, calls the matching
//! [`AviationClient`] operation and answers with the JSON result. Failures of
//! any kind become a 500 carrying only the route's fixed message. Every
//! handled request is handed to the audit sink in the background.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::audit::{self, AuditSink, RequestContext};
use crate::client::AviationClient;
use crate::models::{DistanceRange, WindsQuery};
use crate::{AeroDexError, Result};

/// Shared, read-only state handed to every handler
pub struct AppState {
    pub client: AviationClient,
    pub audit: Arc<dyn AuditSink>,
    pub asset_dir: PathBuf,
}

impl AppState {
    pub fn new(
        client: AviationClient,
        audit: Arc<dyn AuditSink>,
        asset_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            audit,
            asset_dir: asset_dir.into(),
        }
    }
}

/// The data operations exposed to the plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AirportData,
    StationsMetar,
    MetarWithTaf,
    PirepsNearStation,
    PirepsWithinRange,
    Sigmets,
    Airmets,
    ForecastDiscussion,
    WindsAloft,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::AirportData,
        Operation::StationsMetar,
        Operation::MetarWithTaf,
        Operation::PirepsNearStation,
        Operation::PirepsWithinRange,
        Operation::Sigmets,
        Operation::Airmets,
        Operation::ForecastDiscussion,
        Operation::WindsAloft,
    ];

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Operation::AirportData => "/airport-data",
            Operation::StationsMetar => "/multiple-stations-metar",
            Operation::MetarWithTaf => "/metar-with-taf",
            Operation::PirepsNearStation => "/get-pireps-standard",
            Operation::PirepsWithinRange => "/get-pireps-within-range",
            Operation::Sigmets => "/get-sigmet",
            Operation::Airmets => "/get-airmet",
            Operation::ForecastDiscussion => "/forecast-discussion",
            Operation::WindsAloft => "/get-winds-aloft",
        }
    }

    /// Body of the 500 response; never includes the underlying cause
    #[must_use]
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::AirportData => "Error occurred while fetching airport data",
            Operation::StationsMetar | Operation::MetarWithTaf => {
                "Error occurred while fetching metar data"
            }
            Operation::PirepsNearStation | Operation::PirepsWithinRange => {
                "Error occurred while fetching pireps"
            }
            Operation::Sigmets => "Error occurred while getting Sigmets",
            Operation::Airmets => "Error occurred while getting Airmets",
            Operation::ForecastDiscussion => "Error occurred while fetching forecast discussion",
            Operation::WindsAloft => "Error occurred while fetching winds aloft",
        }
    }
}

/// An inbound plugin request: its body, read leniently, and its audit context
pub struct PluginRequest {
    pub body: Value,
    pub context: RequestContext,
}

impl<S: Send + Sync> FromRequest<S> for PluginRequest {
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let context = RequestContext::capture(req.method(), req.uri(), req.headers());
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        // Missing or malformed bodies are recorded as null and fail field lookup later
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        Ok(Self { body, context })
    }
}

impl PluginRequest {
    /// Read a required body field
    pub fn field<T: DeserializeOwned>(&self, name: &'static str) -> Result<T> {
        match self.body.get(name) {
            None | Some(Value::Null) => Err(AeroDexError::input_missing(name)),
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|_| AeroDexError::input_missing(name))
            }
        }
    }

    /// Read an optional body field; present but mistyped is still an error
    pub fn optional_field<T: DeserializeOwned>(&self, name: &'static str) -> Result<Option<T>> {
        match self.body.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.field(name).map(Some),
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(Operation::AirportData.path(), post(airport_data))
        .route(Operation::StationsMetar.path(), post(stations_metar))
        .route(Operation::MetarWithTaf.path(), post(metar_with_taf))
        .route(Operation::PirepsNearStation.path(), post(pireps_near_station))
        .route(Operation::PirepsWithinRange.path(), post(pireps_within_range))
        .route(Operation::Sigmets.path(), post(sigmets))
        .route(Operation::Airmets.path(), post(airmets))
        .route(Operation::ForecastDiscussion.path(), post(forecast_discussion))
        .route(Operation::WindsAloft.path(), post(winds_aloft))
}

async fn airport_data(State(state): State<Arc<AppState>>, request: PluginRequest) -> Response {
    let result = async {
        let city: String = request.field("city")?;
        state.client.airport_data(&city).await
    }
    .await;
    respond(&state, Operation::AirportData, request, result)
}

async fn stations_metar(State(state): State<Arc<AppState>>, request: PluginRequest) -> Response {
    let result = async {
        let stations: Vec<String> = request.field("stations")?;
        state.client.stations_metar(&stations).await
    }
    .await;
    respond(&state, Operation::StationsMetar, request, result)
}

async fn metar_with_taf(State(state): State<Arc<AppState>>, request: PluginRequest) -> Response {
    let result = async {
        let stations: Vec<String> = request.field("stations")?;
        state.client.metar_with_taf(&stations).await
    }
    .await;
    respond(&state, Operation::MetarWithTaf, request, result)
}

async fn pireps_near_station(
    State(state): State<Arc<AppState>>,
    request: PluginRequest,
) -> Response {
    let result = async {
        let station: String = request.field("station")?;
        state.client.pireps_near_station(&station).await
    }
    .await;
    respond(&state, Operation::PirepsNearStation, request, result)
}

async fn pireps_within_range(
    State(state): State<Arc<AppState>>,
    request: PluginRequest,
) -> Response {
    let result = async {
        let station: String = request.field("station")?;
        let range: DistanceRange = request.field("range")?;
        state.client.pireps_within_distance(&station, &range).await
    }
    .await;
    respond(&state, Operation::PirepsWithinRange, request, result)
}

async fn sigmets(State(state): State<Arc<AppState>>, request: PluginRequest) -> Response {
    let result = state.client.sigmets().await;
    respond(&state, Operation::Sigmets, request, result)
}

async fn airmets(State(state): State<Arc<AppState>>, request: PluginRequest) -> Response {
    let result = state.client.airmets().await;
    respond(&state, Operation::Airmets, request, result)
}

async fn forecast_discussion(
    State(state): State<Arc<AppState>>,
    request: PluginRequest,
) -> Response {
    let result = async {
        let code: String = request.field("code")?;
        state.client.forecast_discussion(&code).await
    }
    .await;
    respond(&state, Operation::ForecastDiscussion, request, result)
}

async fn winds_aloft(State(state): State<Arc<AppState>>, request: PluginRequest) -> Response {
    let result = async {
        let defaults = WindsQuery::default();
        let query = WindsQuery {
            region: request.optional_field("region")?.unwrap_or(defaults.region),
            level: request.optional_field("level")?.unwrap_or(defaults.level),
            fcst: request.optional_field("fcst")?.unwrap_or(defaults.fcst),
        };
        state.client.winds_aloft(&query).await
    }
    .await;
    respond(&state, Operation::WindsAloft, request, result)
}

/// Turn an operation result into the client response and queue its audit entry
fn respond<T: Serialize>(
    state: &AppState,
    operation: Operation,
    request: PluginRequest,
    result: Result<T>,
) -> Response {
    let endpoint = operation.path();
    let caller_error = matches!(&result, Err(e) if !e.is_upstream());

    let outcome = match result {
        Ok(data) => serde_json::to_value(data).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let (status, captured, response) = match outcome {
        Ok(value) => {
            info!(endpoint, "Request handled");
            (StatusCode::OK, value.clone(), Json(value).into_response())
        }
        Err(cause) => {
            if caller_error {
                warn!(endpoint, error = %cause, "Rejected incomplete request");
            } else {
                error!(endpoint, error = %cause, "Request failed");
            }
            let message = operation.failure_message();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Value::String(message.to_string()),
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response(),
            )
        }
    };

    audit::spawn_record(&state.audit, request.context, request.body, status, captured);

    response
}
