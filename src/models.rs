//! Request and response shapes shared by the client and the HTTP layer

use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalize an airport identifier the way the weather provider expects it.
///
/// Three-letter codes are US identifiers missing their `K` prefix.
#[must_use]
pub fn normalize_station(code: &str) -> String {
    let code = code.trim().to_uppercase();
    if code.chars().count() == 3 {
        format!("K{code}")
    } else {
        code
    }
}

/// Join a list of stations into the comma separated `ids` parameter
#[must_use]
pub fn station_ids(stations: &[String]) -> String {
    stations
        .iter()
        .map(|s| normalize_station(s))
        .collect::<Vec<_>>()
        .join(",")
}

/// A search radius, forwarded verbatim whether the caller sent a number or a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DistanceRange {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for DistanceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceRange::Number(n) => write!(f, "{n}"),
            DistanceRange::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<u32> for DistanceRange {
    fn from(value: u32) -> Self {
        DistanceRange::Number(value.into())
    }
}

/// Combined METAR and TAF text for a set of stations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetarWithTaf {
    pub metar: String,
    pub taf: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigmetReport {
    pub sigmets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirmetReport {
    pub airmets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindsReport {
    pub winds: String,
}

/// Winds aloft selection; every field falls back to the provider's low-level US chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindsQuery {
    #[serde(default = "default_winds_region")]
    pub region: String,
    #[serde(default = "default_winds_level")]
    pub level: String,
    #[serde(default = "default_winds_forecast")]
    pub fcst: String,
}

fn default_winds_region() -> String {
    "us".to_string()
}

fn default_winds_level() -> String {
    "low".to_string()
}

fn default_winds_forecast() -> String {
    "12".to_string()
}

impl Default for WindsQuery {
    fn default() -> Self {
        Self {
            region: default_winds_region(),
            level: default_winds_level(),
            fcst: default_winds_forecast(),
        }
    }
}
