//! Upstream aviation data client
//!
//! Thin wrapper over the aviation weather provider and the airport directory.
//! Every operation is one outbound call (two for METAR+TAF) with no retry and
//! no caching; non-2xx responses surface as [`crate::AeroDexError::Upstream`].

use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::advisory::{self, Advisories};
use crate::config::UpstreamConfig;
use crate::models::{
    AirmetReport, DistanceRange, MetarWithTaf, SigmetReport, WindsQuery, WindsReport,
    normalize_station, station_ids,
};
use crate::{AeroDexError, Result};

/// Client for the weather provider and the airport directory
#[derive(Debug, Clone)]
pub struct AviationClient {
    client: Client,
    weather_base_url: String,
    airports_base_url: String,
    api_key: Option<String>,
}

impl AviationClient {
    /// Create a new client from the upstream settings
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let mut builder =
            Client::builder().user_agent(concat!("AeroDex/", env!("CARGO_PKG_VERSION")));
        if let Some(seconds) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let client = builder.build().map_err(AeroDexError::client_build)?;

        Ok(Self {
            client,
            weather_base_url: config.weather_base_url.trim_end_matches('/').to_string(),
            airports_base_url: config.airports_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Look up airport directory records by city name
    #[instrument(skip(self))]
    pub async fn airport_data(&self, city: &str) -> Result<Value> {
        let url = format!(
            "{}/v1/airports?name={}",
            self.airports_base_url,
            urlencoding::encode(city)
        );

        let mut request = self.client.get(&url);
        if let Some(api_key) = &self.api_key {
            request = request.header("X-Api-Key", api_key);
        }

        let start_time = Instant::now();
        let data: Value = request.send().await?.error_for_status()?.json().await?;
        info!(
            "Fetched airport data in {:.3}s",
            start_time.elapsed().as_secs_f64()
        );
        Ok(data)
    }

    /// Decoded METAR for every station
    #[instrument(skip(self))]
    pub async fn stations_metar(&self, stations: &[String]) -> Result<String> {
        let ids = station_ids(stations);
        self.get_text(&format!(
            "{}/api/data/metar?ids={}&format=decoded",
            self.weather_base_url,
            urlencoding::encode(&ids)
        ))
        .await
    }

    /// Decoded METAR plus raw TAF, fetched in parallel.
    ///
    /// Fails as a whole when either request fails.
    #[instrument(skip(self))]
    pub async fn metar_with_taf(&self, stations: &[String]) -> Result<MetarWithTaf> {
        let ids = urlencoding::encode(&station_ids(stations)).into_owned();
        let metar_url = format!(
            "{}/api/data/metar?ids={ids}&format=decoded",
            self.weather_base_url
        );
        let taf_url = format!("{}/api/data/metar?ids={ids}&taf=on", self.weather_base_url);

        let (metar, taf) = futures::try_join!(self.get_text(&metar_url), self.get_text(&taf_url))?;

        Ok(MetarWithTaf {
            metar,
            taf: strip_first_line(&taf),
        })
    }

    /// Decoded PIREPs reported around a station
    #[instrument(skip(self))]
    pub async fn pireps_near_station(&self, station: &str) -> Result<String> {
        self.get_text(&format!(
            "{}/api/data/pirep?id={}&format=decoded",
            self.weather_base_url,
            urlencoding::encode(&normalize_station(station))
        ))
        .await
    }

    /// Decoded PIREPs within `range` nautical miles of a station
    #[instrument(skip(self))]
    pub async fn pireps_within_distance(
        &self,
        station: &str,
        range: &DistanceRange,
    ) -> Result<String> {
        self.get_text(&format!(
            "{}/api/data/pirep?id={}&format=decoded&distance={}",
            self.weather_base_url,
            urlencoding::encode(&normalize_station(station)),
            urlencoding::encode(&range.to_string())
        ))
        .await
    }

    /// Active SIGMETs
    pub async fn sigmets(&self) -> Result<SigmetReport> {
        let Advisories { sigmets, airmets } = self.advisories().await?;
        debug!("Discarding {} AIRMETs", airmets.len());
        Ok(SigmetReport { sigmets })
    }

    /// Active AIRMETs
    pub async fn airmets(&self) -> Result<AirmetReport> {
        let Advisories { sigmets, airmets } = self.advisories().await?;
        debug!("Discarding {} SIGMETs", sigmets.len());
        Ok(AirmetReport { airmets })
    }

    /// Both advisory kinds, split out of the provider's combined document
    #[instrument(skip(self))]
    pub async fn advisories(&self) -> Result<Advisories> {
        let text = self
            .get_text(&format!(
                "{}/api/data/airsigmet?format=decoded",
                self.weather_base_url
            ))
            .await?;

        let advisories = advisory::split(&text);
        info!(
            "Split advisories into {} SIGMETs and {} AIRMETs",
            advisories.sigmets.len(),
            advisories.airmets.len()
        );
        Ok(advisories)
    }

    /// Area forecast discussion for a forecast office
    #[instrument(skip(self))]
    pub async fn forecast_discussion(&self, code: &str) -> Result<String> {
        self.get_text(&format!(
            "{}/api/data/fcstdisc?cwa={}&type=afd",
            self.weather_base_url,
            urlencoding::encode(&normalize_station(code))
        ))
        .await
    }

    /// Winds and temperatures aloft forecast
    #[instrument(skip(self))]
    pub async fn winds_aloft(&self, query: &WindsQuery) -> Result<WindsReport> {
        let winds = self
            .get_text(&format!(
                "{}/api/data/windtemp?region={}&level={}&fcst={}",
                self.weather_base_url,
                urlencoding::encode(&query.region),
                urlencoding::encode(&query.level),
                urlencoding::encode(&query.fcst)
            ))
            .await?;
        Ok(WindsReport { winds })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        debug!("Upstream request URL: {}", url);
        let start_time = Instant::now();

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response
            .error_for_status()
            .inspect_err(|_| warn!("Upstream responded with {}", status))?
            .text()
            .await?;

        let elapsed = start_time.elapsed();
        if elapsed.as_secs() > 5 {
            warn!("Slow upstream response: {:.3}s", elapsed.as_secs_f64());
        }
        debug!("Received {} bytes in {:.3}s", body.len(), elapsed.as_secs_f64());
        Ok(body)
    }
}

/// Drop the header line the provider puts in front of TAF listings
#[must_use]
pub fn strip_first_line(text: &str) -> String {
    text.split('\n').skip(1).collect::<Vec<_>>().join("\n")
}
