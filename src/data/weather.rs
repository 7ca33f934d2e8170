//! Live weather from the free Open-Meteo API (no key required).
//!
//! API: `https://api.open-meteo.com/v1/forecast`
//! Requests `current_weather` for temperature, wind, and the WMO code,
//! plus the `hourly` precipitation series; the precipitation reported is
//! the hourly value whose hour matches the current-weather timestamp.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Timelike};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::WeatherSource;
use crate::config::WeatherConfig;
use crate::types::{Coordinates, CurrentWeather, TrafficError};

/// Open-Meteo's local time format (`2026-10-18T14:00`).
const API_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

// ---------------------------------------------------------------------------
// Open-Meteo response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    current_weather: Option<OpenMeteoCurrent>,
    #[serde(default)]
    hourly: Option<OpenMeteoHourly>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoCurrent {
    #[serde(default)]
    temperature: f64,
    #[serde(default)]
    windspeed: f64,
    #[serde(default)]
    weathercode: i32,
    #[serde(default)]
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoHourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenMeteoClient {
    http: Client,
    api_url: String,
    timezone: String,
}

impl OpenMeteoClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, TrafficError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("jakarta-traffic/0.1.0")
            .build()
            .map_err(|e| TrafficError::Config(format!("Failed to build weather HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            timezone: config.timezone.clone(),
        })
    }

    fn error(coords: Coordinates, message: impl Into<String>) -> TrafficError {
        TrafficError::Weather {
            location: format!("{:.4},{:.4}", coords.latitude, coords.longitude),
            message: message.into(),
        }
    }

    /// Turn a decoded response into current conditions.
    fn extract(resp: OpenMeteoResponse) -> Option<CurrentWeather> {
        let current = resp.current_weather?;

        let current_hour = current
            .time
            .as_deref()
            .and_then(|t| NaiveDateTime::parse_from_str(t, API_TIME_FORMAT).ok())
            .map(|t| t.hour());

        let precipitation = match (current_hour, resp.hourly) {
            (Some(hour), Some(hourly)) => hourly
                .time
                .iter()
                .position(|t| {
                    NaiveDateTime::parse_from_str(t, API_TIME_FORMAT)
                        .map(|parsed| parsed.hour() == hour)
                        .unwrap_or(false)
                })
                .and_then(|i| hourly.precipitation.get(i).copied().flatten())
                .unwrap_or(0.0),
            _ => 0.0,
        };

        Some(CurrentWeather {
            temperature: current.temperature,
            precipitation: precipitation.max(0.0),
            windspeed: current.windspeed.max(0.0),
            weather_code: current.weathercode,
        })
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch_current(&self, coords: Coordinates) -> Result<CurrentWeather, TrafficError> {
        let latitude = coords.latitude.to_string();
        let longitude = coords.longitude.to_string();
        let query = [
            ("latitude", latitude.as_str()),
            ("longitude", longitude.as_str()),
            ("current_weather", "true"),
            ("hourly", "precipitation"),
            ("timezone", self.timezone.as_str()),
            ("forecast_days", "1"),
        ];

        let resp = self
            .http
            .get(&self.api_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() { "request timed out" } else { "request failed" };
                Self::error(coords, format!("{kind}: {e}"))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(Self::error(coords, format!("Open-Meteo API error: {status}")));
        }

        let data: OpenMeteoResponse = resp
            .json()
            .await
            .map_err(|e| Self::error(coords, format!("Failed to parse Open-Meteo response: {e}")))?;

        let weather = Self::extract(data)
            .ok_or_else(|| Self::error(coords, "response has no current_weather block"))?;

        debug!(
            latitude = coords.latitude,
            longitude = coords.longitude,
            code = weather.weather_code,
            precipitation = weather.precipitation,
            "Open-Meteo conditions fetched"
        );
        Ok(weather)
    }

    fn name(&self) -> &'static str {
        "open-meteo"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
