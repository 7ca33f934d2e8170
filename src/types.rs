//! Shared types for the traffic engine.
//!
//! These types form the data model used across all modules: the two
//! observation kinds that flow generator → storage → analytics, the
//! categorical vocabularies they carry, and the domain error type.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire and storage format for observation timestamps (second precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Rain category
// ---------------------------------------------------------------------------

/// Discrete rainfall intensity tier, ordered from dry to extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RainCategory {
    None,
    Light,
    Moderate,
    Heavy,
    Extreme,
}

impl RainCategory {
    /// All categories in ascending intensity.
    pub const ALL: &'static [RainCategory] = &[
        RainCategory::None,
        RainCategory::Light,
        RainCategory::Moderate,
        RainCategory::Heavy,
        RainCategory::Extreme,
    ];

    /// Bucket a stored rain multiplier back into a category.
    ///
    /// Boundaries are inclusive on the upper bound: 1.3 is `Light`.
    /// This reads the model's multiplier, not measured rainfall, so a
    /// configured multiplier can land in a different tier than the one
    /// that produced it.
    pub fn from_factor(factor: f64) -> Self {
        if factor <= 1.0 {
            RainCategory::None
        } else if factor <= 1.3 {
            RainCategory::Light
        } else if factor <= 1.6 {
            RainCategory::Moderate
        } else if factor <= 1.8 {
            RainCategory::Heavy
        } else {
            RainCategory::Extreme
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RainCategory::None => "none",
            RainCategory::Light => "light",
            RainCategory::Moderate => "moderate",
            RainCategory::Heavy => "heavy",
            RainCategory::Extreme => "extreme",
        }
    }

    pub fn is_rain(&self) -> bool {
        *self != RainCategory::None
    }
}

impl fmt::Display for RainCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RainCategory {
    type Err = TrafficError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(RainCategory::None),
            "light" => Ok(RainCategory::Light),
            "moderate" => Ok(RainCategory::Moderate),
            "heavy" => Ok(RainCategory::Heavy),
            "extreme" => Ok(RainCategory::Extreme),
            other => Err(TrafficError::InvalidInput(format!("unknown rain category: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Traffic condition
// ---------------------------------------------------------------------------

/// Congestion label, ordered from free-flowing to jammed.
///
/// Serialized with the local labels used on the road network's signage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrafficCondition {
    #[serde(rename = "Lancar")]
    Smooth,
    #[serde(rename = "Sedang")]
    Moderate,
    #[serde(rename = "Padat")]
    Dense,
    #[serde(rename = "Macet")]
    Jammed,
}

impl TrafficCondition {
    pub const ALL: &'static [TrafficCondition] = &[
        TrafficCondition::Smooth,
        TrafficCondition::Moderate,
        TrafficCondition::Dense,
        TrafficCondition::Jammed,
    ];

    /// The worst label; also the fallback when no band matches.
    pub const WORST: TrafficCondition = TrafficCondition::Jammed;

    pub fn label(&self) -> &'static str {
        match self {
            TrafficCondition::Smooth => "Lancar",
            TrafficCondition::Moderate => "Sedang",
            TrafficCondition::Dense => "Padat",
            TrafficCondition::Jammed => "Macet",
        }
    }
}

impl fmt::Display for TrafficCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for TrafficCondition {
    type Err = TrafficError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrafficCondition::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| TrafficError::InvalidInput(format!("unknown traffic condition: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Data source
// ---------------------------------------------------------------------------

/// Provenance tag for a traffic observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    HistoricalGenerated,
    RealTimeSimulated,
    Simulated,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::HistoricalGenerated => "historical_generated",
            DataSource::RealTimeSimulated => "real_time_simulated",
            DataSource::Simulated => "simulated",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataSource {
    type Err = TrafficError;

    /// Unrecognised tags map to `Simulated`, the storage default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "historical_generated" => DataSource::HistoricalGenerated,
            "real_time_simulated" => DataSource::RealTimeSimulated,
            _ => DataSource::Simulated,
        })
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// One modeled traffic reading for a location at a point in time.
///
/// The hour of day is not stored separately: `hour()` derives it from
/// `timestamp`, and storage writes that value into its own `hour`
/// column at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficObservation {
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub location: String,
    pub vehicle_count: u32,
    pub condition: TrafficCondition,
    pub speed_kmh: f64,
    pub is_peak: bool,
    /// Congestion amplification from rain; 1.0 means no rain effect.
    pub rain_factor: f64,
    pub data_source: DataSource,
}

impl TrafficObservation {
    /// Hour of day (0–23) taken from the timestamp.
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    /// Day of week, Monday = 0.
    pub fn day_of_week(&self) -> u32 {
        self.timestamp.weekday().num_days_from_monday()
    }

    pub fn is_weekend(&self) -> bool {
        self.day_of_week() >= 5
    }

    pub fn is_rainy(&self) -> bool {
        self.rain_factor > 1.0
    }
}

/// One weather reading for a location, live or synthesized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub location: String,
    pub temperature: f64,
    /// Millimetres in the current hour.
    pub precipitation: f64,
    pub windspeed: f64,
    pub weather_code: i32,
    pub weather_desc: String,
    pub rain_category: RainCategory,
}

/// Raw current conditions returned by a weather source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub precipitation: f64,
    pub windspeed: f64,
    pub weather_code: i32,
}

/// Geographic position of a monitored road point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Which record kind a storage operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Traffic,
    Weather,
}

impl RecordKind {
    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::Traffic => "traffic_data",
            RecordKind::Weather => "weather_data",
        }
    }
}

/// Truncate a timestamp to whole seconds.
pub fn to_second_precision(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the traffic engine.
#[derive(Debug, thiserror::Error)]
pub enum TrafficError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Weather source error ({location}): {message}")]
    Weather { location: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No traffic data available")]
    NoData,

    #[error("No historical data for {location} at {hour:02}:00")]
    NoHistoricalData { location: String, hour: u32 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for TrafficError {
    fn from(e: sqlx::Error) -> Self {
        TrafficError::Storage(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
