//! Weather inputs for the traffic model.
//!
//! Defines the `WeatherSource` trait (live conditions per location),
//! the weather-code classifier, the Open-Meteo client, and the
//! synthetic weather used for historical backfill.

pub mod classify;
pub mod synthetic;
pub mod weather;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::types::{Coordinates, CurrentWeather, TrafficError};

/// Abstraction over live weather providers.
///
/// Failures (connectivity, timeout, malformed payload) are returned as
/// `TrafficError::Weather`; callers decide whether they are fatal.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch current conditions at the given coordinates.
    async fn fetch_current(&self, coords: Coordinates) -> Result<CurrentWeather, TrafficError>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}
