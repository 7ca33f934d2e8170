//! Live simulation cycle.
//!
//! One cycle produces exactly one observation per configured location.
//! A location whose weather fetch fails is simulated without rain
//! effect; the cycle itself only fails on storage errors.

use chrono::NaiveDateTime;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

use super::generator::TrafficGenerator;
use crate::config::LocationConfig;
use crate::data::classify::classify;
use crate::data::WeatherSource;
use crate::storage::RecordStore;
use crate::types::{to_second_precision, TrafficError, TrafficObservation, WeatherObservation};

pub struct LiveSimulator {
    generator: TrafficGenerator,
    weather: Arc<dyn WeatherSource>,
    store: Arc<dyn RecordStore>,
    locations: Vec<LocationConfig>,
}

impl LiveSimulator {
    pub fn new(
        generator: TrafficGenerator,
        weather: Arc<dyn WeatherSource>,
        store: Arc<dyn RecordStore>,
        locations: Vec<LocationConfig>,
    ) -> Self {
        Self { generator, weather, store, locations }
    }

    /// Run one cycle stamped at `now`.
    ///
    /// Traffic rows are written in a single batch, followed by the
    /// weather rows for the locations whose fetch succeeded.
    pub async fn run_cycle<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        now: NaiveDateTime,
    ) -> Result<Vec<TrafficObservation>, TrafficError> {
        let now = to_second_precision(now);
        let mut traffic = Vec::with_capacity(self.locations.len());
        let mut weather = Vec::new();

        for location in &self.locations {
            let rain = match self.weather.fetch_current(location.coordinates()).await {
                Ok(current) => {
                    let class = classify(current.weather_code);
                    info!(
                        location = %location.name,
                        temperature = current.temperature,
                        precipitation = current.precipitation,
                        description = class.description,
                        rain = %class.rain_category,
                        "Weather fetched"
                    );
                    weather.push(WeatherObservation {
                        timestamp: now,
                        location: location.name.clone(),
                        temperature: current.temperature,
                        precipitation: current.precipitation,
                        windspeed: current.windspeed,
                        weather_code: current.weather_code,
                        weather_desc: class.description.to_string(),
                        rain_category: class.rain_category,
                    });
                    Some(class.rain_category)
                }
                Err(e) => {
                    warn!(location = %location.name, error = %e, "Weather unavailable, assuming no rain");
                    None
                }
            };

            let obs = self.generator.live(rng, now, &location.name, rain);
            info!(
                location = %obs.location,
                vehicles = obs.vehicle_count,
                condition = %obs.condition,
                speed_kmh = obs.speed_kmh,
                rain_factor = obs.rain_factor,
                "Traffic simulated"
            );
            traffic.push(obs);
        }

        self.store.insert_traffic(&traffic).await?;
        self.store.insert_weather(&weather).await?;
        info!(locations = traffic.len(), weather_rows = weather.len(), "Live cycle stored");
        Ok(traffic)
    }
}
