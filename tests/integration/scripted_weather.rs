//! Scripted weather source for integration testing.
//!
//! Returns fixed conditions for every location except those marked as
//! failing, and counts calls. No network access.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use jakarta_traffic::data::WeatherSource;
use jakarta_traffic::types::{Coordinates, CurrentWeather, TrafficError};

pub struct ScriptedWeather {
    conditions: CurrentWeather,
    failing: Mutex<Vec<Coordinates>>,
    calls: AtomicUsize,
}

impl ScriptedWeather {
    pub fn new(conditions: CurrentWeather) -> Self {
        Self {
            conditions,
            failing: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Light rain everywhere.
    pub fn drizzle() -> Self {
        Self::new(CurrentWeather {
            temperature: 27.3,
            precipitation: 1.4,
            windspeed: 9.5,
            weather_code: 61,
        })
    }

    /// Make every fetch at `coords` time out.
    pub fn fail_at(&self, coords: Coordinates) {
        self.failing.lock().unwrap().push(coords);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for ScriptedWeather {
    async fn fetch_current(&self, coords: Coordinates) -> Result<CurrentWeather, TrafficError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&coords) {
            return Err(TrafficError::Weather {
                location: format!("{},{}", coords.latitude, coords.longitude),
                message: "request timed out".into(),
            });
        }
        Ok(self.conditions)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
