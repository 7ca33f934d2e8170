//! Synthetic weather for historical backfill.
//!
//! Draws a plausible rain tier, precipitation amount, and temperature
//! for an hour of day without consulting any live source. Rain is most
//! likely during the morning and late-afternoon windows and least
//! likely overnight.

use rand::Rng;

use crate::config::RainModel;
use crate::types::{round_to, RainCategory};

/// One synthesized hour of weather, shared by every location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedWeather {
    pub precipitation: f64,
    pub rain_category: RainCategory,
    pub temperature: f64,
}

pub struct RainSimulator {
    model: RainModel,
}

impl RainSimulator {
    pub fn new(model: RainModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &RainModel {
        &self.model
    }

    /// Probability of rain at `hour` after scaling.
    pub fn rain_probability(&self, hour: u32) -> f64 {
        let base = self
            .model
            .windows
            .iter()
            .find(|w| hour >= w.start && hour <= w.end)
            .map(|w| w.probability)
            .unwrap_or(self.model.baseline_probability);
        base * self.model.probability_scale
    }

    /// Synthesize weather for `hour`. `day_of_week` (Monday = 0) is
    /// accepted for callers that key their cache by day; the current
    /// model does not vary by weekday.
    pub fn simulate<R: Rng + ?Sized>(&self, rng: &mut R, hour: u32, _day_of_week: u32) -> SimulatedWeather {
        let (rain_category, precipitation) = if rng.gen::<f64>() < self.rain_probability(hour) {
            let intensity = rng.gen::<f64>();
            let tier = self
                .model
                .tiers
                .iter()
                .find(|t| intensity < t.cumulative)
                .or_else(|| self.model.tiers.last());
            match tier {
                Some(tier) => (tier.category, round_to(tier.precipitation_mm.sample(rng), 2)),
                None => (RainCategory::None, 0.0),
            }
        } else {
            (RainCategory::None, 0.0)
        };

        let celsius = self
            .model
            .temperature_bands
            .iter()
            .find(|b| hour >= b.start && hour <= b.end)
            .map(|b| b.celsius)
            .unwrap_or(self.model.night_celsius);

        SimulatedWeather {
            precipitation,
            rain_category,
            temperature: round_to(celsius.sample(rng), 1),
        }
    }

    /// Wind speed for a synthesized weather row.
    pub fn windspeed<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        round_to(self.model.windspeed_kmh.sample(rng), 1)
    }
}
