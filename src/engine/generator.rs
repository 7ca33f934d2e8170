//! Rule-based traffic model.
//!
//! Turns (time, location, rain) into a traffic observation:
//! hourly baseline volume × location variance × (backfill only) day
//! variance × rain multiplier, then a congestion label from the
//! condition bands and a speed that drops with both volume and rain.
//! Variance and speed noise are drawn from the caller's RNG; pass a seeded
//! RNG to reproduce a run.

use chrono::{Datelike, NaiveDateTime, Timelike};
use rand::Rng;
use std::sync::Arc;

use crate::config::SimulationConfig;
use crate::types::{round_to, to_second_precision, DataSource, RainCategory, TrafficObservation};

pub struct TrafficGenerator {
    config: Arc<SimulationConfig>,
}

impl TrafficGenerator {
    pub fn new(config: Arc<SimulationConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Observation for historical backfill: applies weekday/weekend
    /// variance on top of location variance.
    pub fn historical<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        timestamp: NaiveDateTime,
        location: &str,
        rain: RainCategory,
    ) -> TrafficObservation {
        let location_var = self.config.location_variance.sample(rng);
        let day_range = if timestamp.weekday().num_days_from_monday() >= 5 {
            self.config.weekend_variance
        } else {
            self.config.weekday_variance
        };
        let day_var = day_range.sample(rng);
        let rain_factor = self.config.rain_factor(rain);
        self.build(rng, timestamp, location, location_var * day_var, rain_factor, DataSource::HistoricalGenerated)
    }

    /// Observation for a live cycle. Missing weather means no rain effect.
    pub fn live<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        timestamp: NaiveDateTime,
        location: &str,
        rain: Option<RainCategory>,
    ) -> TrafficObservation {
        let location_var = self.config.location_variance.sample(rng);
        let rain_factor = rain.map_or(1.0, |r| self.config.rain_factor(r));
        self.build(rng, timestamp, location, location_var, rain_factor, DataSource::RealTimeSimulated)
    }

    fn build<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        timestamp: NaiveDateTime,
        location: &str,
        variance: f64,
        rain_factor: f64,
        data_source: DataSource,
    ) -> TrafficObservation {
        let timestamp = to_second_precision(timestamp);
        let hour = timestamp.hour();
        let rain_factor = rain_factor.max(1.0);

        let base = f64::from(self.config.base_volume_for(hour));
        let vehicle_count = (base * variance * rain_factor).max(0.0) as u32;

        TrafficObservation {
            timestamp,
            location: location.to_string(),
            vehicle_count,
            condition: self.config.condition_for(vehicle_count),
            speed_kmh: self.speed(rng, vehicle_count, rain_factor),
            is_peak: self.config.is_peak_hour(hour),
            rain_factor,
            data_source,
        }
    }

    /// Speed in km/h: volume and rain both slow traffic; clamped to the
    /// configured envelope and rounded to one decimal.
    pub fn speed<R: Rng + ?Sized>(&self, rng: &mut R, vehicle_count: u32, rain_factor: f64) -> f64 {
        let envelope = &self.config.speed;
        let mut speed = envelope.max_kmh - f64::from(vehicle_count) / 10.0;
        speed /= rain_factor.max(1.0);
        if envelope.noise_kmh > 0.0 {
            speed += rng.gen_range(-envelope.noise_kmh..=envelope.noise_kmh);
        }
        round_to(speed.clamp(envelope.min_kmh, envelope.max_kmh), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConditionBand, SpeedConfig, UniformRange};
    use crate::types::TrafficCondition;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        // October 2026: the 19th is a Monday, the 17th a Saturday.
        NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn generator(config: SimulationConfig) -> TrafficGenerator {
        TrafficGenerator::new(Arc::new(config))
    }

    fn no_variance() -> SimulationConfig {
        SimulationConfig {
            location_variance: UniformRange::fixed(1.0),
            weekday_variance: UniformRange::fixed(1.0),
            weekend_variance: UniformRange::fixed(1.0),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_heavy_rain_scenario() {
        let config = SimulationConfig {
            base_volume: vec![100; 24],
            condition_bands: vec![
                ConditionBand::new(TrafficCondition::Smooth, 0, Some(80)),
                ConditionBand::new(TrafficCondition::Moderate, 80, Some(150)),
                ConditionBand::new(TrafficCondition::Dense, 150, Some(200)),
                ConditionBand::new(TrafficCondition::Jammed, 200, None),
            ],
            ..no_variance()
        };
        assert_eq!(config.rain_factor(RainCategory::Heavy), 1.6);

        let gen = generator(config);
        let mut rng = StdRng::seed_from_u64(1);
        let obs = gen.historical(&mut rng, at(19, 12), "Semanggi", RainCategory::Heavy);
        assert_eq!(obs.vehicle_count, 160);
        assert_eq!(obs.condition, TrafficCondition::Dense);
        assert_eq!(obs.condition.label(), "Padat");
        assert_eq!(obs.rain_factor, 1.6);
        assert_eq!(obs.data_source, DataSource::HistoricalGenerated);
    }

    #[test]
    fn test_speed_without_noise() {
        let config = SimulationConfig {
            speed: SpeedConfig { noise_kmh: 0.0, ..SpeedConfig::default() },
            ..no_variance()
        };
        let gen = generator(config);
        let mut rng = StdRng::seed_from_u64(1);
        // (60 - 16) / 1.6 = 27.5
        assert_eq!(gen.speed(&mut rng, 160, 1.6), 27.5);
        // (60 - 100) is negative: clamped to the minimum.
        assert_eq!(gen.speed(&mut rng, 1000, 1.0), 5.0);
        assert_eq!(gen.speed(&mut rng, 0, 1.0), 60.0);
    }

    #[test]
    fn test_generated_invariants_hold() {
        let gen = generator(SimulationConfig::default());
        let cfg = gen.config().clone();
        let mut rng = StdRng::seed_from_u64(99);
        for day in 12..=25 {
            for hour in 0..24 {
                for rain in RainCategory::ALL {
                    let obs = gen.historical(&mut rng, at(day, hour), "Tomang", *rain);
                    assert_eq!(obs.condition, cfg.condition_for(obs.vehicle_count));
                    assert!(obs.speed_kmh >= cfg.speed.min_kmh && obs.speed_kmh <= cfg.speed.max_kmh);
                    assert!(obs.rain_factor >= 1.0);
                    assert_eq!(obs.is_peak, cfg.is_peak_hour(hour));
                    assert_eq!(obs.hour(), hour);
                }
            }
        }
    }

    #[test]
    fn test_weekend_is_lighter() {
        let config = SimulationConfig {
            location_variance: UniformRange::fixed(1.0),
            ..SimulationConfig::default()
        };
        let gen = generator(config);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let weekday = gen.historical(&mut rng, at(19, 8), "Kuningan", RainCategory::None);
            let weekend = gen.historical(&mut rng, at(17, 8), "Kuningan", RainCategory::None);
            // base 190: weekday >= 0.9 * 190, weekend <= 0.85 * 190
            assert!(weekday.vehicle_count >= 171);
            assert!(weekend.vehicle_count <= 161);
        }
    }

    #[test]
    fn test_live_without_weather_has_no_rain_effect() {
        let gen = generator(no_variance());
        let mut rng = StdRng::seed_from_u64(8);
        let obs = gen.live(&mut rng, at(19, 7), "Cawang", None);
        assert_eq!(obs.rain_factor, 1.0);
        assert_eq!(obs.vehicle_count, 200);
        assert!(obs.is_peak);
        assert_eq!(obs.data_source, DataSource::RealTimeSimulated);

        let rainy = gen.live(&mut rng, at(19, 7), "Cawang", Some(RainCategory::Light));
        assert_eq!(rainy.rain_factor, 1.2);
        assert_eq!(rainy.vehicle_count, 240);
    }

    #[test]
    fn test_live_ignores_weekday_variance() {
        let config = SimulationConfig {
            weekend_variance: UniformRange::fixed(0.5),
            ..no_variance()
        };
        let gen = generator(config);
        let mut rng = StdRng::seed_from_u64(2);
        let obs = gen.live(&mut rng, at(17, 12), "Sudirman", None);
        assert_eq!(obs.vehicle_count, 125);
    }

    #[test]
    fn test_timestamp_truncated_to_seconds() {
        let gen = generator(no_variance());
        let mut rng = StdRng::seed_from_u64(2);
        let ts = at(19, 9).with_nanosecond(123_456_789).unwrap();
        let obs = gen.live(&mut rng, ts, "Sudirman", None);
        assert_eq!(obs.timestamp.nanosecond(), 0);
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let gen = generator(SimulationConfig::default());
        let mut a = StdRng::seed_from_u64(2024);
        let mut b = StdRng::seed_from_u64(2024);
        for hour in 0..24 {
            assert_eq!(
                gen.historical(&mut a, at(20, hour), "Tomang", RainCategory::Moderate),
                gen.historical(&mut b, at(20, hour), "Tomang", RainCategory::Moderate),
            );
        }
    }
}
