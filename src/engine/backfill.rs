//! Historical backfill.
//!
//! Walks a date range at a fixed sampling interval and generates one
//! traffic observation per location per step. Weather is synthesized
//! once per hour of each day and shared by every location and every
//! step within that hour; one weather row per (hour, location) is kept.
//! Rows are flushed to storage in bounded batches, so a storage failure
//! leaves earlier batches persisted.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::generator::TrafficGenerator;
use crate::config::{EngineConfig, LocationConfig};
use crate::data::classify::{classify, representative_code};
use crate::data::synthetic::{RainSimulator, SimulatedWeather};
use crate::storage::RecordStore;
use crate::types::{TrafficError, TrafficObservation, WeatherObservation};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Inclusive date range sampled every `interval_minutes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval_minutes: u32,
}

impl BackfillRange {
    pub fn new(start: NaiveDate, end: NaiveDate, interval_minutes: u32) -> Self {
        Self { start, end, interval_minutes }
    }

    /// `days` days back from `now`'s date through today. Steps after
    /// `now` are dropped at run time.
    pub fn trailing_days(now: NaiveDateTime, days: u32, interval_minutes: u32) -> Self {
        let today = now.date();
        Self {
            start: today - Duration::days(i64::from(days)),
            end: today,
            interval_minutes,
        }
    }

    pub fn days(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start).num_days() as usize + 1
        }
    }

    fn steps_per_day(&self) -> usize {
        MINUTES_PER_DAY.div_ceil(self.interval_minutes.max(1)) as usize
    }

    fn validate(&self) -> Result<(), TrafficError> {
        if !(1..=MINUTES_PER_DAY).contains(&self.interval_minutes) {
            return Err(TrafficError::InvalidInput(format!(
                "interval_minutes must be within 1..=1440, got {}",
                self.interval_minutes
            )));
        }
        Ok(())
    }
}

/// Rows written by one backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    pub traffic_rows: usize,
    pub weather_rows: usize,
}

pub struct BackfillDriver {
    generator: TrafficGenerator,
    rain: RainSimulator,
    store: Arc<dyn RecordStore>,
    locations: Vec<LocationConfig>,
    traffic_flush_rows: usize,
    weather_flush_rows: usize,
    progress_every: usize,
}

impl BackfillDriver {
    pub fn new(
        generator: TrafficGenerator,
        rain: RainSimulator,
        store: Arc<dyn RecordStore>,
        locations: Vec<LocationConfig>,
    ) -> Self {
        let defaults = EngineConfig::default();
        Self {
            generator,
            rain,
            store,
            locations,
            traffic_flush_rows: defaults.traffic_flush_rows,
            weather_flush_rows: defaults.weather_flush_rows,
            progress_every: defaults.progress_every,
        }
    }

    /// Take batch sizes and progress cadence from the engine section.
    pub fn with_engine_config(mut self, engine: &EngineConfig) -> Self {
        self.traffic_flush_rows = engine.traffic_flush_rows.max(1);
        self.weather_flush_rows = engine.weather_flush_rows.max(1);
        self.progress_every = engine.progress_every.max(1);
        self
    }

    /// Generate and persist every step of `range` up to `now`.
    pub async fn run<R: Rng + ?Sized>(
        &self,
        range: BackfillRange,
        now: NaiveDateTime,
        rng: &mut R,
    ) -> Result<BackfillSummary, TrafficError> {
        range.validate()?;

        let expected = range.days() * range.steps_per_day() * self.locations.len();
        info!(
            start = %range.start,
            end = %range.end,
            interval_minutes = range.interval_minutes,
            locations = self.locations.len(),
            expected_rows = expected,
            "Starting historical backfill"
        );

        let step = Duration::minutes(i64::from(range.interval_minutes));
        let mut summary = BackfillSummary::default();
        let mut traffic: Vec<TrafficObservation> = Vec::with_capacity(self.traffic_flush_rows);
        let mut weather: Vec<WeatherObservation> = Vec::with_capacity(self.weather_flush_rows);

        for day in range.start.iter_days().take_while(|d| *d <= range.end) {
            let day_of_week = day.weekday().num_days_from_monday();
            let mut hourly: HashMap<u32, SimulatedWeather> = HashMap::new();
            let mut at = day.and_time(NaiveTime::MIN);

            while at.date() == day && at <= now {
                let hour = at.hour();
                let conditions = match hourly.get(&hour).copied() {
                    Some(w) => w,
                    None => {
                        let drawn = self.rain.simulate(rng, hour, day_of_week);
                        hourly.insert(hour, drawn);
                        for location in &self.locations {
                            weather.push(self.weather_row(rng, at, &location.name, &drawn));
                        }
                        drawn
                    }
                };

                for location in &self.locations {
                    traffic.push(self.generator.historical(rng, at, &location.name, conditions.rain_category));
                    summary.traffic_rows += 1;
                    if summary.traffic_rows % self.progress_every == 0 {
                        info!(
                            generated = summary.traffic_rows,
                            expected,
                            "Backfill progress"
                        );
                    }
                }

                if traffic.len() >= self.traffic_flush_rows {
                    self.flush_traffic(&mut traffic).await?;
                }
                if weather.len() >= self.weather_flush_rows {
                    summary.weather_rows += self.flush_weather(&mut weather).await?;
                }

                at += step;
            }
        }

        self.flush_traffic(&mut traffic).await?;
        summary.weather_rows += self.flush_weather(&mut weather).await?;

        info!(
            traffic_rows = summary.traffic_rows,
            weather_rows = summary.weather_rows,
            "Historical backfill complete"
        );
        Ok(summary)
    }

    fn weather_row<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        timestamp: NaiveDateTime,
        location: &str,
        drawn: &SimulatedWeather,
    ) -> WeatherObservation {
        let weather_code = representative_code(drawn.rain_category);
        WeatherObservation {
            timestamp,
            location: location.to_string(),
            temperature: drawn.temperature,
            precipitation: drawn.precipitation,
            windspeed: self.rain.windspeed(rng),
            weather_code,
            weather_desc: classify(weather_code).description.to_string(),
            rain_category: drawn.rain_category,
        }
    }

    async fn flush_traffic(&self, batch: &mut Vec<TrafficObservation>) -> Result<(), TrafficError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.store.insert_traffic(batch).await?;
        debug!(rows = batch.len(), "Flushed traffic batch");
        batch.clear();
        Ok(())
    }

    async fn flush_weather(&self, batch: &mut Vec<WeatherObservation>) -> Result<usize, TrafficError> {
        if batch.is_empty() {
            return Ok(0);
        }
        self.store.insert_weather(batch).await?;
        let n = batch.len();
        debug!(rows = n, "Flushed weather batch");
        batch.clear();
        Ok(n)
    }
}
