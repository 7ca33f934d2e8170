//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The simulation tables (hourly volume, rain impact, condition bands,
//! peak windows) are validated once at load time and then passed by
//! value (or `Arc`) into each component; nothing reads them globally.

use anyhow::{Context, Result};
use rand::Rng;
use serde::Deserialize;
use std::fs;

use crate::types::{Coordinates, RainCategory, TrafficCondition, TrafficError};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    pub locations: Vec<LocationConfig>,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between live simulation cycles.
    pub cycle_interval_secs: u64,
    /// Run the historical backfill at startup when no traffic rows exist.
    pub backfill_on_empty: bool,
    pub historical_days: u32,
    pub interval_minutes: u32,
    /// Flush the pending traffic batch once it reaches this many rows.
    pub traffic_flush_rows: usize,
    pub weather_flush_rows: usize,
    /// Log backfill progress every N traffic rows.
    pub progress_every: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 300,
            backfill_on_empty: true,
            historical_days: 30,
            interval_minutes: 15,
            traffic_flush_rows: 5000,
            weather_flush_rows: 1000,
            progress_every: 10_000,
        }
    }
}

/// A monitored road point.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LocationConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationConfig {
    pub fn new(name: &str, latitude: f64, longitude: f64) -> Self {
        Self { name: name.to_string(), latitude, longitude }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates { latitude: self.latitude, longitude: self.longitude }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_url: String,
    pub timezone: String,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            timezone: "Asia/Jakarta".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// `sqlite://path.db`, `sqlite::memory:`, or `memory` for the
    /// non-persistent in-process store.
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { database_url: "sqlite://traffic.db".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { enabled: true, port: 8080 }
    }
}

// ---------------------------------------------------------------------------
// Simulation tables
// ---------------------------------------------------------------------------

/// Closed interval `[low, high]` sampled uniformly.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct UniformRange {
    pub low: f64,
    pub high: f64,
}

impl UniformRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// A degenerate range that always yields `value`.
    pub const fn fixed(value: f64) -> Self {
        Self { low: value, high: value }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.high <= self.low {
            self.low
        } else {
            rng.gen_range(self.low..=self.high)
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Both ends finite and ordered, so `sample` cannot panic.
    pub fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low <= self.high
    }
}

/// Rain category → traffic multiplier.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RainImpact {
    pub none: f64,
    pub light: f64,
    pub moderate: f64,
    pub heavy: f64,
    pub extreme: f64,
}

impl Default for RainImpact {
    fn default() -> Self {
        Self { none: 1.0, light: 1.2, moderate: 1.4, heavy: 1.6, extreme: 2.0 }
    }
}

impl RainImpact {
    pub fn factor(&self, category: RainCategory) -> f64 {
        match category {
            RainCategory::None => self.none,
            RainCategory::Light => self.light,
            RainCategory::Moderate => self.moderate,
            RainCategory::Heavy => self.heavy,
            RainCategory::Extreme => self.extreme,
        }
    }
}

/// Vehicle-count band `[low, high)` for one congestion label.
/// `high = None` leaves the band open-ended.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ConditionBand {
    pub condition: TrafficCondition,
    pub low: u32,
    #[serde(default)]
    pub high: Option<u32>,
}

impl ConditionBand {
    pub fn new(condition: TrafficCondition, low: u32, high: Option<u32>) -> Self {
        Self { condition, low, high }
    }

    pub fn contains(&self, vehicles: u32) -> bool {
        vehicles >= self.low && self.high.map_or(true, |h| vehicles < h)
    }
}

/// Half-open hour window `[start, end)`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start && hour < self.end
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct SpeedConfig {
    pub min_kmh: f64,
    pub max_kmh: f64,
    /// Uniform noise amplitude added to every speed.
    pub noise_kmh: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self { min_kmh: 5.0, max_kmh: 60.0, noise_kmh: 3.0 }
    }
}

/// Rain chance for an inclusive hour span `start..=end`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct RainWindow {
    pub start: u32,
    pub end: u32,
    pub probability: f64,
}

/// One rain intensity tier. A draw below `cumulative` selects the tier.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct IntensityTier {
    pub category: RainCategory,
    pub cumulative: f64,
    pub precipitation_mm: UniformRange,
}

/// Temperature range for an inclusive hour span `start..=end`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TemperatureBand {
    pub start: u32,
    pub end: u32,
    pub celsius: UniformRange,
}

/// Parameters of the synthetic weather used for historical backfill.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RainModel {
    /// Checked in order; the first window containing the hour wins.
    pub windows: Vec<RainWindow>,
    pub baseline_probability: f64,
    pub probability_scale: f64,
    pub tiers: Vec<IntensityTier>,
    /// Checked in order; hours outside every band use `night_celsius`.
    pub temperature_bands: Vec<TemperatureBand>,
    pub night_celsius: UniformRange,
    pub windspeed_kmh: UniformRange,
}

impl Default for RainModel {
    fn default() -> Self {
        Self {
            windows: vec![
                RainWindow { start: 6, end: 10, probability: 0.45 },
                RainWindow { start: 15, end: 18, probability: 0.40 },
                RainWindow { start: 0, end: 5, probability: 0.10 },
            ],
            baseline_probability: 0.15,
            probability_scale: 1.2,
            tiers: vec![
                IntensityTier {
                    category: RainCategory::Light,
                    cumulative: 0.5,
                    precipitation_mm: UniformRange::new(0.5, 2.5),
                },
                IntensityTier {
                    category: RainCategory::Moderate,
                    cumulative: 0.8,
                    precipitation_mm: UniformRange::new(2.5, 7.0),
                },
                IntensityTier {
                    category: RainCategory::Heavy,
                    cumulative: 0.95,
                    precipitation_mm: UniformRange::new(7.0, 15.0),
                },
                IntensityTier {
                    category: RainCategory::Extreme,
                    cumulative: 1.0,
                    precipitation_mm: UniformRange::new(15.0, 30.0),
                },
            ],
            temperature_bands: vec![
                TemperatureBand { start: 5, end: 10, celsius: UniformRange::new(25.0, 29.0) },
                TemperatureBand { start: 10, end: 15, celsius: UniformRange::new(29.0, 33.0) },
                TemperatureBand { start: 15, end: 20, celsius: UniformRange::new(27.0, 31.0) },
            ],
            night_celsius: UniformRange::new(24.0, 28.0),
            windspeed_kmh: UniformRange::new(5.0, 25.0),
        }
    }
}

/// Everything the traffic generator and analytics need to agree on.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Baseline vehicle volume indexed by hour of day.
    pub base_volume: Vec<u32>,
    /// Volume for hours missing from `base_volume`.
    pub default_volume: u32,
    pub location_variance: UniformRange,
    pub weekday_variance: UniformRange,
    pub weekend_variance: UniformRange,
    pub rain_impact: RainImpact,
    /// Ordered bands; first match wins, `TrafficCondition::WORST` otherwise.
    pub condition_bands: Vec<ConditionBand>,
    pub peak_morning: HourWindow,
    pub peak_evening: HourWindow,
    pub speed: SpeedConfig,
    pub rain_model: RainModel,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_volume: vec![
                40, 30, 25, 25, 40, 90, 160, 200, 190, 150, 120, 115, // 00–11
                125, 120, 115, 130, 170, 210, 195, 160, 130, 100, 75, 55, // 12–23
            ],
            default_volume: 100,
            location_variance: UniformRange::new(0.8, 1.2),
            weekday_variance: UniformRange::new(0.9, 1.1),
            weekend_variance: UniformRange::new(0.6, 0.85),
            rain_impact: RainImpact::default(),
            condition_bands: vec![
                ConditionBand::new(TrafficCondition::Smooth, 0, Some(80)),
                ConditionBand::new(TrafficCondition::Moderate, 80, Some(150)),
                ConditionBand::new(TrafficCondition::Dense, 150, Some(200)),
                ConditionBand::new(TrafficCondition::Jammed, 200, None),
            ],
            peak_morning: HourWindow { start: 6, end: 9 },
            peak_evening: HourWindow { start: 16, end: 19 },
            speed: SpeedConfig::default(),
            rain_model: RainModel::default(),
        }
    }
}

impl SimulationConfig {
    pub fn base_volume_for(&self, hour: u32) -> u32 {
        self.base_volume
            .get(hour as usize)
            .copied()
            .unwrap_or(self.default_volume)
    }

    pub fn rain_factor(&self, category: RainCategory) -> f64 {
        self.rain_impact.factor(category)
    }

    /// First band containing `vehicles`, else the worst label.
    pub fn condition_for(&self, vehicles: u32) -> TrafficCondition {
        self.condition_bands
            .iter()
            .find(|band| band.contains(vehicles))
            .map(|band| band.condition)
            .unwrap_or(TrafficCondition::WORST)
    }

    pub fn is_peak_hour(&self, hour: u32) -> bool {
        self.peak_morning.contains(hour) || self.peak_evening.contains(hour)
    }

    /// Reject tables the generator cannot interpret unambiguously.
    pub fn validate(&self) -> Result<(), TrafficError> {
        let bands = &self.condition_bands;
        if bands.is_empty() {
            return Err(TrafficError::Config("condition_bands must not be empty".into()));
        }
        if bands[0].low != 0 {
            return Err(TrafficError::Config(format!(
                "condition bands leave a gap below {} (first band must start at 0)",
                bands[0].low
            )));
        }
        for (i, band) in bands.iter().enumerate() {
            let is_last = i + 1 == bands.len();
            match band.high {
                Some(high) if high <= band.low => {
                    return Err(TrafficError::Config(format!(
                        "condition band {} has high {} <= low {}",
                        band.condition, high, band.low
                    )));
                }
                None if !is_last => {
                    return Err(TrafficError::Config(format!(
                        "only the last condition band may be open-ended ({})",
                        band.condition
                    )));
                }
                _ => {}
            }
            if let Some(next) = bands.get(i + 1) {
                if band.high != Some(next.low) {
                    let kind = if band.high.map_or(true, |h| h > next.low) { "overlap" } else { "gap" };
                    return Err(TrafficError::Config(format!(
                        "condition bands {} and {} {kind} at {}",
                        band.condition, next.condition, next.low
                    )));
                }
            }
        }

        for category in RainCategory::ALL {
            let factor = self.rain_factor(*category);
            if factor.is_nan() || factor < 1.0 {
                return Err(TrafficError::Config(format!(
                    "rain impact for {category} must be >= 1.0, got {factor}"
                )));
            }
        }

        let speed = &self.speed;
        if !(speed.min_kmh >= 0.0 && speed.min_kmh <= speed.max_kmh) || speed.noise_kmh < 0.0 {
            return Err(TrafficError::Config(format!(
                "invalid speed envelope: min {} max {} noise {}",
                speed.min_kmh, speed.max_kmh, speed.noise_kmh
            )));
        }

        for (name, range) in [
            ("location_variance", &self.location_variance),
            ("weekday_variance", &self.weekday_variance),
            ("weekend_variance", &self.weekend_variance),
        ] {
            if !(range.is_valid() && range.low > 0.0) {
                return Err(TrafficError::Config(format!(
                    "{name} must be finite with 0 < low <= high, got [{}, {}]",
                    range.low, range.high
                )));
            }
        }

        for (name, window) in [("peak_morning", &self.peak_morning), ("peak_evening", &self.peak_evening)] {
            if window.start > window.end || window.end > 24 {
                return Err(TrafficError::Config(format!(
                    "{name} window [{}, {}) is not within a day",
                    window.start, window.end
                )));
            }
        }

        self.rain_model.validate()
    }
}

impl RainModel {
    fn validate(&self) -> Result<(), TrafficError> {
        let probs = self
            .windows
            .iter()
            .map(|w| w.probability)
            .chain(std::iter::once(self.baseline_probability));
        for p in probs {
            if !(0.0..=1.0).contains(&p) {
                return Err(TrafficError::Config(format!("rain probability {p} outside [0, 1]")));
            }
        }
        if !(self.probability_scale.is_finite() && self.probability_scale >= 0.0) {
            return Err(TrafficError::Config("probability_scale must be finite and >= 0".into()));
        }
        if self.tiers.is_empty() {
            return Err(TrafficError::Config("rain model needs at least one intensity tier".into()));
        }
        let mut previous = 0.0;
        for tier in &self.tiers {
            if tier.category == RainCategory::None || tier.cumulative.is_nan() || tier.cumulative < previous {
                return Err(TrafficError::Config(format!(
                    "intensity tiers must be rainy and ascending (at {})",
                    tier.category
                )));
            }
            previous = tier.cumulative;
        }

        let ranges = self
            .tiers
            .iter()
            .map(|t| ("precipitation_mm", t.precipitation_mm))
            .chain(self.temperature_bands.iter().map(|b| ("temperature_bands.celsius", b.celsius)))
            .chain([("night_celsius", self.night_celsius), ("windspeed_kmh", self.windspeed_kmh)]);
        for (name, range) in ranges {
            if !range.is_valid() {
                return Err(TrafficError::Config(format!(
                    "{name} range [{}, {}] must be finite with low <= high",
                    range.low, range.high
                )));
            }
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file: {path}"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TrafficError> {
        if self.locations.is_empty() {
            return Err(TrafficError::Config("at least one location is required".into()));
        }
        if !(1..=1440).contains(&self.engine.interval_minutes) {
            return Err(TrafficError::Config(format!(
                "interval_minutes must be within 1..=1440, got {}",
                self.engine.interval_minutes
            )));
        }
        self.simulation.validate()
    }
}
