//! Analytics over the accumulated traffic dataset.
//!
//! Every report reads the traffic rows back from the `RecordStore` and
//! aggregates in memory. An empty dataset is reported as
//! `TrafficError::NoData` rather than computed over.

pub mod stats;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::config::SimulationConfig;
use crate::storage::RecordStore;
use crate::types::{
    round_to, RainCategory, TrafficCondition, TrafficError, TrafficObservation, TIMESTAMP_FORMAT,
};
use stats::{mean, pearson, sample_std_dev, GroupAccumulator};

/// Rows returned by `top_congestion` when no limit is given.
pub const DEFAULT_TOP_N: usize = 10;

/// Confidence attached to every prediction.
pub const PREDICTION_CONFIDENCE: &str = "moderate, based on historical average";

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStats {
    pub total_records: usize,
    pub total_locations: usize,
    pub avg_vehicles: f64,
    pub max_vehicles: u32,
    pub min_vehicles: u32,
    pub avg_speed: f64,
    pub most_common_condition: TrafficCondition,
    pub peak_records: usize,
    pub rainy_records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyStats {
    pub hour: u32,
    pub avg_vehicles: f64,
    pub max_vehicles: u32,
    pub avg_speed: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RainBucketStats {
    pub rain_category: RainCategory,
    pub avg_vehicles: f64,
    pub max_vehicles: u32,
    pub avg_speed: f64,
    pub count: usize,
}

/// Qualitative reading of the rain/volume correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    StrongPositive,
    ModeratePositive,
    WeakPositive,
    Negligible,
}

impl CorrelationStrength {
    /// Undefined coefficients read as negligible.
    pub fn from_coefficient(r: Option<f64>) -> Self {
        match r {
            Some(r) if r >= 0.7 => CorrelationStrength::StrongPositive,
            Some(r) if r >= 0.4 => CorrelationStrength::ModeratePositive,
            Some(r) if r >= 0.2 => CorrelationStrength::WeakPositive,
            _ => CorrelationStrength::Negligible,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            CorrelationStrength::StrongPositive => "Strong positive: rain strongly drives congestion",
            CorrelationStrength::ModeratePositive => "Moderate positive: rain noticeably drives congestion",
            CorrelationStrength::WeakPositive => "Weak positive: rain slightly drives congestion",
            CorrelationStrength::Negligible => "Negligible: rain has little effect on congestion",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RainCorrelation {
    /// Pearson r between `rain_factor` and `vehicle_count`, 3 decimals.
    pub correlation_coefficient: Option<f64>,
    pub strength: CorrelationStrength,
    pub interpretation: String,
    /// Only categories with at least one row, mildest first.
    pub stats_by_category: Vec<RainBucketStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationStats {
    pub location: String,
    pub avg_vehicles: f64,
    pub max_vehicles: u32,
    pub min_vehicles: u32,
    pub avg_speed: f64,
    pub total_records: usize,
    pub jammed_count: usize,
    pub jammed_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub location: String,
    pub target_hour: u32,
    pub predicted_vehicles_min: u32,
    pub predicted_vehicles_avg: u32,
    pub predicted_vehicles_max: u32,
    pub predicted_speed: f64,
    pub predicted_condition: TrafficCondition,
    pub confidence: &'static str,
    pub samples_used: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionStats {
    pub label: &'static str,
    pub avg_vehicles: f64,
    pub avg_speed: f64,
    pub total_records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayWeekend {
    pub weekday: PartitionStats,
    pub weekend: PartitionStats,
}

/// Projection used by the top-congestion and current-status reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficSnapshot {
    pub timestamp: String,
    pub location: String,
    pub vehicle_count: u32,
    pub condition: TrafficCondition,
    pub speed_kmh: f64,
    pub rain_factor: f64,
}

impl From<&TrafficObservation> for TrafficSnapshot {
    fn from(r: &TrafficObservation) -> Self {
        Self {
            timestamp: r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            location: r.location.clone(),
            vehicle_count: r.vehicle_count,
            condition: r.condition,
            speed_kmh: r.speed_kmh,
            rain_factor: r.rain_factor,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct TrafficAnalytics {
    store: Arc<dyn RecordStore>,
    config: Arc<SimulationConfig>,
}

impl TrafficAnalytics {
    /// `config` supplies the condition bands used for predictions.
    pub fn new(store: Arc<dyn RecordStore>, config: Arc<SimulationConfig>) -> Self {
        Self { store, config }
    }

    async fn all_rows(&self) -> Result<Vec<TrafficObservation>, TrafficError> {
        let rows = self.store.traffic_all().await?;
        if rows.is_empty() {
            return Err(TrafficError::NoData);
        }
        debug!(rows = rows.len(), "Loaded traffic rows for analysis");
        Ok(rows)
    }

    pub async fn overall_stats(&self) -> Result<OverallStats, TrafficError> {
        let rows = self.all_rows().await?;

        let mut acc = GroupAccumulator::default();
        let mut conditions: BTreeMap<TrafficCondition, usize> = BTreeMap::new();
        let mut locations: BTreeSet<&str> = BTreeSet::new();
        for r in &rows {
            acc.push(r.vehicle_count, r.speed_kmh);
            *conditions.entry(r.condition).or_default() += 1;
            locations.insert(r.location.as_str());
        }

        // Ties resolve to the alphabetically first label.
        let top = conditions.values().copied().max().unwrap_or(0);
        let most_common_condition = conditions
            .iter()
            .filter(|(_, n)| **n == top)
            .map(|(c, _)| *c)
            .min_by_key(|c| c.label())
            .unwrap_or(TrafficCondition::Smooth);

        Ok(OverallStats {
            total_records: rows.len(),
            total_locations: locations.len(),
            avg_vehicles: round_to(acc.avg_vehicles(), 1),
            max_vehicles: acc.max_vehicles,
            min_vehicles: acc.min_vehicles,
            avg_speed: round_to(acc.avg_speed(), 1),
            most_common_condition,
            peak_records: rows.iter().filter(|r| r.is_peak).count(),
            rainy_records: rows.iter().filter(|r| r.is_rainy()).count(),
        })
    }

    /// Per-hour aggregates, ascending by hour, optionally for one location.
    pub async fn hourly_pattern(&self, location: Option<&str>) -> Result<Vec<HourlyStats>, TrafficError> {
        let rows = match location {
            Some(loc) => self.store.traffic_by_location(loc).await?,
            None => self.store.traffic_all().await?,
        };
        if rows.is_empty() {
            return Err(TrafficError::NoData);
        }

        let mut by_hour: BTreeMap<u32, GroupAccumulator> = BTreeMap::new();
        for r in &rows {
            by_hour.entry(r.hour()).or_default().push(r.vehicle_count, r.speed_kmh);
        }

        Ok(by_hour
            .into_iter()
            .map(|(hour, acc)| HourlyStats {
                hour,
                avg_vehicles: round_to(acc.avg_vehicles(), 1),
                max_vehicles: acc.max_vehicles,
                avg_speed: round_to(acc.avg_speed(), 1),
                count: acc.count,
            })
            .collect())
    }

    pub async fn rain_correlation(&self) -> Result<RainCorrelation, TrafficError> {
        let rows = self.all_rows().await?;

        let mut buckets: BTreeMap<RainCategory, GroupAccumulator> = BTreeMap::new();
        for r in &rows {
            buckets
                .entry(RainCategory::from_factor(r.rain_factor))
                .or_default()
                .push(r.vehicle_count, r.speed_kmh);
        }

        let factors: Vec<f64> = rows.iter().map(|r| r.rain_factor).collect();
        let vehicles: Vec<f64> = rows.iter().map(|r| f64::from(r.vehicle_count)).collect();
        // Classify the exact coefficient; rounding is for display only.
        let coefficient = pearson(&factors, &vehicles);
        let strength = CorrelationStrength::from_coefficient(coefficient);

        Ok(RainCorrelation {
            correlation_coefficient: coefficient.map(|r| round_to(r, 3)),
            strength,
            interpretation: strength.describe().to_string(),
            stats_by_category: buckets
                .into_iter()
                .map(|(rain_category, acc)| RainBucketStats {
                    rain_category,
                    avg_vehicles: round_to(acc.avg_vehicles(), 1),
                    max_vehicles: acc.max_vehicles,
                    avg_speed: round_to(acc.avg_speed(), 1),
                    count: acc.count,
                })
                .collect(),
        })
    }

    /// Per-location aggregates, busiest location first.
    pub async fn location_comparison(&self) -> Result<Vec<LocationStats>, TrafficError> {
        let rows = self.all_rows().await?;

        let mut by_location: BTreeMap<&str, (GroupAccumulator, usize)> = BTreeMap::new();
        for r in &rows {
            let (acc, jammed) = by_location.entry(r.location.as_str()).or_default();
            acc.push(r.vehicle_count, r.speed_kmh);
            if r.condition == TrafficCondition::WORST {
                *jammed += 1;
            }
        }

        let mut stats: Vec<LocationStats> = by_location
            .into_iter()
            .map(|(location, (acc, jammed))| LocationStats {
                location: location.to_string(),
                avg_vehicles: round_to(acc.avg_vehicles(), 1),
                max_vehicles: acc.max_vehicles,
                min_vehicles: acc.min_vehicles,
                avg_speed: round_to(acc.avg_speed(), 1),
                total_records: acc.count,
                jammed_count: jammed,
                jammed_pct: round_to(jammed as f64 / acc.count as f64 * 100.0, 1),
            })
            .collect();
        stats.sort_by(|a, b| b.avg_vehicles.total_cmp(&a.avg_vehicles));
        Ok(stats)
    }

    /// Historical-average estimate for `location` at `target_hour`.
    pub async fn predict(&self, location: &str, target_hour: u32) -> Result<Prediction, TrafficError> {
        if target_hour > 23 {
            return Err(TrafficError::InvalidInput(format!("hour must be 0-23, got {target_hour}")));
        }
        let rows = self.store.traffic_by_location(location).await?;
        if rows.is_empty() {
            return Err(TrafficError::NoData);
        }

        let at_hour: Vec<&TrafficObservation> = rows.iter().filter(|r| r.hour() == target_hour).collect();
        let vehicles: Vec<f64> = at_hour.iter().map(|r| f64::from(r.vehicle_count)).collect();
        let speeds: Vec<f64> = at_hour.iter().map(|r| r.speed_kmh).collect();

        let Some(avg) = mean(&vehicles) else {
            return Err(TrafficError::NoHistoricalData {
                location: location.to_string(),
                hour: target_hour,
            });
        };
        let spread = sample_std_dev(&vehicles);
        let predicted_avg = avg as u32;

        Ok(Prediction {
            location: location.to_string(),
            target_hour,
            predicted_vehicles_min: (avg - spread).max(0.0) as u32,
            predicted_vehicles_avg: predicted_avg,
            predicted_vehicles_max: (avg + spread) as u32,
            predicted_speed: round_to(mean(&speeds).unwrap_or(0.0), 1),
            predicted_condition: self.config.condition_for(predicted_avg),
            confidence: PREDICTION_CONFIDENCE,
            samples_used: at_hour.len(),
        })
    }

    pub async fn weekday_vs_weekend(&self) -> Result<WeekdayWeekend, TrafficError> {
        let rows = self.all_rows().await?;

        let mut weekday = GroupAccumulator::default();
        let mut weekend = GroupAccumulator::default();
        for r in &rows {
            let part = if r.is_weekend() { &mut weekend } else { &mut weekday };
            part.push(r.vehicle_count, r.speed_kmh);
        }

        let summarize = |label: &'static str, acc: &GroupAccumulator| PartitionStats {
            label,
            avg_vehicles: round_to(acc.avg_vehicles(), 1),
            avg_speed: round_to(acc.avg_speed(), 1),
            total_records: acc.count,
        };
        Ok(WeekdayWeekend {
            weekday: summarize("Weekday (Mon-Fri)", &weekday),
            weekend: summarize("Weekend (Sat-Sun)", &weekend),
        })
    }

    /// The `n` highest-volume rows, highest first; ties keep storage order.
    pub async fn top_congestion(&self, n: usize) -> Result<Vec<TrafficSnapshot>, TrafficError> {
        let mut rows = self.all_rows().await?;
        rows.sort_by(|a, b| b.vehicle_count.cmp(&a.vehicle_count));
        Ok(rows.iter().take(n).map(TrafficSnapshot::from).collect())
    }

    /// Newest row per location, ordered by location name.
    pub async fn current_status(&self) -> Result<Vec<TrafficSnapshot>, TrafficError> {
        let rows = self.all_rows().await?;

        let mut latest: BTreeMap<&str, &TrafficObservation> = BTreeMap::new();
        for r in &rows {
            let newer = latest
                .get(r.location.as_str())
                .map_or(true, |current| r.timestamp >= current.timestamp);
            if newer {
                latest.insert(r.location.as_str(), r);
            }
        }
        Ok(latest.into_values().map(TrafficSnapshot::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
