//! Backfill → live cycle → analytics → dashboard over one store.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tower::ServiceExt;

use jakarta_traffic::analytics::TrafficAnalytics;
use jakarta_traffic::config::{LocationConfig, SimulationConfig};
use jakarta_traffic::dashboard::{build_router, DashboardState};
use jakarta_traffic::data::synthetic::RainSimulator;
use jakarta_traffic::engine::{BackfillDriver, BackfillRange, LiveSimulator, TrafficGenerator};
use jakarta_traffic::storage::{self, MemoryStore, RecordStore};
use jakarta_traffic::types::{DataSource, RecordKind, TrafficCondition};

use crate::scripted_weather::ScriptedWeather;

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    // 2026-10-17 is a Saturday.
    NaiveDate::from_ymd_opt(2026, 10, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn locations() -> Vec<LocationConfig> {
    vec![
        LocationConfig::new("Bundaran HI", -6.1951, 106.8231),
        LocationConfig::new("Semanggi", -6.2193, 106.8142),
        LocationConfig::new("Cawang", -6.2431, 106.8736),
    ]
}

async fn backfill(store: Arc<dyn RecordStore>, sim: Arc<SimulationConfig>, rng: &mut StdRng) {
    let driver = BackfillDriver::new(
        TrafficGenerator::new(sim.clone()),
        RainSimulator::new(sim.rain_model.clone()),
        store,
        locations(),
    );
    // Two full weekend days plus Monday up to 09:00.
    let summary = driver
        .run(BackfillRange::new(at(17, 0, 0).date(), at(19, 0, 0).date(), 60), at(19, 9, 0), rng)
        .await
        .unwrap();
    assert_eq!(summary.traffic_rows, 58 * 3);
    assert_eq!(summary.weather_rows, 58 * 3);
}

#[tokio::test]
async fn test_full_pipeline_over_memory_store() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let sim = Arc::new(SimulationConfig::default());
    let mut rng = StdRng::seed_from_u64(2026);

    backfill(store.clone(), sim.clone(), &mut rng).await;

    let weather = Arc::new(ScriptedWeather::drizzle());
    weather.fail_at(locations()[1].coordinates());
    let live = LiveSimulator::new(TrafficGenerator::new(sim.clone()), weather.clone(), store.clone(), locations());
    let observations = live.run_cycle(&mut rng, at(19, 9, 30)).await.unwrap();

    assert_eq!(weather.calls(), 3);
    assert_eq!(observations.len(), 3);
    assert_eq!(observations[1].rain_factor, 1.0);
    assert_eq!(observations[0].rain_factor, sim.rain_impact.light);
    assert_eq!(store.count(RecordKind::Traffic).await.unwrap(), 177);
    assert_eq!(store.count(RecordKind::Weather).await.unwrap(), 176);

    let analytics = TrafficAnalytics::new(store.clone(), sim.clone());

    let overall = analytics.overall_stats().await.unwrap();
    assert_eq!(overall.total_records, 177);
    assert_eq!(overall.total_locations, 3);
    assert!(overall.min_vehicles <= overall.max_vehicles);

    let hourly = analytics.hourly_pattern(None).await.unwrap();
    assert_eq!(hourly.len(), 24);
    assert_eq!(hourly.iter().map(|h| h.count).sum::<usize>(), 177);

    let split = analytics.weekday_vs_weekend().await.unwrap();
    assert_eq!(split.weekend.total_records, 48 * 3);
    assert_eq!(split.weekday.total_records, 10 * 3 + 3);

    let rain = analytics.rain_correlation().await.unwrap();
    assert_eq!(rain.stats_by_category.iter().map(|b| b.count).sum::<usize>(), 177);

    let by_location = analytics.location_comparison().await.unwrap();
    assert_eq!(by_location.len(), 3);
    assert!(by_location.windows(2).all(|w| w[0].avg_vehicles >= w[1].avg_vehicles));

    let prediction = analytics.predict("Bundaran HI", 8).await.unwrap();
    assert_eq!(prediction.samples_used, 3);
    assert!(prediction.predicted_vehicles_min <= prediction.predicted_vehicles_avg);
    assert!(prediction.predicted_vehicles_avg <= prediction.predicted_vehicles_max);
    assert_eq!(prediction.predicted_condition, sim.condition_for(prediction.predicted_vehicles_avg));

    let current = analytics.current_status().await.unwrap();
    assert_eq!(
        current.iter().map(|c| c.location.as_str()).collect::<Vec<_>>(),
        vec!["Bundaran HI", "Cawang", "Semanggi"]
    );
    assert!(current.iter().all(|c| c.timestamp == "2026-10-19 09:30:00"));

    let latest = store.latest_traffic(3).await.unwrap();
    assert!(latest.iter().all(|r| r.data_source == DataSource::RealTimeSimulated));

    let top = analytics.top_congestion(5).await.unwrap();
    assert_eq!(top.len(), 5);
    assert!(top.windows(2).all(|w| w[0].vehicle_count >= w[1].vehicle_count));

    // Dashboard over the same store.
    let state = Arc::new(DashboardState::new(analytics, store.clone()));
    let resp = build_router(state.clone())
        .oneshot(Request::builder().uri("/api/current").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
    let json: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(json.len(), 3);

    let resp = build_router(state)
        .oneshot(Request::builder().uri("/api/weather/latest").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
    let json: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(json.len(), 3);
}

#[tokio::test]
async fn test_backfill_into_sqlite() {
    let store = storage::open("sqlite::memory:").await.unwrap();
    let sim = Arc::new(SimulationConfig::default());
    let mut rng = StdRng::seed_from_u64(7);

    backfill(store.clone(), sim.clone(), &mut rng).await;

    let analytics = TrafficAnalytics::new(store.clone(), sim);
    let overall = analytics.overall_stats().await.unwrap();
    assert_eq!(overall.total_records, 174);

    let rows = store.traffic_by_location("Semanggi").await.unwrap();
    assert_eq!(rows.len(), 58);
    let config = SimulationConfig::default();
    for r in &rows {
        assert_eq!(r.condition, config.condition_for(r.vehicle_count));
        assert!(r.rain_factor >= 1.0);
        assert!(r.speed_kmh >= config.speed.min_kmh && r.speed_kmh <= config.speed.max_kmh);
        assert_eq!(r.data_source, DataSource::HistoricalGenerated);
    }
    assert!(rows.iter().any(|r| r.condition != TrafficCondition::Jammed));
}
