//! Jakarta traffic simulator.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the record store (backfilling history when it is empty),
//! starts the dashboard and runs one live cycle per interval tick
//! with graceful shutdown.

use anyhow::{Context, Result};
use chrono::Local;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use jakarta_traffic::analytics::TrafficAnalytics;
use jakarta_traffic::config;
use jakarta_traffic::dashboard::{self, DashboardState};
use jakarta_traffic::data::synthetic::RainSimulator;
use jakarta_traffic::data::weather::OpenMeteoClient;
use jakarta_traffic::data::WeatherSource;
use jakarta_traffic::engine::{BackfillDriver, BackfillRange, LiveSimulator, TrafficGenerator};
use jakarta_traffic::storage::{self, RecordStore};
use jakarta_traffic::types::RecordKind;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("TRAFFIC_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    info!(
        config = %config_path,
        locations = cfg.locations.len(),
        cycle_interval_secs = cfg.engine.cycle_interval_secs,
        database_url = %cfg.storage.database_url,
        "Jakarta traffic simulator starting up"
    );

    let store = storage::open(&cfg.storage.database_url)
        .await
        .context("Failed to open record store")?;
    let simulation = Arc::new(cfg.simulation.clone());
    let mut rng = StdRng::from_entropy();

    // -- Historical backfill ---------------------------------------------

    let existing = store.count(RecordKind::Traffic).await?;
    if existing == 0 && cfg.engine.backfill_on_empty {
        let now = Local::now().naive_local();
        let range = BackfillRange::trailing_days(now, cfg.engine.historical_days, cfg.engine.interval_minutes);
        let driver = BackfillDriver::new(
            TrafficGenerator::new(simulation.clone()),
            RainSimulator::new(simulation.rain_model.clone()),
            store.clone(),
            cfg.locations.clone(),
        )
        .with_engine_config(&cfg.engine);
        let summary = driver.run(range, now, &mut rng).await.context("Historical backfill failed")?;
        info!(
            traffic_rows = summary.traffic_rows,
            weather_rows = summary.weather_rows,
            "Backfill stored"
        );
    } else {
        info!(existing_rows = existing, "Skipping backfill");
    }

    // -- Dashboard -------------------------------------------------------

    if cfg.dashboard.enabled {
        let analytics = TrafficAnalytics::new(store.clone(), simulation.clone());
        let state = Arc::new(DashboardState::new(analytics, store.clone()));
        dashboard::spawn_dashboard(state, cfg.dashboard.port).await?;
    }

    // -- Main loop -------------------------------------------------------

    let weather: Arc<dyn WeatherSource> = Arc::new(OpenMeteoClient::new(&cfg.weather)?);
    info!(source = weather.name(), "Weather source ready");
    let live = LiveSimulator::new(
        TrafficGenerator::new(simulation.clone()),
        weather,
        store.clone(),
        cfg.locations.clone(),
    );

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.engine.cycle_interval_secs.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.engine.cycle_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    let mut cycles: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                cycles += 1;
                match live.run_cycle(&mut rng, Local::now().naive_local()).await {
                    Ok(observations) => info!(cycle = cycles, observations = observations.len(), "Cycle complete"),
                    Err(e) => error!(cycle = cycles, error = %e, "Cycle failed, continuing to next"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    log_totals(store.as_ref(), cycles).await;
    Ok(())
}

async fn log_totals(store: &dyn RecordStore, cycles: u64) {
    match (store.count(RecordKind::Traffic).await, store.count(RecordKind::Weather).await) {
        (Ok(traffic), Ok(weather)) => info!(cycles, traffic, weather, "Shut down cleanly."),
        (Err(e), _) | (_, Err(e)) => error!(error = %e, "Could not read final row counts"),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("jakarta_traffic=info"));

    let json_logging = std::env::var("TRAFFIC_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
