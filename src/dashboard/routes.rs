//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::analytics::{
    HourlyStats, LocationStats, OverallStats, Prediction, RainCorrelation, TrafficAnalytics, TrafficSnapshot,
    WeekdayWeekend, DEFAULT_TOP_N,
};
use crate::storage::RecordStore;
use crate::types::{RecordKind, TrafficError, WeatherObservation};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub analytics: TrafficAnalytics,
    pub store: Arc<dyn RecordStore>,
}

impl DashboardState {
    pub fn new(analytics: TrafficAnalytics, store: Arc<dyn RecordStore>) -> Self {
        Self { analytics, store }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// `TrafficError` rendered as an HTTP response.
pub struct ApiError(pub TrafficError);

impl From<TrafficError> for ApiError {
    fn from(e: TrafficError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TrafficError::NoData | TrafficError::NoHistoricalData { .. } => StatusCode::NOT_FOUND,
            TrafficError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            other => {
                error!(error = %other, "Dashboard request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct HourlyQuery {
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    pub location: String,
    pub hour: u32,
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub n: Option<usize>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub traffic_rows: u64,
    pub weather_rows: u64,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    Ok(Json(HealthResponse {
        status: "ok",
        traffic_rows: state.store.count(RecordKind::Traffic).await?,
        weather_rows: state.store.count(RecordKind::Weather).await?,
    }))
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<OverallStats> {
    Ok(Json(state.analytics.overall_stats().await?))
}

/// GET /api/hourly?location=
pub async fn get_hourly(
    State(state): State<AppState>,
    Query(q): Query<HourlyQuery>,
) -> ApiResult<Vec<HourlyStats>> {
    Ok(Json(state.analytics.hourly_pattern(q.location.as_deref()).await?))
}

/// GET /api/rain
pub async fn get_rain(State(state): State<AppState>) -> ApiResult<RainCorrelation> {
    Ok(Json(state.analytics.rain_correlation().await?))
}

/// GET /api/locations
pub async fn get_locations(State(state): State<AppState>) -> ApiResult<Vec<LocationStats>> {
    Ok(Json(state.analytics.location_comparison().await?))
}

/// GET /api/predict?location=&hour=
pub async fn get_prediction(
    State(state): State<AppState>,
    Query(q): Query<PredictQuery>,
) -> ApiResult<Prediction> {
    Ok(Json(state.analytics.predict(&q.location, q.hour).await?))
}

/// GET /api/weekday-weekend
pub async fn get_weekday_weekend(State(state): State<AppState>) -> ApiResult<WeekdayWeekend> {
    Ok(Json(state.analytics.weekday_vs_weekend().await?))
}

/// GET /api/top?n=
pub async fn get_top(
    State(state): State<AppState>,
    Query(q): Query<TopQuery>,
) -> ApiResult<Vec<TrafficSnapshot>> {
    let n = q.n.unwrap_or(DEFAULT_TOP_N);
    Ok(Json(state.analytics.top_congestion(n).await?))
}

/// GET /api/current
pub async fn get_current(State(state): State<AppState>) -> ApiResult<Vec<TrafficSnapshot>> {
    Ok(Json(state.analytics.current_status().await?))
}

/// GET /api/weather/latest
pub async fn get_latest_weather(State(state): State<AppState>) -> ApiResult<Vec<WeatherObservation>> {
    let rows = state.store.latest_weather().await?;
    if rows.is_empty() {
        return Err(TrafficError::NoData.into());
    }
    Ok(Json(rows))
}
