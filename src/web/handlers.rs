//! HTTP request handlers.

use super::{ApiError, AppState};
use crate::auth::PIN_HEADER;
use crate::codec;
use crate::db::{Reading, WindowStats};

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// Access gate
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PinQuery {
    pub pin: Option<String>,
}

/// Pin-gate middleware for the reading routes.
///
/// The credential may arrive in the `x-dashboard-pin` header or the `pin`
/// query parameter; the header wins when both are present.
pub async fn require_pin(
    State(state): State<AppState>,
    Query(query): Query<PinQuery>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_pin = request
        .headers()
        .get(PIN_HEADER)
        .and_then(|v| v.to_str().ok());
    let presented = header_pin.or(query.pin.as_deref());

    if state.auth.authorize(presented) {
        Ok(next.run(request).await)
    } else {
        Err(ApiError::Unauthorized)
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(rename = "authEnabled")]
    pub auth_enabled: bool,
}

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        auth_enabled: state.auth.is_enabled(),
    })
}

// ============================================================================
// API: Readings
// ============================================================================

pub async fn handle_add_reading(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let reading = codec::decode_reading(&payload)?;
    let id = state.store.add_reading(&reading, Utc::now())?;
    tracing::debug!(id, "stored reading");
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

pub async fn handle_latest_reading(State(state): State<AppState>) -> Result<Response, ApiError> {
    // An empty store answers with an empty object, not an error.
    match state.store.latest_reading()? {
        Some(reading) => Ok(Json(reading).into_response()),
        None => Ok(Json(json!({})).into_response()),
    }
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub hours: Option<f64>,
}

pub async fn handle_reading_window(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let cutoff = window_cutoff(&query, Utc::now())?;
    Ok(Json(state.store.readings_since(cutoff)?))
}

pub async fn handle_window_stats(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<WindowStats>, ApiError> {
    let cutoff = window_cutoff(&query, Utc::now())?;
    Ok(Json(state.store.window_stats(cutoff)?))
}

/// Resolve the `hours` parameter into an absolute cutoff so the window
/// and stats endpoints share one inclusion rule.
fn window_cutoff(query: &WindowQuery, now: DateTime<Utc>) -> Result<DateTime<Utc>, ApiError> {
    let hours = query
        .hours
        .ok_or_else(|| ApiError::Validation("hours query parameter is required".to_string()))?;
    if !hours.is_finite() || hours <= 0.0 {
        return Err(ApiError::Validation("hours must be a positive number".to_string()));
    }

    let span = ChronoDuration::milliseconds((hours * 3_600_000.0) as i64);
    // A span reaching past representable time means "all history".
    Ok(now.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC))
}
