use std::time::Duration;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::{GateError, GateResult};
use crate::http::server::AppState;
use crate::rate_limit::{LimiterStats, Reclaimer};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub rate_limit_enabled: bool,
    pub rate_limit_entries: usize,
}

#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub removed: usize,
    pub remaining: usize,
}

fn store_unavailable(e: impl std::fmt::Display) -> GateError {
    tracing::error!(error = %e, "Rate limit store unavailable");
    GateError::internal("Rate limit store unavailable")
}

pub async fn get_status(State(state): State<AppState>) -> GateResult<Json<SystemStatus>> {
    let entries = state.limiters.store().len().await.map_err(store_unavailable)?;
    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        rate_limit_enabled: state.config.rate_limit.enabled,
        rate_limit_entries: entries,
    }))
}

pub async fn get_rate_limits(State(state): State<AppState>) -> GateResult<Json<Vec<LimiterStats>>> {
    state.limiters.stats().await.map(Json).map_err(store_unavailable)
}

/// Run one reclamation sweep now.
pub async fn sweep(State(state): State<AppState>) -> GateResult<Json<SweepReport>> {
    let reclaimer = Reclaimer::new(
        state.limiters.store(),
        state.limiters.clock(),
        Duration::from_secs(state.config.rate_limit.sweep_interval_secs),
    );
    let removed = reclaimer.sweep_once().await.map_err(store_unavailable)?;
    let remaining = state.limiters.store().len().await.map_err(store_unavailable)?;
    tracing::info!(removed, remaining, "Manual rate limit sweep");
    Ok(Json(SweepReport { removed, remaining }))
}
