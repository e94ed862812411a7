//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::queue::QueueStats;
use crate::server::AppState;
use crate::transport::LinkHealthStats;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub link: LinkHealthResponse,
    pub queue: QueueHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct LinkHealthResponse {
    pub transport: String,
    pub status: String,
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct QueueHealthResponse {
    pub depth: usize,
    pub max_count: usize,
    pub draining: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub queue: QueueStats,
    pub link: LinkHealthStats,
}

/// GET /health
///
/// Reports `degraded` while the link is down; messages are still accepted
/// and queued.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let link = state.link_health.stats();
    let queue = state.queue.stats().await;
    let connected = state.link_health.is_connected();

    let status = if connected { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        link: LinkHealthResponse {
            transport: state.transport_kind.to_string(),
            status: link.status.as_str().to_string(),
            connected,
        },
        queue: QueueHealthResponse {
            depth: queue.depth,
            max_count: queue.max_count,
            draining: queue.draining,
        },
    })
}

/// GET /stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        queue: state.queue.stats().await,
        link: state.link_health.stats(),
    })
}
