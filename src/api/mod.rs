//! API layer - HTTP endpoint handlers.

mod health;
mod messages;
mod metrics;
mod routes;

pub use health::{health, stats, HealthResponse, StatsResponse};
pub use messages::{send_message, SendMessageRequest, SendMessageResponse};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
