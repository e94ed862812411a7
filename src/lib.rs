// Infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Storage and delivery
pub mod queue;
pub mod store;
pub mod transport;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod shutdown;
pub mod tasks;
