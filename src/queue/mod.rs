//! Store-and-forward queue for outbound telemetry.
//!
//! While the transport is down, messages are appended to a bounded durable
//! queue. Once it comes back, a drain timer replays them oldest first, one
//! per tick, removing each entry after it has been published.
//!
//! - `QueueStore`: bounded FIFO over a [`RecordStore`](crate::store::RecordStore)
//! - `ConnectivityGate`: online/offline state driven by transport events
//! - `DrainEngine`: the replay timer
//! - `QueueFacade`: entry point for producers

mod drain;
mod facade;
mod gate;
mod models;
mod store;

pub use drain::DrainEngine;
pub use facade::QueueFacade;
pub use gate::ConnectivityGate;
pub use models::{
    QueueConfig, QueueEntry, QueueStats, SendOutcome, TickOutcome, DEFAULT_DRAIN_INTERVAL_MS,
    DEFAULT_MAX_COUNT, DEFAULT_MAX_PARSE_FAILURES, DEFAULT_PUBLISH_TIMEOUT_MS, DEFAULT_STORE_PATH,
};
pub use store::{QueueStore, QueueStoreError};
