mod app;
mod state;

pub use app::{create_app, serve};
pub use state::AppState;

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use std::sync::Arc;
    use std::time::Instant;

    use crate::config::Settings;
    use crate::queue::{QueueConfig, QueueFacade, QueueStore};
    use crate::store::MemoryRecordStore;
    use crate::transport::{CloudType, LinkHealth, MemoryTransport};

    let store = QueueStore::with_stores(
        QueueConfig::default(),
        Box::new(MemoryRecordStore::new()),
        None,
    );
    let queue = QueueFacade::with_store(store, Arc::new(MemoryTransport::new()));

    AppState::new(
        Arc::new(Settings::default()),
        Arc::new(queue),
        Arc::new(LinkHealth::new()),
        CloudType::Memory,
        Instant::now(),
    )
}
