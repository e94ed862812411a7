use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::queue::QueueFacade;
use crate::transport::{CloudType, LinkHealth};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub queue: Arc<QueueFacade>,
    pub link_health: Arc<LinkHealth>,
    pub transport_kind: CloudType,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        queue: Arc<QueueFacade>,
        link_health: Arc<LinkHealth>,
        transport_kind: CloudType,
        start_time: Instant,
    ) -> Self {
        Self {
            settings,
            queue,
            link_health,
            transport_kind,
            start_time,
        }
    }
}
