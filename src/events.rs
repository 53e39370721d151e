// src/events.rs

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::{models::SettingAppliedEvent, system::EventPublisher};

const DEFAULT_CAPACITY: usize = 128;

/// Fan-out publisher for [`SettingAppliedEvent`]s.
///
/// Publishing with no subscribers is not an error; the event is dropped.
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<Arc<SettingAppliedEvent>>,
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastEventPublisher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SettingAppliedEvent>> {
        self.sender.subscribe()
    }
}

impl EventPublisher for BroadcastEventPublisher {
    fn publish(&self, event: SettingAppliedEvent) {
        let setting_id = event.setting_id.clone();
        if self.sender.send(Arc::new(event)).is_err() {
            trace!("{:?} -> No subscribers for SettingApplied event", setting_id);
        }
    }
}
