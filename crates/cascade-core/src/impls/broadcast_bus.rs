//! BroadcastEventBus - EventBus over `tokio::sync::broadcast`.
//!
//! # Details
//! - Every subscriber sees every event published after it subscribed.
//! - Publishing with no subscribers is not an error; the event is dropped.
//! - Slow subscribers lag and lose the oldest events (broadcast semantics);
//!   the audit log and notifications are expected to keep up.

use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::TaskStatusChanged;
use crate::ports::EventBus;

pub struct BroadcastEventBus {
    sender: broadcast::Sender<TaskStatusChanged>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskStatusChanged> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(&self, event: TaskStatusChanged) {
        let task = event.task_id;
        let new_status = event.new_status;
        match self.sender.send(event) {
            Ok(receivers) => {
                trace!(task = %task, status = %new_status, receivers, "status change published")
            }
            Err(_) => {
                trace!(task = %task, status = %new_status, "status change dropped, no subscribers")
            }
        }
    }
}
