//! EventBus port - typed publish side of status change events.
//!
//! Publishing is fire-and-forget: listeners (notifications, audit log) live
//! outside the engine and their failures never reach the publisher.

use crate::domain::TaskStatusChanged;

pub trait EventBus: Send + Sync {
    fn publish(&self, event: TaskStatusChanged);
}
