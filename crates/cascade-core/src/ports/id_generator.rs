//! IdGenerator port - id allocation.
//!
//! Abstracted so stores can be driven by a fixed clock in tests while still
//! producing unique ids.

use std::sync::Arc;

use crate::domain::ids::{DependencyId, TaskId};
use crate::ports::Clock;
use ulid::Ulid;

pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;

    fn generate_dependency_id(&self) -> DependencyId;
}

/// ULID generator: timestamp from the clock, random tail.
///
/// Two ids generated under a `FixedClock` share the timestamp part but are
/// still distinct.
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_task_id(&self) -> TaskId {
        TaskId::from(self.next_ulid())
    }

    fn generate_dependency_id(&self) -> DependencyId {
        DependencyId::from(self.next_ulid())
    }
}
