//! Ports - seams to the collaborators of the engine.
//!
//! Each trait hides an external system (task persistence, edge persistence,
//! caches, event delivery, time, id allocation). In-memory implementations
//! live in `impls`.

pub mod cache_invalidator;
pub mod clock;
pub mod dependency_store;
pub mod event_bus;
pub mod id_generator;
pub mod task_store;

pub use self::cache_invalidator::{CacheInvalidator, NoopCacheInvalidator};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::dependency_store::DependencyStore;
pub use self::event_bus::EventBus;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_store::TaskStore;
