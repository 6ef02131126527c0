//! Impls - in-memory implementations of the ports.
//!
//! Used by tests, the CLI and embedding applications that do not need
//! durable storage. Database-backed stores implement the same traits.

pub mod broadcast_bus;
pub mod inmem_dependency_store;
pub mod inmem_task_store;
pub mod readiness_cache;

pub use self::broadcast_bus::BroadcastEventBus;
pub use self::inmem_dependency_store::InMemoryDependencyStore;
pub use self::inmem_task_store::InMemoryTaskStore;
pub use self::readiness_cache::ReadinessCache;
