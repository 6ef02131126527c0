//! cascade-core
//!
//! Dependency graph between tasks and the status cascade that runs over it.
//!
//! # Modules
//! - **domain**: ids, tasks, dependency edges, readiness, events, errors
//! - **graph**: in-memory adjacency index and cycle detection
//! - **ports**: seams to stores, caches, event delivery, time, ids
//! - **impls**: in-memory port implementations
//! - **app**: readiness, cascade, services, builder
//! - **config**: `EngineConfig` loaded from TOML
//! - **observability**: cascade counters

pub mod app;
pub mod config;
pub mod domain;
pub mod graph;
pub mod impls;
pub mod observability;
pub mod ports;

pub use app::{Engine, EngineBuilder};
pub use config::{EngineConfig, StartPolicy};
