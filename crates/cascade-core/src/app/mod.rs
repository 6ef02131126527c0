//! App - services composed from the ports.
//!
//! # Components
//! - **EngineBuilder / Engine**: wiring and startup validation
//! - **ReadinessEvaluator**: can a task start / finish
//! - **StatusCascadeEngine**: propagation after a status change
//! - **DependencyService**: link, unlink and query edges
//! - **StatusService**: gated status changes, task deletion
//! - **OverdueSweeper**: deadline-driven `overdue` transitions

pub mod builder;
pub mod cascade;
pub mod dependencies;
pub mod overdue;
pub mod readiness;
pub mod status;

pub use self::builder::{BuildError, Engine, EngineBuilder};
pub use self::cascade::{CascadeReport, StatusCascadeEngine};
pub use self::dependencies::{DependencyService, LinkRequest};
pub use self::overdue::OverdueSweeper;
pub use self::readiness::ReadinessEvaluator;
pub use self::status::{StatusService, StatusUpdate};
