//! Domain model (ids, tasks, dependency edges, readiness, events, errors).

pub mod actor;
pub mod dependency;
pub mod errors;
pub mod events;
pub mod ids;
pub mod readiness;
pub mod state;
pub mod task;

pub use actor::{Actor, ActorKind};
pub use dependency::{DependencyPatch, DependencyType, Metadata, NewDependency, TaskDependency};
pub use errors::{CascadeCause, CascadeStepError, DependencyError, TaskError};
pub use events::{ChangeReason, TaskStatusChanged};
pub use ids::{DependencyId, TaskId};
pub use readiness::{BlockingKind, BlockingReason, ReadinessResult};
pub use state::TaskStatus;
pub use task::{NewTask, Task};
