//! Actor - who performed a mutation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of account an actor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Admin,
    Lecturer,
    Student,
    /// The engine itself (cascade transitions, overdue sweep).
    System,
}

impl ActorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActorKind::Admin => "admin",
            ActorKind::Lecturer => "lecturer",
            ActorKind::Student => "student",
            ActorKind::System => "system",
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribution passed explicitly wherever a mutation is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: u64,
    pub kind: ActorKind,
}

impl Actor {
    pub fn new(id: u64, kind: ActorKind) -> Self {
        Self { id, kind }
    }

    pub fn admin(id: u64) -> Self {
        Self::new(id, ActorKind::Admin)
    }

    pub fn lecturer(id: u64) -> Self {
        Self::new(id, ActorKind::Lecturer)
    }

    pub fn student(id: u64) -> Self {
        Self::new(id, ActorKind::Student)
    }

    pub fn system() -> Self {
        Self::new(0, ActorKind::System)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
