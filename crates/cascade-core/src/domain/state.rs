//! Task status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a task.
///
/// # Transitions
/// - Pending -> InProgress -> Completed
/// - Pending | InProgress -> Cancelled
/// - Pending | InProgress -> Overdue (deadline elapsed, time-triggered)
/// - Overdue -> InProgress | Completed | Cancelled
///
/// Completed and Cancelled are terminal. Overdue is not: an overdue task may
/// still be worked on and completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Overdue,
    Cancelled,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    /// Is `self -> next` an allowed transition?
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Cancelled)
                | (Pending, Overdue)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
                | (InProgress, Overdue)
                | (Overdue, InProgress)
                | (Overdue, Completed)
                | (Overdue, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Overdue => "overdue",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "overdue" => Some(TaskStatus::Overdue),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::TaskStatus::*;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Pending, InProgress)]
    #[case(Pending, Cancelled)]
    #[case(Pending, Overdue)]
    #[case(InProgress, Completed)]
    #[case(InProgress, Overdue)]
    #[case(Overdue, Completed)]
    #[case(Overdue, InProgress)]
    fn allowed_transitions(#[case] from: TaskStatus, #[case] to: TaskStatus) {
        assert!(from.can_transition_to(to));
    }

    #[rstest]
    #[case(Pending, Completed)]
    #[case(Completed, InProgress)]
    #[case(Completed, Cancelled)]
    #[case(Cancelled, Pending)]
    #[case(InProgress, Pending)]
    #[case(Overdue, Overdue)]
    fn rejected_transitions(#[case] from: TaskStatus, #[case] to: TaskStatus) {
        assert!(!from.can_transition_to(to));
    }

    #[test]
    fn terminal_states_have_no_exit() {
        for terminal in [Completed, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Pending, InProgress, Completed, Overdue, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!Overdue.is_terminal());
    }

    #[test]
    fn parse_matches_display() {
        for status in [Pending, InProgress, Completed, Overdue, Cancelled] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("done"), None);
    }
}
