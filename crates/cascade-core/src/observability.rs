//! Cascade counters for operational diagnosis.
//!
//! Cascade failures never reach the end user, so these counters (together
//! with the `warn`/`error` logs) are how operators see them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeCounts {
    pub cascades_run: u64,
    pub tasks_touched: u64,
    pub transitions: u64,
    pub step_failures: u64,
    pub aborted: u64,
}

#[derive(Debug, Default)]
pub struct CascadeCounters {
    cascades_run: AtomicU64,
    tasks_touched: AtomicU64,
    transitions: AtomicU64,
    step_failures: AtomicU64,
    aborted: AtomicU64,
}

impl CascadeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_run(
        &self,
        touched: usize,
        transitions: usize,
        failures: usize,
        aborted: bool,
    ) {
        self.cascades_run.fetch_add(1, Ordering::Relaxed);
        self.tasks_touched.fetch_add(touched as u64, Ordering::Relaxed);
        self.transitions.fetch_add(transitions as u64, Ordering::Relaxed);
        self.step_failures.fetch_add(failures as u64, Ordering::Relaxed);
        if aborted {
            self.aborted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CascadeCounts {
        CascadeCounts {
            cascades_run: self.cascades_run.load(Ordering::Relaxed),
            tasks_touched: self.tasks_touched.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            step_failures: self.step_failures.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
        }
    }
}
