//! Plan files: tasks, dependencies and a sequence of status steps.
//!
//! ```toml
//! [[task]]
//! key = "intro"
//! title = "Read the introduction"
//! due_in_days = 7
//!
//! [[task]]
//! key = "quiz"
//! title = "Intro quiz"
//!
//! [[dependency]]
//! predecessor = "intro"
//! successor = "quiz"
//! type = "finish_to_start"
//! lag_days = 1
//!
//! [[step]]
//! task = "intro"
//! status = "in_progress"
//!
//! [[step]]
//! advance_days = 2      # move the clock, then sweep overdue tasks
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use cascade_core::domain::{DependencyType, TaskStatus};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    #[serde(default, rename = "task")]
    pub tasks: Vec<PlanTask>,

    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<PlanDependency>,

    #[serde(default, rename = "step")]
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanTask {
    pub key: String,
    pub title: Option<String>,
    #[serde(default)]
    pub milestone: bool,
    pub due_in_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanDependency {
    pub predecessor: String,
    pub successor: String,
    #[serde(rename = "type", default = "default_type")]
    pub dependency_type: DependencyType,
    #[serde(default)]
    pub lag_days: i64,
}

fn default_type() -> DependencyType {
    DependencyType::FinishToStart
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanStep {
    pub task: Option<String>,
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub advance_days: i64,
}

impl Plan {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read plan {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid plan {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let plan: Plan = toml::from_str(raw)?;
        plan.validate()?;
        Ok(plan)
    }

    fn validate(&self) -> Result<()> {
        let mut keys = HashSet::new();
        for task in &self.tasks {
            if !keys.insert(task.key.as_str()) {
                bail!("duplicate task key `{}`", task.key);
            }
        }
        let known = |key: &str, what: &str| -> Result<()> {
            if keys.contains(key) {
                Ok(())
            } else {
                bail!("{what} refers to unknown task `{key}`")
            }
        };
        for dep in &self.dependencies {
            known(&dep.predecessor, "dependency")?;
            known(&dep.successor, "dependency")?;
        }
        for (i, step) in self.steps.iter().enumerate() {
            match (&step.task, step.status) {
                (Some(task), Some(_)) => known(task, "step")?,
                (None, None) if step.advance_days > 0 => {}
                (None, None) => bail!("step {} does nothing", i + 1),
                _ => bail!("step {} needs both `task` and `status`", i + 1),
            }
            if step.advance_days < 0 {
                bail!("step {} moves the clock backwards", i + 1);
            }
        }
        Ok(())
    }
}
