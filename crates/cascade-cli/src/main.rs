mod cli;
mod logging;
mod plan;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cascade_core::app::LinkRequest;
use cascade_core::domain::{NewTask, TaskId, TaskStatus, TaskStatusChanged};
use cascade_core::ports::{Clock, FixedClock};
use cascade_core::{Engine, EngineBuilder, EngineConfig};
use chrono::{Duration, Utc};
use clap::Parser;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::cli::{Cli, Command};
use crate::plan::Plan;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level)?;

    match cli.command {
        Command::Run { plan, config } => run(&plan, config.as_deref()).await,
        Command::Check { plan, config } => check(&plan, config.as_deref()).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path).context("failed to load engine config"),
        None => Ok(EngineConfig::default()),
    }
}

/// Engine on a clock that only moves when a plan step says so.
fn build_engine(config: EngineConfig) -> Result<(Engine, Arc<FixedClock>)> {
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let engine = EngineBuilder::new()
        .config(config)
        .clock(clock.clone())
        .build()
        .context("failed to build engine")?;
    Ok((engine, clock))
}

/// Create the plan's tasks; returns plan key -> task id.
async fn create_tasks(
    engine: &Engine,
    plan: &Plan,
    clock: &FixedClock,
) -> Result<HashMap<String, TaskId>> {
    let mut ids = HashMap::new();
    for task in &plan.tasks {
        let mut new = NewTask::new(task.title.clone().unwrap_or_else(|| task.key.clone()));
        if let Some(days) = task.due_in_days {
            new = new.due(clock.now() + Duration::days(days));
        }
        if task.milestone {
            new = new.milestone();
        }
        let created = engine.status().create_task(new).await?;
        ids.insert(task.key.clone(), created.id);
    }
    Ok(ids)
}

async fn link_all(engine: &Engine, plan: &Plan, ids: &HashMap<String, TaskId>) -> Result<()> {
    for dep in &plan.dependencies {
        let request =
            LinkRequest::new(ids[&dep.predecessor], ids[&dep.successor], dep.dependency_type)
                .lag_days(dep.lag_days);
        engine.dependencies().link(request).await.with_context(|| {
            format!(
                "dependency {} -> {} ({}) rejected",
                dep.predecessor, dep.successor, dep.dependency_type
            )
        })?;
    }
    Ok(())
}

async fn check(plan_path: &Path, config: Option<&Path>) -> Result<()> {
    let plan = Plan::load(plan_path)?;
    let (engine, clock) = build_engine(load_config(config)?)?;
    let ids = create_tasks(&engine, &plan, &clock).await?;
    link_all(&engine, &plan, &ids).await?;

    let keys: HashMap<TaskId, &str> = ids.iter().map(|(k, v)| (*v, k.as_str())).collect();
    for task in &plan.tasks {
        let chain = engine.dependencies().chain(ids[&task.key]).await?;
        let prerequisites: Vec<String> = chain
            .iter()
            .map(|e| {
                format!(
                    "{} -[{}]-> {}",
                    keys[&e.predecessor_task_id], e.dependency_type, keys[&e.successor_task_id]
                )
            })
            .collect();
        println!("{}: {}", task.key, prerequisites.join(", "));
    }
    info!(tasks = plan.tasks.len(), dependencies = plan.dependencies.len(), "plan is valid");
    Ok(())
}

#[derive(Serialize)]
struct EventLine<'a> {
    task: &'a str,
    #[serde(flatten)]
    event: &'a TaskStatusChanged,
}

#[derive(Serialize)]
struct ReadinessLine<'a> {
    task: &'a str,
    status: TaskStatus,
    can_start: bool,
    can_finish: bool,
    blocked_by: Vec<String>,
}

fn drain_events(
    events: &mut broadcast::Receiver<TaskStatusChanged>,
    keys: &HashMap<TaskId, &str>,
) -> Result<()> {
    loop {
        match events.try_recv() {
            Ok(event) => {
                let line = EventLine {
                    task: keys.get(&event.task_id).copied().unwrap_or("?"),
                    event: &event,
                };
                println!("{}", serde_json::to_string(&line)?);
            }
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                warn!(skipped = n, "event output lagged; raise event_buffer");
            }
            Err(_) => return Ok(()),
        }
    }
}

async fn run(plan_path: &Path, config: Option<&Path>) -> Result<()> {
    let plan = Plan::load(plan_path)?;
    let (engine, clock) = build_engine(load_config(config)?)?;
    let mut events = engine.subscribe();

    let ids = create_tasks(&engine, &plan, &clock).await?;
    link_all(&engine, &plan, &ids).await?;
    let keys: HashMap<TaskId, &str> = ids.iter().map(|(k, v)| (*v, k.as_str())).collect();

    for (i, step) in plan.steps.iter().enumerate() {
        if step.advance_days > 0 {
            clock.advance(Duration::days(step.advance_days));
            engine.sweeper().sweep_once().await?;
        }
        if let (Some(key), Some(status)) = (&step.task, step.status) {
            match engine.status().update_status(ids[key], status, None).await {
                Ok(update) => {
                    for failure in &update.cascade.failures {
                        warn!(step = i + 1, error = %failure, "cascade step failed");
                    }
                }
                Err(e) => println!("step {}: {key} -> {status} rejected: {e}", i + 1),
            }
        }
        drain_events(&mut events, &keys)?;
    }

    for task in &plan.tasks {
        let id = ids[&task.key];
        let current = engine.status().get_task(id).await?;
        let readiness = engine.dependencies().readiness(id).await?;
        let line = ReadinessLine {
            task: &task.key,
            status: current.status,
            can_start: readiness.can_start,
            can_finish: readiness.can_finish,
            blocked_by: readiness.reason_messages(),
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    let counts = engine.counters().snapshot();
    info!(
        cascades = counts.cascades_run,
        transitions = counts.transitions,
        failures = counts.step_failures,
        "plan finished"
    );
    Ok(())
}
