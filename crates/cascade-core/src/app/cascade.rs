//! StatusCascadeEngine - propagates a status change through the dependency
//! graph.
//!
//! # Flow (trigger completed)
//! 1. outbound edges of the completed task
//! 2. per edge: successor + its full inbound set + predecessor states
//! 3. ReadinessEvaluator
//! 4. pending successor now startable through this edge: reported, or
//!    started under `StartPolicy::AutoStart`; milestones complete
//! 5. successors that completed in step 4 are expanded in turn
//! 6. every touched task is invalidated once, every transition published
//!
//! Any other status change only touches the direct successors: their cached
//! readiness is stale, but start-gated successors are evaluated lazily when
//! queried, never pushed.
//!
//! # Failure semantics
//! A failing successor is logged, counted and reported; the remaining edges
//! still run and the triggering transition is never undone.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::app::readiness::ReadinessEvaluator;
use crate::config::{EngineConfig, StartPolicy};
use crate::domain::{
    Actor, CascadeCause, CascadeStepError, ChangeReason, Task, TaskDependency, TaskId,
    TaskStatus, TaskStatusChanged,
};
use crate::observability::CascadeCounters;
use crate::ports::{CacheInvalidator, Clock, DependencyStore, EventBus, TaskStore};

/// What one cascade run did.
#[derive(Debug, Clone)]
pub struct CascadeReport {
    pub trigger: TaskId,
    /// Trigger first, then successors in visiting order. No duplicates.
    pub touched: Vec<TaskId>,
    /// One event per transition, in the order they were applied.
    pub transitioned: Vec<TaskStatusChanged>,
    /// Not-yet-started tasks (pending, or overdue without a start) that may
    /// start now; left for the caller under `StartPolicy::FlagOnly`.
    pub startable: Vec<TaskId>,
    /// In-progress tasks whose finish gates just opened.
    pub finishable: Vec<TaskId>,
    pub failures: Vec<CascadeStepError>,
    /// The run touched more than `max_cascade_tasks` tasks and stopped.
    pub aborted: bool,
}

impl CascadeReport {
    pub fn transitioned_ids(&self) -> Vec<TaskId> {
        self.transitioned.iter().map(|e| e.task_id).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOutcome {
    Unchanged,
    Blocked,
    Startable,
    Finishable,
    Started,
    Completed,
}

/// Book-keeping for a single run.
struct CascadeRun {
    trigger: TaskId,
    touched: Vec<TaskId>,
    touched_set: HashSet<TaskId>,
    /// Tasks whose outcome in this run is final; never evaluated again.
    settled: HashSet<TaskId>,
    transitioned: Vec<TaskStatusChanged>,
    startable: Vec<TaskId>,
    finishable: Vec<TaskId>,
    failures: Vec<CascadeStepError>,
    aborted: bool,
}

impl CascadeRun {
    fn new(trigger: TaskId) -> Self {
        Self {
            trigger,
            touched: vec![trigger],
            touched_set: HashSet::from([trigger]),
            settled: HashSet::from([trigger]),
            transitioned: Vec::new(),
            startable: Vec::new(),
            finishable: Vec::new(),
            failures: Vec::new(),
            aborted: false,
        }
    }

    fn touch(&mut self, task: TaskId) {
        if self.touched_set.insert(task) {
            self.touched.push(task);
        }
    }

    fn fail(&mut self, err: CascadeStepError) {
        warn!(
            trigger = %self.trigger,
            successor = %err.successor,
            error = %err,
            "cascade step failed, continuing"
        );
        self.failures.push(err);
    }

    fn into_report(self) -> CascadeReport {
        CascadeReport {
            trigger: self.trigger,
            touched: self.touched,
            transitioned: self.transitioned,
            startable: self.startable,
            finishable: self.finishable,
            failures: self.failures,
            aborted: self.aborted,
        }
    }
}

pub struct StatusCascadeEngine {
    tasks: Arc<dyn TaskStore>,
    dependencies: Arc<dyn DependencyStore>,
    evaluator: ReadinessEvaluator,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventBus>,
    invalidator: Arc<dyn CacheInvalidator>,
    start_policy: StartPolicy,
    max_cascade_tasks: usize,
    counters: Arc<CascadeCounters>,
}

impl StatusCascadeEngine {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        dependencies: Arc<dyn DependencyStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventBus>,
        invalidator: Arc<dyn CacheInvalidator>,
        config: &EngineConfig,
        counters: Arc<CascadeCounters>,
    ) -> Self {
        Self {
            tasks,
            dependencies,
            evaluator: ReadinessEvaluator::new(),
            clock,
            events,
            invalidator,
            start_policy: config.start_policy,
            max_cascade_tasks: config.max_cascade_tasks,
            counters,
        }
    }

    pub fn counters(&self) -> &CascadeCounters {
        &self.counters
    }

    /// React to a durable status change of `change.task_id`.
    pub async fn on_status_changed(&self, change: &TaskStatusChanged) -> CascadeReport {
        let mut run = CascadeRun::new(change.task_id);

        if change.is_completion() {
            self.cascade(&mut run).await;
        } else {
            let trigger = run.trigger;
            self.touch_successors(trigger, &mut run).await;
        }

        for &task in &run.touched {
            self.invalidator.invalidate(task).await;
        }

        self.counters.record_run(
            run.touched.len(),
            run.transitioned.len(),
            run.failures.len(),
            run.aborted,
        );
        debug!(
            trigger = %run.trigger,
            status = %change.new_status,
            touched = run.touched.len(),
            transitioned = run.transitioned.len(),
            startable = run.startable.len(),
            failures = run.failures.len(),
            "cascade finished"
        );
        run.into_report()
    }

    /// Mark the direct successors of `task` as touched without evaluating
    /// them.
    async fn touch_successors(&self, task: TaskId, run: &mut CascadeRun) {
        match self.dependencies.outbound_edges(task).await {
            Ok(edges) => {
                for edge in edges {
                    run.touch(edge.successor_task_id);
                }
            }
            Err(e) => run.fail(CascadeStepError::new(task, CascadeCause::FetchEdges(e))),
        }
    }

    async fn cascade(&self, run: &mut CascadeRun) {
        // Only tasks that completed are expanded; each completes at most once
        // per run, so each edge is processed at most once.
        let mut queue: VecDeque<TaskId> = VecDeque::from([run.trigger]);

        while let Some(current) = queue.pop_front() {
            let edges = match self.dependencies.outbound_edges(current).await {
                Ok(edges) => edges,
                Err(e) => {
                    run.fail(CascadeStepError::new(current, CascadeCause::FetchEdges(e)));
                    continue;
                }
            };

            for edge in edges {
                let successor = edge.successor_task_id;
                run.touch(successor);
                if run.touched.len() > self.max_cascade_tasks {
                    error!(
                        trigger = %run.trigger,
                        limit = self.max_cascade_tasks,
                        "cascade touched too many tasks, aborting"
                    );
                    run.aborted = true;
                    return;
                }
                if run.settled.contains(&successor) {
                    continue;
                }

                match self.step(&edge, run).await {
                    Ok(StepOutcome::Completed) => {
                        run.settled.insert(successor);
                        queue.push_back(successor);
                    }
                    Ok(StepOutcome::Started) => {
                        run.settled.insert(successor);
                        // Start-gated dependents of a started task have a new
                        // readiness view.
                        self.touch_successors(successor, run).await;
                    }
                    Ok(StepOutcome::Startable) => {
                        run.settled.insert(successor);
                        run.startable.push(successor);
                    }
                    Ok(StepOutcome::Finishable) => {
                        run.settled.insert(successor);
                        run.finishable.push(successor);
                    }
                    Ok(StepOutcome::Unchanged | StepOutcome::Blocked) => {}
                    Err(e) => run.fail(e),
                }
            }
        }
    }

    /// Re-evaluate the successor of `edge` and act on the result.
    async fn step(
        &self,
        edge: &TaskDependency,
        run: &mut CascadeRun,
    ) -> Result<StepOutcome, CascadeStepError> {
        let successor = edge.successor_task_id;
        let fetch_task = |e| CascadeStepError::new(successor, CascadeCause::FetchTask(e));
        let fetch_edges = |e| CascadeStepError::new(successor, CascadeCause::FetchEdges(e));

        let task = self.tasks.get(successor).await.map_err(fetch_task)?;
        let inbound = self
            .dependencies
            .inbound_edges(successor)
            .await
            .map_err(fetch_edges)?;
        let predecessor_ids: Vec<TaskId> = inbound.iter().map(|e| e.predecessor_task_id).collect();
        let predecessors: HashMap<TaskId, Task> = self
            .tasks
            .get_many(&predecessor_ids)
            .await
            .map_err(fetch_task)?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        let readiness = self
            .evaluator
            .can_progress(&task, &inbound, &predecessors, self.clock.now());

        let open = matches!(
            task.status,
            TaskStatus::Pending | TaskStatus::InProgress | TaskStatus::Overdue
        );
        if task.milestone && open && readiness.can_finish {
            self.complete_milestone(task, run).await?;
            return Ok(StepOutcome::Completed);
        }

        let gates_start = edge.dependency_type.gates_start();
        // Overdue tasks that never started may still start.
        let not_started = task.status == TaskStatus::Pending
            || (task.status == TaskStatus::Overdue && task.started_at.is_none());
        match task.status {
            _ if not_started && gates_start && readiness.can_start => match self.start_policy {
                StartPolicy::AutoStart => {
                    self.transition(&task, TaskStatus::InProgress, run).await?;
                    Ok(StepOutcome::Started)
                }
                StartPolicy::FlagOnly => {
                    info!(task = %successor, trigger = %run.trigger, "task is ready to start");
                    Ok(StepOutcome::Startable)
                }
            },
            TaskStatus::InProgress | TaskStatus::Overdue
                if !gates_start && readiness.can_finish =>
            {
                info!(task = %successor, trigger = %run.trigger, "task is ready to finish");
                Ok(StepOutcome::Finishable)
            }
            _ if readiness.blocking_reasons.is_empty() => Ok(StepOutcome::Unchanged),
            _ => {
                debug!(
                    task = %successor,
                    blocking = readiness.blocking_reasons.len(),
                    "successor still blocked"
                );
                Ok(StepOutcome::Blocked)
            }
        }
    }

    async fn complete_milestone(
        &self,
        task: Task,
        run: &mut CascadeRun,
    ) -> Result<Task, CascadeStepError> {
        let task = if task.status == TaskStatus::Pending {
            self.transition(&task, TaskStatus::InProgress, run).await?
        } else {
            task
        };
        self.transition(&task, TaskStatus::Completed, run).await
    }

    /// Compare-and-set transition, then publish.
    async fn transition(
        &self,
        task: &Task,
        to: TaskStatus,
        run: &mut CascadeRun,
    ) -> Result<Task, CascadeStepError> {
        let now = self.clock.now();
        let updated = self
            .tasks
            .transition(task.id, task.version, to, now)
            .await
            .map_err(|e| CascadeStepError::new(task.id, CascadeCause::Transition(e)))?;

        let event = TaskStatusChanged {
            task_id: task.id,
            old_status: task.status,
            new_status: to,
            reason: ChangeReason::Cascade {
                triggered_by: run.trigger,
            },
            actor: Some(Actor::system()),
            occurred_at: now,
        };
        info!(
            task = %task.id,
            from = %task.status,
            to = %to,
            trigger = %run.trigger,
            "cascade transition"
        );
        self.events.publish(event.clone());
        run.transitioned.push(event);
        Ok(updated)
    }
}
