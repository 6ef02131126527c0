//! End-to-end behaviour of the engine through its public API.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cascade_core::app::LinkRequest;
use cascade_core::domain::{
    Actor, BlockingKind, DependencyError, DependencyType, NewTask, TaskId, TaskStatus,
};
use cascade_core::ports::{CacheInvalidator, FixedClock};
use cascade_core::{Engine, EngineBuilder, EngineConfig, StartPolicy};
use chrono::{Duration, TimeZone, Utc};
use rstest::rstest;

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<TaskId>>,
}

impl Recorder {
    fn take(&self) -> Vec<TaskId> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }
}

#[async_trait]
impl CacheInvalidator for Recorder {
    async fn invalidate(&self, task_id: TaskId) {
        self.seen.lock().unwrap().push(task_id);
    }
}

struct World {
    engine: Engine,
    clock: Arc<FixedClock>,
    recorder: Arc<Recorder>,
}

impl World {
    fn new(policy: StartPolicy) -> Self {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 2, 3, 9, 0, 0).unwrap(),
        ));
        let recorder = Arc::new(Recorder::default());
        let engine = EngineBuilder::new()
            .config(EngineConfig::default().with_start_policy(policy))
            .clock(clock.clone())
            .invalidator(recorder.clone())
            .build()
            .unwrap();
        Self {
            engine,
            clock,
            recorder,
        }
    }

    async fn task(&self, title: &str) -> TaskId {
        self.engine
            .status()
            .create_task(NewTask::new(title))
            .await
            .unwrap()
            .id
    }

    async fn milestone(&self, title: &str) -> TaskId {
        self.engine
            .status()
            .create_task(NewTask::new(title).milestone())
            .await
            .unwrap()
            .id
    }

    async fn link(&self, p: TaskId, s: TaskId) -> Result<(), DependencyError> {
        self.link_with(LinkRequest::new(p, s, DependencyType::FinishToStart))
            .await
    }

    async fn link_with(&self, request: LinkRequest) -> Result<(), DependencyError> {
        self.engine.dependencies().link(request).await.map(|_| ())
    }

    async fn start(&self, id: TaskId) {
        self.engine
            .status()
            .update_status(id, TaskStatus::InProgress, Some(Actor::student(11)))
            .await
            .unwrap();
    }

    async fn complete(&self, id: TaskId) -> cascade_core::app::CascadeReport {
        let status = self.engine.status().get_task(id).await.unwrap().status;
        if status == TaskStatus::Pending {
            self.start(id).await;
        }
        self.engine
            .status()
            .update_status(id, TaskStatus::Completed, Some(Actor::student(11)))
            .await
            .unwrap()
            .cascade
    }

    async fn status_of(&self, id: TaskId) -> TaskStatus {
        self.engine.status().get_task(id).await.unwrap().status
    }

    async fn can_start(&self, id: TaskId) -> bool {
        self.engine.dependencies().can_task_start(id).await.unwrap()
    }

    async fn edge_count(&self, ids: &[TaskId]) -> usize {
        let mut n = 0;
        for &id in ids {
            n += self.engine.dependencies().dependents(id).await.unwrap().len();
        }
        n
    }
}

#[rstest]
#[case::flag_only(StartPolicy::FlagOnly, TaskStatus::Pending)]
#[case::auto_start(StartPolicy::AutoStart, TaskStatus::InProgress)]
#[tokio::test]
async fn completing_a_unblocks_b(#[case] policy: StartPolicy, #[case] b_after: TaskStatus) {
    let world = World::new(policy);
    let (a, b) = (world.task("A").await, world.task("B").await);
    world.link(a, b).await.unwrap();
    world.start(a).await;
    world.recorder.take();

    let report = world.complete(a).await;

    assert!(world.can_start(b).await);
    assert_eq!(world.status_of(b).await, b_after);
    match policy {
        StartPolicy::FlagOnly => assert_eq!(report.startable, vec![b]),
        StartPolicy::AutoStart => assert_eq!(report.transitioned_ids(), vec![b]),
    }
    let invalidated = world.recorder.take();
    assert!(invalidated.contains(&a));
    assert!(invalidated.contains(&b));
}

#[tokio::test]
async fn reverse_edge_is_rejected_as_cycle() {
    let world = World::new(StartPolicy::FlagOnly);
    let (a, b) = (world.task("A").await, world.task("B").await);
    world.link(a, b).await.unwrap();

    assert_eq!(
        world.link(b, a).await,
        Err(DependencyError::Cyclic {
            predecessor: b,
            successor: a
        })
    );
    assert_eq!(world.edge_count(&[a, b]).await, 1);
}

#[tokio::test]
async fn pending_second_predecessor_blocks() {
    let world = World::new(StartPolicy::FlagOnly);
    let (a, d, c) = (
        world.task("A").await,
        world.task("D").await,
        world.task("C").await,
    );
    world.link(a, c).await.unwrap();
    world.link(d, c).await.unwrap();
    world.complete(a).await;

    let readiness = world.engine.dependencies().readiness(c).await.unwrap();

    assert!(!readiness.can_start);
    assert_eq!(readiness.blocking_reasons.len(), 1);
    assert!(readiness.is_blocked_by(d));
    assert!(readiness.reason_messages()[0].contains(&d.to_string()));
}

#[tokio::test]
async fn self_dependency_is_rejected() {
    let world = World::new(StartPolicy::FlagOnly);
    let a = world.task("A").await;

    assert_eq!(world.link(a, a).await, Err(DependencyError::SelfDependency(a)));
}

#[tokio::test]
async fn lag_over_a_year_is_rejected() {
    let world = World::new(StartPolicy::FlagOnly);
    let (a, b) = (world.task("A").await, world.task("B").await);

    let err = world
        .link_with(LinkRequest::new(a, b, DependencyType::FinishToStart).lag_days(400))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DependencyError::InvalidLag {
            lag_days: 400,
            max: 365
        }
    );
    assert_eq!(world.edge_count(&[a]).await, 0);
}

#[tokio::test]
async fn chain_cascades_one_step_at_a_time() {
    let world = World::new(StartPolicy::FlagOnly);
    let (a, b, c) = (
        world.task("A").await,
        world.task("B").await,
        world.task("C").await,
    );
    world.link(a, b).await.unwrap();
    world.link(b, c).await.unwrap();

    let first = world.complete(a).await;
    assert_eq!(first.touched, vec![a, b]);
    assert_eq!(first.startable, vec![b]);
    assert!(!world.can_start(c).await);

    let second = world.complete(b).await;
    assert_eq!(second.touched, vec![b, c]);
    assert_eq!(second.startable, vec![c]);
    assert!(world.can_start(c).await);
}

#[tokio::test]
async fn finish_to_start_lag_holds_successor() {
    let world = World::new(StartPolicy::FlagOnly);
    let (a, b) = (world.task("A").await, world.task("B").await);
    world
        .link_with(LinkRequest::new(a, b, DependencyType::FinishToStart).lag_days(3))
        .await
        .unwrap();

    assert!(!world.can_start(b).await);
    let report = world.complete(a).await;
    assert!(report.startable.is_empty());

    world.clock.advance(Duration::days(2));
    let readiness = world.engine.dependencies().readiness(b).await.unwrap();
    assert!(!readiness.can_start);
    assert!(matches!(
        readiness.blocking_reasons[0].kind,
        BlockingKind::LagPending { .. }
    ));

    world.clock.advance(Duration::days(1));
    assert!(world.can_start(b).await);
}

#[tokio::test]
async fn and_semantics_flip_back_when_a_predecessor_is_reopened() {
    let world = World::new(StartPolicy::FlagOnly);
    let (a, d, c) = (
        world.task("A").await,
        world.task("D").await,
        world.task("C").await,
    );
    world
        .link_with(LinkRequest::new(a, c, DependencyType::StartToStart))
        .await
        .unwrap();
    world
        .link_with(LinkRequest::new(d, c, DependencyType::StartToStart))
        .await
        .unwrap();

    world.start(a).await;
    assert!(!world.can_start(c).await);
    world.start(d).await;
    assert!(world.can_start(c).await);

    world
        .engine
        .status()
        .update_status(d, TaskStatus::Cancelled, None)
        .await
        .unwrap();
    assert!(!world.can_start(c).await);
}

#[tokio::test]
async fn repeated_cascade_is_idempotent() {
    let world = World::new(StartPolicy::AutoStart);
    let (a, b, c) = (
        world.task("A").await,
        world.task("B").await,
        world.task("C").await,
    );
    world.link(a, b).await.unwrap();
    world.link(a, c).await.unwrap();

    let done = world.complete(a).await;
    assert_eq!(done.transitioned.len(), 2);

    let task = world.engine.status().get_task(a).await.unwrap();
    let replay = cascade_core::domain::TaskStatusChanged {
        task_id: a,
        old_status: TaskStatus::InProgress,
        new_status: TaskStatus::Completed,
        reason: cascade_core::domain::ChangeReason::Manual,
        actor: None,
        occurred_at: task.updated_at,
    };
    let again = world.engine.cascade().on_status_changed(&replay).await;

    assert!(again.transitioned.is_empty());
    assert_eq!(world.status_of(b).await, TaskStatus::InProgress);
    assert_eq!(world.status_of(c).await, TaskStatus::InProgress);
}

#[tokio::test]
async fn diamond_of_milestones_touches_each_task_once() {
    let world = World::new(StartPolicy::FlagOnly);
    let a = world.task("A").await;
    let left = world.milestone("left").await;
    let right = world.milestone("right").await;
    let join = world.milestone("join").await;
    let tail = world.task("tail").await;
    for (p, s) in [(a, left), (a, right), (left, join), (right, join), (join, tail)] {
        world.link(p, s).await.unwrap();
    }

    let report = world.complete(a).await;

    let mut touched = report.touched.clone();
    touched.sort();
    touched.dedup();
    assert_eq!(touched.len(), report.touched.len());
    assert_eq!(report.touched.len(), 5);

    let completions: Vec<_> = report
        .transitioned
        .iter()
        .filter(|e| e.new_status == TaskStatus::Completed)
        .map(|e| e.task_id)
        .collect();
    assert_eq!(completions.len(), 3);
    assert_eq!(completions.iter().filter(|&&t| t == join).count(), 1);
    assert_eq!(world.status_of(join).await, TaskStatus::Completed);
    assert_eq!(report.startable, vec![tail]);
    assert_eq!(world.engine.counters().snapshot().step_failures, 0);
}
