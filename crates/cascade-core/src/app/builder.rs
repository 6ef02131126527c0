//! EngineBuilder - construction and wiring of the engine.
//!
//! # Fail-fast
//! `build()` validates the configuration before anything is wired, so a bad
//! `engine.toml` is reported at startup instead of on the first request.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::app::cascade::StatusCascadeEngine;
use crate::app::dependencies::DependencyService;
use crate::app::overdue::OverdueSweeper;
use crate::app::status::StatusService;
use crate::config::{ConfigError, EngineConfig};
use crate::domain::{TaskId, TaskStatusChanged};
use crate::impls::{BroadcastEventBus, InMemoryDependencyStore, InMemoryTaskStore, ReadinessCache};
use crate::observability::CascadeCounters;
use crate::ports::{
    CacheInvalidator, Clock, DependencyStore, EventBus, IdGenerator, SystemClock, TaskStore,
    UlidGenerator,
};

/// ```ignore
/// let engine = EngineBuilder::new()
///     .config(EngineConfig::load("engine.toml")?)
///     .build()?;
/// let a = engine.status().create_task(NewTask::new("read chapter 1")).await?;
/// ```
///
/// Stores default to the in-memory implementations.
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    tasks: Option<Arc<dyn TaskStore>>,
    dependencies: Option<Arc<dyn DependencyStore>>,
    invalidators: Vec<Arc<dyn CacheInvalidator>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            clock: None,
            ids: None,
            tasks: None,
            dependencies: None,
            invalidators: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn task_store(mut self, tasks: Arc<dyn TaskStore>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn dependency_store(mut self, dependencies: Arc<dyn DependencyStore>) -> Self {
        self.dependencies = Some(dependencies);
        self
    }

    /// Downstream cache to invalidate next to the built-in readiness cache.
    pub fn invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidators.push(invalidator);
        self
    }

    pub fn build(self) -> Result<Engine, BuildError> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())));
        let tasks = self
            .tasks
            .unwrap_or_else(|| Arc::new(InMemoryTaskStore::new(ids.clone(), clock.clone())));
        let dependencies = self.dependencies.unwrap_or_else(|| {
            Arc::new(InMemoryDependencyStore::new(
                self.config.max_lag_days,
                ids.clone(),
                clock.clone(),
            ))
        });

        let cache = Arc::new(ReadinessCache::new());
        let mut targets: Vec<Arc<dyn CacheInvalidator>> =
            vec![cache.clone() as Arc<dyn CacheInvalidator>];
        targets.extend(self.invalidators);
        let invalidator: Arc<dyn CacheInvalidator> = Arc::new(FanOutInvalidator { targets });

        let bus = Arc::new(BroadcastEventBus::new(self.config.event_buffer));
        let events: Arc<dyn EventBus> = bus.clone();
        let counters = Arc::new(CascadeCounters::new());

        let cascade = Arc::new(StatusCascadeEngine::new(
            tasks.clone(),
            dependencies.clone(),
            clock.clone(),
            events.clone(),
            invalidator.clone(),
            &self.config,
            counters.clone(),
        ));
        let dependency_service = Arc::new(
            DependencyService::new(
                tasks.clone(),
                dependencies.clone(),
                clock.clone(),
                invalidator.clone(),
            )
            .with_cache(cache.clone()),
        );
        let status = Arc::new(StatusService::new(
            tasks.clone(),
            dependencies,
            dependency_service.clone(),
            cascade.clone(),
            events,
            invalidator,
            clock.clone(),
        ));
        let sweeper = Arc::new(OverdueSweeper::new(tasks, status.clone(), clock));

        Ok(Engine {
            config: self.config,
            dependencies: dependency_service,
            status,
            cascade,
            sweeper,
            bus,
            cache,
            counters,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Invalidates every target in order.
struct FanOutInvalidator {
    targets: Vec<Arc<dyn CacheInvalidator>>,
}

#[async_trait]
impl CacheInvalidator for FanOutInvalidator {
    async fn invalidate(&self, task_id: TaskId) {
        for target in &self.targets {
            target.invalidate(task_id).await;
        }
    }
}

/// A wired engine. Cheap to share: every component sits behind an `Arc`.
pub struct Engine {
    config: EngineConfig,
    dependencies: Arc<DependencyService>,
    status: Arc<StatusService>,
    cascade: Arc<StatusCascadeEngine>,
    sweeper: Arc<OverdueSweeper>,
    bus: Arc<BroadcastEventBus>,
    cache: Arc<ReadinessCache>,
    counters: Arc<CascadeCounters>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dependencies(&self) -> &Arc<DependencyService> {
        &self.dependencies
    }

    pub fn status(&self) -> &Arc<StatusService> {
        &self.status
    }

    pub fn cascade(&self) -> &Arc<StatusCascadeEngine> {
        &self.cascade
    }

    pub fn sweeper(&self) -> &Arc<OverdueSweeper> {
        &self.sweeper
    }

    pub fn events(&self) -> &Arc<BroadcastEventBus> {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskStatusChanged> {
        self.bus.subscribe()
    }

    pub fn readiness_cache(&self) -> &Arc<ReadinessCache> {
        &self.cache
    }

    pub fn counters(&self) -> &Arc<CascadeCounters> {
        &self.counters
    }
}
