//! Workflow Orchestrator
//!
//! Maps a requested parallelism onto distinct instances and runs one
//! readiness job per instance:
//! - selection of `min(requested, available)` instances in manager order
//! - job index assignment (device offset and slot offset)
//! - completion tracking with a single all-complete notification
//! - coordinated cancellation

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use chrono::Local;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use ld_dock_emulator_bridge::{DeviceBridge, EmulatorConsole, Instance};

use crate::{
    config::AppConfig,
    error::{DockError, Result},
    events::{Event, EventBus, RunSummary},
    locks::ResourceLocks,
    readiness::{JobContext, JobOutcome, JobSettings, ReadinessJob},
};

/// A job spawned by a run
#[derive(Debug, Clone)]
pub struct JobInfo {
    /// 0-based job index, also the slot offset
    pub index: usize,
    pub instance: Instance,
}

/// What `start` hands back to the caller
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub run_id: Uuid,
    pub jobs: Vec<JobInfo>,
}

impl RunHandle {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Names of the selected instances, in job order
    pub fn instance_names(&self) -> Vec<String> {
        self.jobs.iter().map(|j| j.instance.name.clone()).collect()
    }
}

/// Bookkeeping for a live run
struct ActiveRun {
    run_id: Uuid,
    tokens: Vec<CancellationToken>,
    tasks: Vec<JoinHandle<JobOutcome>>,
    done: watch::Receiver<bool>,
    summary: Arc<Mutex<RunSummary>>,
}

/// Fires the all-complete notification when the last job of a run lets go
/// of its guard, whether the job returned or unwound.
struct CompletionGuard {
    run_id: Uuid,
    remaining: Arc<AtomicUsize>,
    summary: Arc<Mutex<RunSummary>>,
    events: Arc<EventBus>,
    done: Arc<watch::Sender<bool>>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            let summary = self.summary.lock().clone();
            info!("Run {} complete: {:?}", self.run_id, summary);
            self.events.emit(Event::AllComplete {
                run_id: self.run_id,
                summary,
            });
            let _ = self.done.send(true);
        }
    }
}

/// Holds the start slot until `start` returns
struct StartClaim<'a>(&'a AtomicBool);

impl Drop for StartClaim<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Workflow orchestrator
pub struct Orchestrator {
    config: Arc<RwLock<AppConfig>>,
    console: Arc<dyn EmulatorConsole>,
    bridge: Arc<dyn DeviceBridge>,
    locks: Arc<ResourceLocks>,
    event_bus: Arc<EventBus>,
    active: Mutex<Option<ActiveRun>>,
    starting: AtomicBool,
}

impl Orchestrator {
    /// Create an orchestrator sharing the process-wide resource locks
    pub fn new(
        config: AppConfig,
        console: Arc<dyn EmulatorConsole>,
        bridge: Arc<dyn DeviceBridge>,
    ) -> Self {
        Self::with_locks(config, console, bridge, ResourceLocks::global())
    }

    /// Create an orchestrator with its own set of locks
    pub fn with_locks(
        config: AppConfig,
        console: Arc<dyn EmulatorConsole>,
        bridge: Arc<dyn DeviceBridge>,
        locks: Arc<ResourceLocks>,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            console,
            bridge,
            locks,
            event_bus: Arc::new(EventBus::new()),
            active: Mutex::new(None),
            starting: AtomicBool::new(false),
        }
    }

    /// Get the event bus for subscribing to events
    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Get current configuration
    pub fn config(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// Update configuration; takes effect on the next run
    pub fn update_config<F>(&self, updater: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write();
        updater(&mut config);
    }

    /// Whether a run has jobs that have not terminated yet
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .map(|run| !*run.done.borrow())
            .unwrap_or(false)
    }

    /// Select instances and spawn one readiness job per instance.
    ///
    /// With no instances available nothing is spawned: a warning event is
    /// emitted and the returned handle is empty. A second `start` is
    /// rejected from the moment the first one begins listing instances.
    pub async fn start(&self) -> Result<RunHandle> {
        if self
            .starting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DockError::InvalidState("a run is already starting".into()));
        }
        let _claim = StartClaim(&self.starting);
        if self.is_running() {
            return Err(DockError::InvalidState("a run is already in progress".into()));
        }

        let config = self.config();
        let instances = self.console.list_instances().await?;
        let count = config.workflow.threads.min(instances.len());
        let run_id = Uuid::new_v4();

        if count == 0 {
            let message = if instances.is_empty() {
                "no emulator instances found".to_string()
            } else {
                "parallelism is set to 0".to_string()
            };
            warn!("Nothing to run: {}", message);
            self.event_bus.emit(Event::Warning { message });
            return Ok(RunHandle { run_id, jobs: Vec::new() });
        }

        let mut settings = JobSettings::new(config.readiness.clone(), &config.workflow);
        if config.instance.apply_before_launch {
            settings.instance_settings = Some(config.instance.to_settings()?);
        }

        let jobs: Vec<JobInfo> = instances
            .into_iter()
            .take(count)
            .enumerate()
            .map(|(index, instance)| JobInfo { index, instance })
            .collect();

        info!("Run {} starting {} job(s)", run_id, jobs.len());
        info!("Run settings:\n{}", config.summary_json()?);
        self.event_bus.emit(Event::RunStarted {
            run_id,
            started_at: Local::now(),
            instances: jobs.iter().map(|j| j.instance.name.clone()).collect(),
        });

        let ctx = JobContext {
            console: Arc::clone(&self.console),
            bridge: Arc::clone(&self.bridge),
            locks: Arc::clone(&self.locks),
            events: Arc::clone(&self.event_bus),
        };

        let (done_tx, done_rx) = watch::channel(false);
        let done_tx = Arc::new(done_tx);
        let remaining = Arc::new(AtomicUsize::new(jobs.len()));
        let summary = Arc::new(Mutex::new(RunSummary::default()));

        let mut tokens = Vec::with_capacity(jobs.len());
        let mut tasks = Vec::with_capacity(jobs.len());
        for info in &jobs {
            let token = CancellationToken::new();
            let job = ReadinessJob::new(
                info.index,
                info.instance.clone(),
                settings.clone(),
                ctx.clone(),
                token.clone(),
            );
            let guard = CompletionGuard {
                run_id,
                remaining: Arc::clone(&remaining),
                summary: Arc::clone(&summary),
                events: Arc::clone(&self.event_bus),
                done: Arc::clone(&done_tx),
            };
            let events = Arc::clone(&self.event_bus);
            let index = info.index;
            let name = info.instance.name.clone();

            tasks.push(tokio::spawn(async move {
                let outcome = job.run().await;
                guard.summary.lock().record(&outcome);
                events.emit(Event::JobFinished {
                    job: index,
                    instance: name,
                    outcome: outcome.clone(),
                });
                drop(guard);
                outcome
            }));
            tokens.push(token);
        }

        *self.active.lock() = Some(ActiveRun {
            run_id,
            tokens,
            tasks,
            done: done_rx,
            summary,
        });

        Ok(RunHandle { run_id, jobs })
    }

    /// Wait until every job of the current run has terminated
    pub async fn wait(&self) -> Option<RunSummary> {
        let (mut done, summary) = {
            let active = self.active.lock();
            let run = active.as_ref()?;
            (run.done.clone(), Arc::clone(&run.summary))
        };
        let _ = done.wait_for(|finished| *finished).await;
        let summary = summary.lock().clone();
        Some(summary)
    }

    /// Cancel every job and wait until each has stopped.
    ///
    /// Returns `None` when there was no run to stop, so repeated calls are
    /// harmless.
    pub async fn stop_all(&self) -> Option<RunSummary> {
        let run = self.active.lock().take()?;
        info!("Stopping run {} ({} job(s))", run.run_id, run.tokens.len());

        for token in &run.tokens {
            token.cancel();
        }
        for result in join_all(run.tasks).await {
            if let Err(e) = result {
                warn!("Job task ended abnormally: {}", e);
            }
        }

        let summary = run.summary.lock().clone();
        Some(summary)
    }
}
