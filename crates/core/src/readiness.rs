//! Instance Readiness State Machine
//!
//! Drives one instance from launch to a running target app:
//!
//! ```text
//! Launching -> AwaitingBridge -> AwaitingHome -> LaunchingApp -> Ready
//! ```
//!
//! Any state may end in `Failed(reason)`, or in `Cancelled` once the job's
//! token is triggered. The token is checked before every external command
//! and every sleep races against it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ld_dock_emulator_bridge::{
    launcher_intent, Device, DeviceBridge, EmulatorConsole, Instance, InstanceSettings,
    ACTIVITY_DUMP,
};

use crate::config::{DeviceMatch, ReadinessConfig, WorkflowConfig};
use crate::error::DockError;
use crate::events::{Event, EventBus};
use crate::locks::ResourceLocks;

/// Why a job failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The manager rejected the launch command
    LaunchError,
    /// No bridge device within the polling budget
    NoDevice,
    /// No launcher on screen within the polling budget
    HomeTimeout,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::LaunchError => "launch_error",
            FailureReason::NoDevice => "no_device",
            FailureReason::HomeTimeout => "home_timeout",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Launching,
    AwaitingBridge,
    AwaitingHome,
    LaunchingApp,
    Ready,
    Failed(FailureReason),
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Ready | JobState::Failed(_) | JobState::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => f.write_str("pending"),
            JobState::Launching => f.write_str("launching"),
            JobState::AwaitingBridge => f.write_str("awaiting bridge"),
            JobState::AwaitingHome => f.write_str("awaiting home screen"),
            JobState::LaunchingApp => f.write_str("launching app"),
            JobState::Ready => f.write_str("ready"),
            JobState::Failed(reason) => write!(f, "failed ({})", reason),
            JobState::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Result of the app launch trigger. Never fatal to the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppLaunch {
    Started,
    /// Not installed, or the trigger's result was ambiguous
    Soft(String),
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Ready { serial: String, app: AppLaunch },
    Failed { reason: FailureReason, detail: String },
    Cancelled,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Ready { .. })
    }

    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Ready { .. } => JobState::Ready,
            JobOutcome::Failed { reason, .. } => JobState::Failed(*reason),
            JobOutcome::Cancelled => JobState::Cancelled,
        }
    }
}

/// Per-job settings taken from the app config
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub readiness: ReadinessConfig,
    pub target_package: String,
    pub device_match: DeviceMatch,
    pub home_signatures: Vec<String>,
    /// Applied through the console before launch
    pub instance_settings: Option<InstanceSettings>,
}

impl JobSettings {
    pub fn new(readiness: ReadinessConfig, workflow: &WorkflowConfig) -> Self {
        Self {
            readiness,
            target_package: workflow.target_package.clone(),
            device_match: workflow.device_match,
            home_signatures: workflow.home_signatures.clone(),
            instance_settings: None,
        }
    }
}

/// Shared collaborators of every job in a run
#[derive(Clone)]
pub struct JobContext {
    pub console: Arc<dyn EmulatorConsole>,
    pub bridge: Arc<dyn DeviceBridge>,
    pub locks: Arc<ResourceLocks>,
    pub events: Arc<EventBus>,
}

/// Stop signal observed by a job
enum Interrupt {
    Cancelled,
}

type Step<T> = std::result::Result<T, Interrupt>;

/// One instance's trip through the readiness states
pub struct ReadinessJob {
    index: usize,
    instance: Instance,
    settings: JobSettings,
    ctx: JobContext,
    cancel: CancellationToken,
    state: JobState,
}

impl ReadinessJob {
    pub fn new(
        index: usize,
        instance: Instance,
        settings: JobSettings,
        ctx: JobContext,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            index,
            instance,
            settings,
            ctx,
            cancel,
            state: JobState::Pending,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Run to a terminal state
    pub async fn run(mut self) -> JobOutcome {
        self.progress(format!(
            "Processing {} (job #{})",
            self.instance.name,
            self.index + 1
        ));

        let outcome = match self.drive().await {
            Ok(outcome) => outcome,
            Err(Interrupt::Cancelled) => {
                self.progress("Stopped");
                JobOutcome::Cancelled
            }
        };

        self.transition(outcome.state());
        match &outcome {
            JobOutcome::Ready { serial, app } => {
                info!("{} ready on {}", self.instance.name, serial);
                let app = match app {
                    AppLaunch::Started => "started".to_string(),
                    AppLaunch::Soft(detail) => format!("not started ({})", detail),
                };
                self.progress(format!(
                    "Done: {} on {}, {} {}",
                    self.instance.name, serial, self.settings.target_package, app
                ));
            }
            JobOutcome::Failed { reason, detail } => {
                warn!("{} failed: {} ({})", self.instance.name, reason, detail);
            }
            JobOutcome::Cancelled => {}
        }
        outcome
    }

    async fn drive(&mut self) -> Step<JobOutcome> {
        self.checkpoint()?;
        self.transition(JobState::Launching);
        if let Err(error) = self.launch().await? {
            return Ok(self.fail(error));
        }

        self.progress(format!(
            "Waiting {}s for the emulator to start",
            self.settings.readiness.launch_settle_secs
        ));
        self.sleep(self.settings.readiness.launch_settle()).await?;

        self.checkpoint()?;
        self.transition(JobState::AwaitingBridge);
        let serial = match self.await_bridge().await? {
            Some(serial) => serial,
            None => {
                let error = DockError::BridgeUnavailable(format!(
                    "no bridge device after {} attempts",
                    self.settings.readiness.max_attempts
                ));
                return Ok(self.fail(error));
            }
        };
        self.progress(format!("Connected device {}", serial));

        self.checkpoint()?;
        self.transition(JobState::AwaitingHome);
        if !self.await_home(&serial).await? {
            let error = DockError::ReadinessTimeout(format!(
                "home screen not detected after {} attempts",
                self.settings.readiness.max_attempts
            ));
            return Ok(self.fail(error));
        }
        self.progress("Home screen is up");

        self.checkpoint()?;
        self.transition(JobState::LaunchingApp);
        let app = self.launch_app(&serial).await?;

        Ok(JobOutcome::Ready { serial, app })
    }

    /// Apply settings and issue the launch command, each under the launch lock
    async fn launch(&mut self) -> Step<std::result::Result<(), DockError>> {
        if let Some(settings) = self.settings.instance_settings.clone() {
            let _guard = self.ctx.locks.launch().await;
            self.checkpoint()?;
            match self.ctx.console.modify(self.instance.id, &settings).await {
                Ok(()) => self.progress("Applied instance settings"),
                Err(e) => self.progress(format!("Could not apply instance settings: {}", e)),
            }
        }

        self.progress("Opening emulator");
        let _guard = self.ctx.locks.launch().await;
        self.checkpoint()?;
        debug!("Job {} launching {}", self.index, self.instance.name);
        Ok(self
            .ctx
            .console
            .launch(&self.instance.name)
            .await
            .map_err(|e| DockError::Launch(e.to_string())))
    }

    async fn await_bridge(&mut self) -> Step<Option<String>> {
        self.progress("Waiting for bridge connection");
        let max_attempts = self.settings.readiness.max_attempts;

        for attempt in 1..=max_attempts {
            self.checkpoint()?;

            let snapshot = {
                let _guard = self.ctx.locks.enumerate().await;
                self.ctx.bridge.list_devices().await
            };
            match snapshot {
                Ok(devices) => {
                    if let Some(serial) = self.select_device(&devices) {
                        return Ok(Some(serial));
                    }
                }
                Err(e) => debug!("Job {} device listing failed: {}", self.index, e),
            }

            if attempt == max_attempts {
                break;
            }
            self.waiting_notice(attempt, "bridge");
            self.sleep(self.settings.readiness.poll_interval()).await?;
        }

        Ok(None)
    }

    async fn await_home(&mut self, serial: &str) -> Step<bool> {
        self.progress("Checking for the home screen");
        let max_attempts = self.settings.readiness.max_attempts;

        for attempt in 1..=max_attempts {
            self.checkpoint()?;

            match self.ctx.bridge.shell(serial, ACTIVITY_DUMP).await {
                Ok(dump) => {
                    if self.is_home(&dump) {
                        return Ok(true);
                    }
                }
                Err(e) => self.progress(format!("Home check failed: {}", e)),
            }

            if attempt == max_attempts {
                break;
            }
            self.waiting_notice(attempt, "home screen");
            self.sleep(self.settings.readiness.poll_interval()).await?;
        }

        Ok(false)
    }

    async fn launch_app(&mut self, serial: &str) -> Step<AppLaunch> {
        let package = self.settings.target_package.clone();
        self.progress(format!("Opening {}", package));

        let app = match self.ctx.bridge.shell(serial, &launcher_intent(&package)).await {
            Ok(output) if output.contains("No activities found") || output.contains("aborted") => {
                AppLaunch::Soft(format!("{} is not installed", package))
            }
            Ok(_) => AppLaunch::Started,
            Err(e) => AppLaunch::Soft(e.to_string()),
        };

        match &app {
            AppLaunch::Started => {
                self.progress(format!("Opened {}", package));
                self.sleep(self.settings.readiness.app_settle()).await?;
            }
            AppLaunch::Soft(detail) => {
                self.progress(format!("Could not open {}: {}", package, detail));
            }
        }
        Ok(app)
    }

    /// Pick this job's device out of a snapshot
    fn select_device(&self, devices: &[Device]) -> Option<String> {
        let mut online = devices.iter().filter(|d| d.is_usable());
        let device = match self.settings.device_match {
            DeviceMatch::Positional => online.nth(self.index),
            DeviceMatch::InstancePort => {
                let port = self.instance.console_port()?;
                online.find(|d| d.console_port() == Some(port))
            }
        };
        device.map(|d| d.serial.clone())
    }

    fn is_home(&self, dump: &str) -> bool {
        self.settings
            .home_signatures
            .iter()
            .any(|signature| dump.contains(signature.as_str()))
    }

    fn waiting_notice(&self, attempt: u32, what: &str) {
        let every = self.settings.readiness.progress_every.max(1);
        if attempt % every == 0 {
            let waited = u64::from(attempt) * self.settings.readiness.poll_interval_secs;
            self.progress(format!("Still waiting for {} ({}s)", what, waited));
        }
    }

    fn fail(&self, error: DockError) -> JobOutcome {
        let reason = error.failure_reason().unwrap_or(FailureReason::LaunchError);
        let detail = error.user_message();
        self.progress(format!("Failed: {}", detail));
        JobOutcome::Failed { reason, detail }
    }

    fn checkpoint(&self) -> Step<()> {
        if self.cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        Ok(())
    }

    async fn sleep(&self, duration: Duration) -> Step<()> {
        if duration.is_zero() {
            return self.checkpoint();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn transition(&mut self, state: JobState) {
        if self.state == state {
            return;
        }
        debug!(
            "Job {} ({}): {} -> {}",
            self.index, self.instance.name, self.state, state
        );
        self.state = state;
        self.ctx.events.emit(Event::JobStateChanged {
            job: self.index,
            instance: self.instance.name.clone(),
            state,
        });
    }

    fn progress(&self, message: impl Into<String>) {
        self.ctx.events.emit(Event::JobProgress {
            job: self.index,
            instance: self.instance.name.clone(),
            message: message.into(),
        });
    }
}
