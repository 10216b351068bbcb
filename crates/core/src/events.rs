//! Event System
//!
//! Jobs report progress to the coordinator through typed events on a
//! pub/sub bus. Every event renders to one human-readable log line.

use chrono::{DateTime, Local};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::trace;
use uuid::Uuid;

use crate::readiness::{JobOutcome, JobState};

/// Aggregate result of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Ready { .. } => self.succeeded += 1,
            JobOutcome::Failed { .. } => self.failed += 1,
            JobOutcome::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }
}

/// Events emitted by the workflow
#[derive(Debug, Clone, Serialize)]
pub enum Event {
    /// A run selected its instances and spawned its jobs
    RunStarted {
        run_id: Uuid,
        started_at: DateTime<Local>,
        instances: Vec<String>,
    },
    /// A job entered a new state
    JobStateChanged {
        job: usize,
        instance: String,
        state: JobState,
    },
    /// Free-text progress from a job
    JobProgress {
        job: usize,
        instance: String,
        message: String,
    },
    /// A job reached a terminal state
    JobFinished {
        job: usize,
        instance: String,
        outcome: JobOutcome,
    },
    /// Every job of the run has terminated
    AllComplete { run_id: Uuid, summary: RunSummary },
    /// Operator-facing warning
    Warning { message: String },
}

impl Event {
    /// Human-readable log line
    pub fn log_line(&self) -> String {
        match self {
            Event::RunStarted { instances, .. } => format!(
                "Starting {} job(s): {}",
                instances.len(),
                instances.join(", ")
            ),
            Event::JobStateChanged { job, instance, state } => {
                format!("[#{} {}] -> {}", job + 1, instance, state)
            }
            Event::JobProgress { job, instance, message } => {
                format!("[#{} {}] {}", job + 1, instance, message)
            }
            Event::JobFinished { job, instance, outcome } => match outcome {
                JobOutcome::Ready { serial, .. } => {
                    format!("[#{} {}] Finished on {}", job + 1, instance, serial)
                }
                JobOutcome::Failed { reason, detail } => {
                    format!("[#{} {}] Failed ({}): {}", job + 1, instance, reason, detail)
                }
                JobOutcome::Cancelled => format!("[#{} {}] Cancelled", job + 1, instance),
            },
            Event::AllComplete { summary, .. } => format!(
                "All jobs finished: {} ready, {} failed, {} cancelled",
                summary.succeeded, summary.failed, summary.cancelled
            ),
            Event::Warning { message } => format!("Warning: {}", message),
        }
    }
}

/// Subscriber handle for receiving events
#[derive(Clone)]
pub struct EventSubscription {
    receiver: Receiver<Event>,
}

impl EventSubscription {
    /// Try to receive an event (non-blocking)
    pub fn try_recv(&self) -> Result<Event, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Take every event already queued
    pub fn drain(&self) -> Vec<Event> {
        self.receiver.try_iter().collect()
    }
}

/// Event bus for publish/subscribe pattern
pub struct EventBus {
    subscribers: RwLock<Vec<Sender<Event>>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventSubscription {
        let (sender, receiver) = unbounded();
        self.subscribers.write().push(sender);
        EventSubscription { receiver }
    }

    /// Emit an event to all subscribers, dropping subscribers that went away
    pub fn emit(&self, event: Event) -> usize {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());

        trace!("Event {:?} delivered to {} subscribers", event, subscribers.len());
        subscribers.len()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
