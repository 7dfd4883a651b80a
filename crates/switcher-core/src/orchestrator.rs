//! Orchestrator: tick scheduling and process lifecycle.
//!
//! One control loop serializes every event: the periodic timer and control
//! requests (status interrogation, stop). A tick is always allowed to finish
//! before a stop is observed. On stop the proxy is forced off exactly once,
//! bypassing the debounce machine.
//!
//! ## States
//!
//! - **Running**: ticking every `poll_interval`
//! - **ShuttingDown**: stop received, cleanup in progress
//! - **Stopped**: cleanup attempted, loop exited

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::manager::{ManagerSnapshot, SwitchEvent, SwitchManager, TickOutcome};
use crate::state::{ProxyState, DEFAULT_POLL_INTERVAL};

/// Capacity of the control channel.
const CONTROL_CHANNEL_CAPACITY: usize = 16;

/// Errors returned by [`ControlHandle`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// The control loop has already exited.
    #[error("control loop is not running")]
    NotRunning,
}

/// Result type for control operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Lifecycle state of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    /// Ticking.
    Running,
    /// Performing shutdown cleanup.
    ShuttingDown,
    /// Exited.
    Stopped,
}

impl OrchestratorState {
    /// Returns the state as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why the loop is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Interactive interrupt (Ctrl+C).
    Interrupt,
    /// Termination signal.
    Terminate,
    /// Stop or shutdown request from a service manager.
    ServiceStop,
    /// Every control handle was dropped.
    ControlClosed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Interrupt => "interrupt",
            Self::Terminate => "terminate",
            Self::ServiceStop => "service stop",
            Self::ControlClosed => "control channel closed",
        };
        write!(f, "{}", s)
    }
}

/// Requests accepted by the control loop.
#[derive(Debug)]
pub enum ControlRequest {
    /// Report the current status without mutating anything.
    Interrogate(oneshot::Sender<ServiceStatus>),
    /// Stop the loop and reset the proxy.
    Stop(StopReason),
}

/// Status reported on interrogation and on exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    /// Loop state.
    pub state: OrchestratorState,
    /// Last confirmed proxy state.
    pub confirmed: ProxyState,
    /// Pending candidate.
    pub pending: ProxyState,
    /// Ticks processed.
    pub ticks: u64,
    /// Successful commits.
    pub commits: u64,
    /// Most recent committed transition.
    pub last_switch: Option<SwitchEvent>,
    /// When the loop started.
    pub started_at: DateTime<Utc>,
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Interval between ticks.
    pub poll_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Sender side of the control channel.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlRequest>,
}

impl ControlHandle {
    /// Requests a stop.
    pub async fn stop(&self, reason: StopReason) -> Result<()> {
        self.tx
            .send(ControlRequest::Stop(reason))
            .await
            .map_err(|_| OrchestratorError::NotRunning)
    }

    /// Requests a stop without waiting for channel capacity.
    pub fn try_stop(&self, reason: StopReason) -> Result<()> {
        self.tx
            .try_send(ControlRequest::Stop(reason))
            .map_err(|_| OrchestratorError::NotRunning)
    }

    /// Asks the loop for its current status.
    pub async fn interrogate(&self) -> Result<ServiceStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ControlRequest::Interrogate(reply_tx))
            .await
            .map_err(|_| OrchestratorError::NotRunning)?;
        reply_rx.await.map_err(|_| OrchestratorError::NotRunning)
    }

    /// Returns true once the control loop has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Drives a [`SwitchManager`] on a fixed cadence until stopped.
pub struct Orchestrator<M> {
    manager: M,
    config: OrchestratorConfig,
    state: OrchestratorState,
    control_rx: mpsc::Receiver<ControlRequest>,
    started_at: DateTime<Utc>,
}

impl<M: SwitchManager> Orchestrator<M> {
    /// Creates an orchestrator and the handle used to control it.
    pub fn new(manager: M, config: OrchestratorConfig) -> (Self, ControlHandle) {
        let (tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let orchestrator = Self {
            manager,
            config,
            state: OrchestratorState::Running,
            control_rx,
            started_at: Utc::now(),
        };
        (orchestrator, ControlHandle { tx })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Builds the current status report.
    pub fn status(&self) -> ServiceStatus {
        let ManagerSnapshot {
            confirmed,
            pending,
            ticks,
            commits,
            last_switch,
            ..
        } = self.manager.snapshot();

        ServiceStatus {
            state: self.state,
            confirmed,
            pending,
            ticks,
            commits,
            last_switch,
            started_at: self.started_at,
        }
    }

    /// Runs the control loop until a stop request arrives.
    ///
    /// Evaluates once immediately, then once per `poll_interval`. Returns the
    /// final status after the shutdown cleanup.
    pub async fn run(mut self) -> ServiceStatus {
        let period = self.config.poll_interval;
        info!("Proxy monitoring started (interval: {:?})", period);

        self.tick();

        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                _ = interval.tick() => self.tick(),
                request = self.control_rx.recv() => match request {
                    Some(ControlRequest::Interrogate(reply)) => {
                        let _ = reply.send(self.status());
                    }
                    Some(ControlRequest::Stop(reason)) => break reason,
                    None => break StopReason::ControlClosed,
                },
            }
        };

        self.shutdown(reason);
        self.status()
    }

    fn tick(&mut self) {
        let outcome = self.manager.check_and_apply();
        match &outcome {
            TickOutcome::Committed(_) | TickOutcome::CommitFailed { .. } => {}
            _ => debug!("Tick: {}", outcome),
        }
    }

    fn shutdown(&mut self, reason: StopReason) {
        self.state = OrchestratorState::ShuttingDown;
        info!("Received {}, resetting system proxy...", reason);

        match self.manager.shutdown_cleanup() {
            Ok(()) => info!("System proxy reset"),
            Err(e) => error!("Failed to reset system proxy on shutdown: {}", e),
        }

        self.control_rx.close();
        self.state = OrchestratorState::Stopped;
        info!("Proxy monitoring stopped");
    }
}
