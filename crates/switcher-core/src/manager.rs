//! Proxy manager.
//!
//! Ties the evaluator, the debounce machine and the effector together into
//! one re-entrant tick operation.
//!
//! ## Usage
//!
//! ```ignore
//! use switcher_core::manager::{ProxyManager, SwitchManager};
//!
//! let mut manager = ProxyManager::new(adapters, interfaces, effector, "10.0.0.1:8080");
//!
//! // Once per tick, from a single control loop
//! let outcome = manager.check_and_apply();
//! println!("tick: {}", outcome);
//!
//! // On exit, unconditionally
//! manager.shutdown_cleanup()?;
//! ```

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::debounce::DebounceMachine;
use crate::effector::{self, EffectorError, ProxyEffector};
use crate::evaluator::EnvironmentEvaluator;
use crate::network::{AdapterSnapshotProvider, InterfaceSource};
use crate::state::ProxyState;

/// Maximum number of switch events kept in history.
const MAX_HISTORY: usize = 32;

/// Result of a single tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// Target equals the confirmed state.
    Stable(ProxyState),

    /// A candidate is being debounced.
    Pending {
        /// Candidate state.
        candidate: ProxyState,
        /// Consecutive samples so far.
        matches: u32,
    },

    /// A transition was committed.
    Committed(ProxyState),

    /// The effector rejected the commit; it is retried on the next matching sample.
    CommitFailed {
        /// State that failed to commit.
        target: ProxyState,
        /// Effector error.
        error: EffectorError,
    },

    /// The environment could not be observed; the confirmed state was held.
    ObservationFailed {
        /// State held in place of a fresh evaluation.
        held: ProxyState,
    },
}

impl TickOutcome {
    /// Returns true if this tick changed the confirmed state.
    pub fn is_commit(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

impl std::fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable(state) => write!(f, "stable ({})", state),
            Self::Pending { candidate, matches } => {
                write!(f, "pending {} ({} sample(s))", candidate, matches)
            }
            Self::Committed(state) => write!(f, "committed {}", state),
            Self::CommitFailed { target, error } => {
                write!(f, "commit of {} failed: {}", target, error)
            }
            Self::ObservationFailed { held } => write!(f, "observation failed, held {}", held),
        }
    }
}

/// A committed proxy transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchEvent {
    /// When the commit succeeded.
    pub timestamp: DateTime<Utc>,
    /// Previously confirmed state.
    pub from: ProxyState,
    /// Newly confirmed state.
    pub to: ProxyState,
    /// Proxy address handed to the effector.
    pub address: String,
}

impl SwitchEvent {
    /// Creates an event stamped with the current time.
    pub fn new(from: ProxyState, to: ProxyState, address: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            from,
            to,
            address: address.into(),
        }
    }
}

/// Read-only view of the manager, used for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerSnapshot {
    /// Last confirmed state.
    pub confirmed: ProxyState,
    /// Pending candidate.
    pub pending: ProxyState,
    /// Consecutive samples of the pending candidate.
    pub consecutive_matches: u32,
    /// Ticks processed.
    pub ticks: u64,
    /// Successful commits.
    pub commits: u64,
    /// Most recent committed transition.
    pub last_switch: Option<SwitchEvent>,
}

/// Capability the orchestrator drives.
pub trait SwitchManager {
    /// Runs one evaluation tick.
    fn check_and_apply(&mut self) -> TickOutcome;

    /// Forces the proxy off and clears its address, bypassing debouncing.
    fn shutdown_cleanup(&mut self) -> effector::Result<()>;

    /// Returns the current status.
    fn snapshot(&self) -> ManagerSnapshot;
}

/// Environment-driven proxy manager.
pub struct ProxyManager<A, I, E> {
    evaluator: EnvironmentEvaluator<A, I>,
    machine: DebounceMachine,
    effector: E,
    ticks: u64,
    commits: u64,
    history: VecDeque<SwitchEvent>,
}

impl<A, I, E> std::fmt::Debug for ProxyManager<A, I, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyManager")
            .field("machine", &self.machine)
            .field("ticks", &self.ticks)
            .field("commits", &self.commits)
            .finish()
    }
}

impl<A, I, E> ProxyManager<A, I, E>
where
    A: AdapterSnapshotProvider,
    I: InterfaceSource,
    E: ProxyEffector,
{
    /// Creates a manager that commits `address` when enabling the proxy.
    pub fn new(adapters: A, interfaces: I, effector: E, address: impl Into<String>) -> Self {
        Self {
            evaluator: EnvironmentEvaluator::new(adapters, interfaces),
            machine: DebounceMachine::new(address),
            effector,
            ticks: 0,
            commits: 0,
            history: VecDeque::new(),
        }
    }

    /// Last confirmed state.
    pub fn confirmed(&self) -> ProxyState {
        self.machine.last_confirmed()
    }

    /// Returns the evaluator, for one-shot diagnostics.
    pub fn evaluator(&self) -> &EnvironmentEvaluator<A, I> {
        &self.evaluator
    }

    /// Recent switch events, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &SwitchEvent> {
        self.history.iter()
    }

    fn record_switch(&mut self, event: SwitchEvent) {
        if self.history.len() == MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }
}

impl<A, I, E> SwitchManager for ProxyManager<A, I, E>
where
    A: AdapterSnapshotProvider,
    I: InterfaceSource,
    E: ProxyEffector,
{
    fn check_and_apply(&mut self) -> TickOutcome {
        self.ticks += 1;

        let previous = self.machine.last_confirmed();
        let evaluation = self.evaluator.evaluate(previous);
        let target = evaluation.target;

        let Some(decision) = self.machine.observe(target) else {
            if evaluation.failure.is_some() {
                return TickOutcome::ObservationFailed { held: target };
            }
            if target == previous {
                return TickOutcome::Stable(target);
            }
            debug!(
                candidate = %target,
                matches = self.machine.consecutive_matches(),
                "Debouncing proxy state change"
            );
            return TickOutcome::Pending {
                candidate: target,
                matches: self.machine.consecutive_matches(),
            };
        };

        info!(
            "Network environment changed, switching proxy {} -> {}",
            previous, target
        );

        match self.effector.apply(&decision) {
            Ok(()) => {
                self.machine.confirm(target);
                self.commits += 1;
                self.record_switch(SwitchEvent::new(previous, target, decision.address.clone()));
                info!(
                    "Proxy switched: state={}, address={}",
                    target, decision.address
                );
                TickOutcome::Committed(target)
            }
            Err(e) => {
                error!("Failed to apply proxy state {}: {}", target, e);
                TickOutcome::CommitFailed { target, error: e }
            }
        }
    }

    fn shutdown_cleanup(&mut self) -> effector::Result<()> {
        self.effector.clear()?;
        let previous = self.machine.last_confirmed();
        if previous != ProxyState::Off {
            self.record_switch(SwitchEvent::new(previous, ProxyState::Off, ""));
        }
        self.machine.confirm(ProxyState::Off);
        Ok(())
    }

    fn snapshot(&self) -> ManagerSnapshot {
        ManagerSnapshot {
            confirmed: self.machine.last_confirmed(),
            pending: self.machine.pending(),
            consecutive_matches: self.machine.consecutive_matches(),
            ticks: self.ticks,
            commits: self.commits,
            last_switch: self.history.back().cloned(),
        }
    }
}
