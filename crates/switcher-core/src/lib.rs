//! Proxy Switcher Core - environment evaluation and debounced proxy switching.
//!
//! This crate decides whether the system proxy should be on or off and makes
//! that decision stick despite transient network flapping:
//!
//! - [`classifier`]: per-interface wireless / internal-address classification
//! - [`evaluator`]: fixed-priority aggregation into one target state
//! - [`debounce`]: two-sample debounce state machine
//! - [`manager`]: one re-entrant `check_and_apply` tick
//! - [`orchestrator`]: timer + control-request loop with shutdown cleanup
//!
//! Operating system access lives behind the traits in [`network`] and
//! [`effector`].

pub mod classifier;
pub mod debounce;
pub mod effector;
pub mod evaluator;
pub mod manager;
pub mod network;
pub mod orchestrator;
pub mod state;

pub use debounce::DebounceMachine;
pub use effector::{EffectorError, ProxyEffector};
pub use evaluator::{resolve_target, EnvironmentEvaluator, Evaluation};
pub use manager::{ManagerSnapshot, ProxyManager, SwitchEvent, SwitchManager, TickOutcome};
pub use network::{
    AdapterInfo, AdapterSnapshot, AdapterSnapshotProvider, InterfaceFlags, InterfaceSource,
    NetworkInterface, ObservationError,
};
pub use orchestrator::{
    ControlHandle, ControlRequest, Orchestrator, OrchestratorConfig, OrchestratorState,
    ServiceStatus, StopReason,
};
pub use state::{CommitDecision, InterfaceObservation, ProxyState};
