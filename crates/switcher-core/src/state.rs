//! Proxy state data model.
//!
//! ## States
//!
//! - **Unknown**: nothing has been committed yet (startup value only)
//! - **Off**: the system proxy should be disabled
//! - **On**: the system proxy should point at the configured address

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// IPv4 prefix that marks an address as belonging to the trusted network.
pub const INTERNAL_PREFIX: &str = "10.";

/// Consecutive identical samples required before a transition is committed.
pub const DEBOUNCE_THRESHOLD: u32 = 2;

/// Default cadence of the evaluation loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Desired or confirmed state of the system proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyState {
    /// No decision has been committed yet.
    #[default]
    Unknown,

    /// Proxy disabled.
    Off,

    /// Proxy enabled.
    On,
}

impl ProxyState {
    /// Maps an enable flag onto `On`/`Off`.
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Self::On
        } else {
            Self::Off
        }
    }

    /// Returns true for `On`.
    pub fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }

    /// Returns true for `On` and `Off`.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns the state as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Off => "off",
            Self::On => "on",
        }
    }
}

impl std::fmt::Display for ProxyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-tick classification of a single network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceObservation {
    /// Interface display name.
    pub name: String,
    /// Hardware type is IEEE 802.11.
    pub is_wireless: bool,
    /// At least one bound IPv4 address starts with [`INTERNAL_PREFIX`].
    pub has_internal_ipv4: bool,
    /// Wireless interface holding at least one non-internal IPv4 address.
    pub has_external_ipv4_wireless: bool,
}

/// Instruction handed to the proxy effector when a transition is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDecision {
    /// Whether the proxy should be enabled.
    pub enable: bool,
    /// Proxy address (`host:port`).
    pub address: String,
}

impl CommitDecision {
    /// Builds the decision that commits `state`.
    pub fn for_state(state: ProxyState, address: impl Into<String>) -> Self {
        Self {
            enable: state.is_on(),
            address: address.into(),
        }
    }

    /// Returns the state this decision commits.
    pub fn target(&self) -> ProxyState {
        ProxyState::from_enabled(self.enable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_unknown() {
        assert_eq!(ProxyState::default(), ProxyState::Unknown);
        assert!(!ProxyState::default().is_known());
    }

    #[test]
    fn display_impl() {
        assert_eq!(ProxyState::On.to_string(), "on");
        assert_eq!(ProxyState::Off.to_string(), "off");
        assert_eq!(ProxyState::Unknown.to_string(), "unknown");
    }

    #[test]
    fn decision_target_follows_enable_flag() {
        let on = CommitDecision::for_state(ProxyState::On, "10.1.1.1:8080");
        assert!(on.enable);
        assert_eq!(on.target(), ProxyState::On);

        let off = CommitDecision::for_state(ProxyState::Off, "10.1.1.1:8080");
        assert!(!off.enable);
        assert_eq!(off.target(), ProxyState::Off);
        assert_eq!(off.address, "10.1.1.1:8080");
    }
}
