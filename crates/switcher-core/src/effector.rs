//! Proxy effector contract.

use thiserror::Error;

use crate::state::CommitDecision;

/// Errors raised while applying a proxy decision.
#[derive(Debug, Error)]
pub enum EffectorError {
    /// The caller lacks the privilege to change the proxy store.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The proxy address cannot be used by the backend.
    #[error("invalid proxy address: {0}")]
    InvalidAddress(String),

    /// The backend rejected or failed the change.
    #[error("proxy backend error: {0}")]
    Backend(String),

    /// No backend exists for this platform or desktop.
    #[error("unsupported platform: {0}")]
    Unsupported(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for effector operations.
pub type Result<T> = std::result::Result<T, EffectorError>;

/// Applies proxy decisions to the system's proxy configuration.
///
/// Both calls block until the change is externally observable and the
/// relevant OS subsystems have been told to reload it.
pub trait ProxyEffector {
    /// Enables or disables the proxy at `decision.address`.
    fn apply(&self, decision: &CommitDecision) -> Result<()>;

    /// Disables the proxy and erases any stored address.
    fn clear(&self) -> Result<()>;
}

impl<T: ProxyEffector + ?Sized> ProxyEffector for &T {
    fn apply(&self, decision: &CommitDecision) -> Result<()> {
        (**self).apply(decision)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

impl<T: ProxyEffector + ?Sized> ProxyEffector for Box<T> {
    fn apply(&self, decision: &CommitDecision) -> Result<()> {
        (**self).apply(decision)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}
