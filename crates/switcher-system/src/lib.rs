//! Proxy Switcher System - operating system collaborators.
//!
//! Implements the observation and effector contracts from `switcher-core`:
//!
//! - [`SystemAdapters`]: adapter hardware snapshot (wireless vs wired)
//! - [`SystemInterfaces`]: interface list with flags and bound addresses
//! - [`SystemProxy`]: system proxy store (registry, networksetup, gsettings)
//! - [`SystemProcesses`]: liveness and termination of a running instance

pub mod adapters;
mod command;
pub mod interfaces;
pub mod process;
pub mod proxy;

pub use adapters::SystemAdapters;
pub use interfaces::SystemInterfaces;
pub use process::{ProcessControl, SystemProcesses};
pub use proxy::{ProxyAddress, SystemProxy};

use switcher_core::ProxyManager;

/// Proxy manager wired to the operating system.
pub type SystemProxyManager = ProxyManager<SystemAdapters, SystemInterfaces, SystemProxy>;

/// Creates a manager that enables `address` when the trusted network is detected.
pub fn system_manager(address: impl Into<String>) -> SystemProxyManager {
    ProxyManager::new(
        SystemAdapters::new(),
        SystemInterfaces::new(),
        SystemProxy::new(),
        address,
    )
}
