//! Proxy Switcher - host program support.
//!
//! This crate provides everything the `proxy-switcher` binary needs around
//! the core loop:
//!
//! - Command-line arguments and JSON configuration
//! - Logging setup (console + daily rolling files)
//! - Background service registration
//! - Running instance tracking (pid file)
//! - Clean uninstall

pub mod autostart;
pub mod cli;
pub mod config;
pub mod instance;
pub mod logging;
pub mod paths;
pub mod signals;
pub mod uninstall;

pub use autostart::{Autostart, AutostartError};
pub use cli::{Args, Command};
pub use config::{AppConfig, ConfigError, ConfigOverrides};
pub use instance::{InstanceError, PidFile, StopOutcome};
pub use uninstall::{perform_uninstall, UninstallOptions, UninstallPaths, UninstallResult};
