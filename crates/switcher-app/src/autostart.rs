//! Background service registration.
//!
//! The switcher runs in the background by registering `proxy-switcher service`
//! to start at login:
//! - Windows: Registry `HKCU\Software\Microsoft\Windows\CurrentVersion\Run`
//! - macOS: LaunchAgent plist in `~/Library/LaunchAgents/`
//! - Linux: `.desktop` file in `~/.config/autostart/`

use std::env;
use std::path::{Path, PathBuf};

use auto_launch::{AutoLaunch, AutoLaunchBuilder};
use thiserror::Error;

/// App name used for autostart registration.
const APP_NAME: &str = "ProxySwitcher";

/// Subcommand the autostart entry launches.
pub const SERVICE_ARG: &str = "service";

/// Errors that can occur during autostart operations.
#[derive(Debug, Error)]
pub enum AutostartError {
    /// Failed to get executable path.
    #[error("failed to get executable path")]
    ExecutablePath,

    /// Failed to create autostart entry.
    #[error("failed to create autostart: {0}")]
    CreateFailed(String),

    /// Failed to enable autostart.
    #[error("failed to enable autostart: {0}")]
    EnableFailed(String),

    /// Failed to disable autostart.
    #[error("failed to disable autostart: {0}")]
    DisableFailed(String),

    /// The service is registered already.
    #[error("service is already installed (use --force to reinstall)")]
    AlreadyInstalled,
}

/// Result type for autostart operations.
pub type Result<T> = std::result::Result<T, AutostartError>;

/// Manages the login registration of the background service.
pub struct Autostart {
    exe_path: PathBuf,
    args: Vec<String>,
    launcher: AutoLaunch,
}

impl Autostart {
    /// Creates a manager for the running executable.
    ///
    /// A non-default `config` file is passed to the service on launch.
    pub fn new(config: Option<&Path>) -> Result<Self> {
        Self::with_path(Self::get_executable_path()?, config)
    }

    /// Creates a manager with a custom executable path.
    pub fn with_path(exe_path: PathBuf, config: Option<&Path>) -> Result<Self> {
        let args = service_args(config)?;
        let launcher = Self::create_launcher(&exe_path, &args)?;
        Ok(Self {
            exe_path,
            args,
            launcher,
        })
    }

    /// Gets the path to the current executable.
    pub fn get_executable_path() -> Result<PathBuf> {
        env::current_exe().map_err(|_| AutostartError::ExecutablePath)
    }

    fn create_launcher(exe_path: &Path, args: &[String]) -> Result<AutoLaunch> {
        let exe_str = exe_path.to_str().ok_or(AutostartError::ExecutablePath)?;

        #[cfg(target_os = "macos")]
        let launcher = AutoLaunchBuilder::new()
            .set_app_name(APP_NAME)
            .set_app_path(exe_str)
            .set_args(args)
            .set_use_launch_agent(true)
            .build()
            .map_err(|e| AutostartError::CreateFailed(e.to_string()))?;

        #[cfg(not(target_os = "macos"))]
        let launcher = AutoLaunchBuilder::new()
            .set_app_name(APP_NAME)
            .set_app_path(exe_str)
            .set_args(args)
            .build()
            .map_err(|e| AutostartError::CreateFailed(e.to_string()))?;

        Ok(launcher)
    }

    /// Checks if the service is registered.
    pub fn is_installed(&self) -> bool {
        self.launcher.is_enabled().unwrap_or(false)
    }

    /// Registers the service. Refuses to overwrite an existing entry unless
    /// `force` is set.
    pub fn install(&self, force: bool) -> Result<()> {
        if self.is_installed() && !force {
            return Err(AutostartError::AlreadyInstalled);
        }

        self.launcher
            .enable()
            .map_err(|e| AutostartError::EnableFailed(e.to_string()))
    }

    /// Removes the registration. Succeeds when nothing is registered.
    pub fn uninstall(&self) -> Result<()> {
        if !self.is_installed() {
            return Ok(());
        }

        self.launcher
            .disable()
            .map_err(|e| AutostartError::DisableFailed(e.to_string()))
    }

    /// Command line the autostart entry runs.
    pub fn command(&self) -> String {
        let mut cmd = format!("\"{}\"", self.exe_path.display());
        for arg in &self.args {
            cmd.push(' ');
            cmd.push_str(arg);
        }
        cmd
    }

    /// Executable the autostart entry points at.
    pub fn executable(&self) -> &Path {
        &self.exe_path
    }

    /// Arguments the autostart entry passes.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Arguments that start the background service.
fn service_args(config: Option<&Path>) -> Result<Vec<String>> {
    let mut args = vec![SERVICE_ARG.to_string()];
    if let Some(config) = config {
        let config = config.to_str().ok_or(AutostartError::ExecutablePath)?;
        args.push("--config".to_string());
        args.push(config.to_string());
    }
    Ok(args)
}
