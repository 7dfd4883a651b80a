//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ConfigOverrides;
use crate::logging::LogTarget;

/// Proxy Switcher - toggles the system proxy based on the active network
#[derive(Parser, Debug)]
#[command(
    name = "proxy-switcher",
    version,
    about,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Proxy address to enable on the trusted network
    #[arg(long, global = true, value_name = "HOST:PORT")]
    pub proxy: Option<String>,

    /// Seconds between network checks
    #[arg(long, global = true, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Enable debug logging (also logs to the console)
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the switcher in the foreground, logging to the console
    Run,

    /// Run the switcher in the background (used by the autostart entry)
    Service,

    /// Register the background service and save the configuration
    Install {
        /// Replace an existing registration
        #[arg(long)]
        force: bool,

        /// Do not start the service now
        #[arg(long)]
        no_start: bool,
    },

    /// Reset the proxy and remove the service, logs and configuration
    Uninstall {
        /// Leave the configuration file in place
        #[arg(long)]
        keep_config: bool,
    },

    /// Evaluate the network once and print the result
    Check {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl Args {
    /// Flags that override the configuration file.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            proxy_address: self.proxy.clone(),
            poll_interval_secs: self.interval,
            log_level: if self.debug {
                Some("debug".to_string())
            } else {
                self.log_level.clone()
            },
        }
    }

    /// Where this invocation logs.
    ///
    /// Uninstall removes the log directory, so it never opens a log file.
    pub fn log_target(&self) -> LogTarget {
        match self.command {
            Command::Uninstall { .. } => LogTarget::Console,
            Command::Run | Command::Check { json: false } => LogTarget::FileAndConsole,
            _ if self.debug => LogTarget::FileAndConsole,
            _ => LogTarget::File,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_is_an_error() {
        assert!(Args::try_parse_from(["proxy-switcher"]).is_err());
    }

    #[test]
    fn test_run_with_global_options() {
        let args = Args::try_parse_from([
            "proxy-switcher",
            "run",
            "--proxy",
            "10.0.0.1:8080",
            "--interval",
            "3",
        ])
        .unwrap();

        assert_eq!(args.command, Command::Run);
        let overrides = args.overrides();
        assert_eq!(overrides.proxy_address.as_deref(), Some("10.0.0.1:8080"));
        assert_eq!(overrides.poll_interval_secs, Some(3));
        assert_eq!(overrides.log_level, None);
        assert_eq!(args.log_target(), LogTarget::FileAndConsole);
    }

    #[test]
    fn test_service_logs_to_file_only() {
        let args = Args::try_parse_from(["proxy-switcher", "service"]).unwrap();
        assert_eq!(args.log_target(), LogTarget::File);

        let args = Args::try_parse_from(["proxy-switcher", "--debug", "service"]).unwrap();
        assert_eq!(args.log_target(), LogTarget::FileAndConsole);
        assert_eq!(args.overrides().log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_uninstall_never_logs_to_file() {
        let args = Args::try_parse_from(["proxy-switcher", "--debug", "uninstall"]).unwrap();
        assert_eq!(args.log_target(), LogTarget::Console);
    }

    #[test]
    fn test_uninstall_keep_config() {
        let args = Args::try_parse_from(["proxy-switcher", "uninstall", "--keep-config"]).unwrap();
        assert_eq!(args.command, Command::Uninstall { keep_config: true });
        assert_eq!(args.overrides().log_level, None);
    }

    #[test]
    fn test_install_flags() {
        let args = Args::try_parse_from(["proxy-switcher", "install", "--force"]).unwrap();
        assert_eq!(
            args.command,
            Command::Install {
                force: true,
                no_start: false
            }
        );
    }

    #[test]
    fn test_check_json() {
        let args = Args::try_parse_from(["proxy-switcher", "check", "--json"]).unwrap();
        assert_eq!(args.command, Command::Check { json: true });
        // Keeps stdout clean for the JSON report.
        assert_eq!(args.log_target(), LogTarget::File);
    }
}
