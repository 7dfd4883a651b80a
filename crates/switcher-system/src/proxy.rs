//! System proxy effector.
//!
//! Writes the on/off decision into the platform's proxy store and tells the
//! OS to pick it up:
//!
//! - Windows: `HKCU\...\Internet Settings` + WinInet refresh
//! - macOS: `networksetup` web and secure web proxy on the service that owns
//!   the default route
//! - Linux: GNOME `gsettings` (`org.gnome.system.proxy`)

use std::io;

use switcher_core::effector::{EffectorError, ProxyEffector, Result};
use switcher_core::state::CommitDecision;
use tracing::{debug, info};

#[cfg(any(target_os = "macos", target_os = "linux"))]
use crate::command::run;

/// A proxy endpoint split into host and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAddress {
    /// Host name or IPv4 address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ProxyAddress {
    /// Parses `host:port`, tolerating an `http://` scheme and a trailing `/`.
    pub fn parse(address: &str) -> Result<Self> {
        let trimmed = address.trim();
        let without_scheme = trimmed
            .strip_prefix("http://")
            .or_else(|| trimmed.strip_prefix("https://"))
            .unwrap_or(trimmed)
            .trim_end_matches('/');

        let (host, port) = without_scheme
            .rsplit_once(':')
            .ok_or_else(|| EffectorError::InvalidAddress(format!("{} (expected host:port)", address)))?;

        if host.is_empty() || host.contains(':') {
            return Err(EffectorError::InvalidAddress(address.to_string()));
        }

        let port = port
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| EffectorError::InvalidAddress(format!("{} (bad port)", address)))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl std::fmt::Display for ProxyAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Maps an IO error from a proxy backend onto an effector error.
pub(crate) fn backend_error(context: &str, err: io::Error) -> EffectorError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => {
            EffectorError::PermissionDenied(format!("{}: {}", context, err))
        }
        io::ErrorKind::NotFound => EffectorError::Unsupported(format!("{}: {}", context, err)),
        _ => EffectorError::Backend(format!("{}: {}", context, err)),
    }
}

/// Proxy effector backed by the operating system's proxy settings.
#[derive(Debug, Clone, Default)]
pub struct SystemProxy;

impl SystemProxy {
    /// Creates a new effector.
    pub fn new() -> Self {
        Self
    }
}

impl ProxyEffector for SystemProxy {
    fn apply(&self, decision: &CommitDecision) -> Result<()> {
        debug!(
            enable = decision.enable,
            address = %decision.address,
            "Applying system proxy state"
        );

        if decision.enable {
            enable_proxy(&decision.address)?;
            info!("System proxy enabled: {}", decision.address);
        } else {
            disable_proxy()?;
            info!("System proxy disabled");
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        clear_proxy()?;
        info!("System proxy cleared");
        Ok(())
    }
}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(target_os = "windows")]
mod windows {
    use winreg::enums::{HKEY_CURRENT_USER, KEY_READ, KEY_WRITE};
    use winreg::RegKey;
    use windows_sys::Win32::Networking::WinInet::{
        InternetSetOptionW, INTERNET_OPTION_REFRESH, INTERNET_OPTION_SETTINGS_CHANGED,
    };

    use super::{backend_error, Result};

    const INTERNET_SETTINGS: &str =
        r"Software\Microsoft\Windows\CurrentVersion\Internet Settings";

    fn open_settings() -> Result<RegKey> {
        RegKey::predef(HKEY_CURRENT_USER)
            .open_subkey_with_flags(INTERNET_SETTINGS, KEY_READ | KEY_WRITE)
            .map_err(|e| backend_error("open Internet Settings", e))
    }

    pub(super) fn set_proxy(enable: bool, address: &str) -> Result<()> {
        let key = open_settings()?;

        key.set_value("ProxyEnable", &u32::from(enable))
            .map_err(|e| backend_error("set ProxyEnable", e))?;
        if enable {
            key.set_value("ProxyServer", &address.to_string())
                .map_err(|e| backend_error("set ProxyServer", e))?;
        }

        refresh();
        Ok(())
    }

    pub(super) fn clear_proxy() -> Result<()> {
        set_proxy(false, "")?;

        let key = open_settings()?;
        key.set_value("ProxyServer", &String::new())
            .map_err(|e| backend_error("erase ProxyServer", e))?;

        refresh();
        Ok(())
    }

    /// Tells WinInet clients to reload proxy settings from the registry.
    fn refresh() {
        // SAFETY: both options take no buffer and a null handle targets the
        // global settings.
        unsafe {
            InternetSetOptionW(
                std::ptr::null(),
                INTERNET_OPTION_SETTINGS_CHANGED,
                std::ptr::null(),
                0,
            );
            InternetSetOptionW(std::ptr::null(), INTERNET_OPTION_REFRESH, std::ptr::null(), 0);
        }
    }
}

#[cfg(target_os = "windows")]
fn enable_proxy(address: &str) -> Result<()> {
    if address.trim().is_empty() {
        return Err(EffectorError::InvalidAddress("empty address".to_string()));
    }
    windows::set_proxy(true, address)
}

#[cfg(target_os = "windows")]
fn disable_proxy() -> Result<()> {
    windows::set_proxy(false, "")
}

#[cfg(target_os = "windows")]
fn clear_proxy() -> Result<()> {
    windows::clear_proxy()
}

// ============================================================================
// macOS Implementation
// ============================================================================

/// A macOS network service and the device it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NetworkService {
    pub name: String,
    pub device: Option<String>,
    pub enabled: bool,
}

/// Parses `networksetup -listnetworkserviceorder`.
///
/// Services appear as `(1) Ethernet` or `(*) Bluetooth PAN` (disabled),
/// followed by `(Hardware Port: Ethernet, Device: en0)`.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn parse_service_order(stdout: &str) -> Vec<NetworkService> {
    let mut services: Vec<NetworkService> = Vec::new();

    for line in stdout.lines().map(str::trim) {
        if let Some(port) = line.strip_prefix("(Hardware Port:") {
            let device = port
                .split_once("Device:")
                .map(|(_, device)| device.trim_end_matches(')').trim())
                .filter(|device| !device.is_empty());
            if let (Some(service), Some(device)) = (services.last_mut(), device) {
                service.device.get_or_insert_with(|| device.to_string());
            }
        } else if let Some(rest) = line.strip_prefix('(') {
            let Some((marker, name)) = rest.split_once(')') else {
                continue;
            };
            let enabled = marker != "*";
            if (enabled && marker.parse::<u32>().is_err()) || name.trim().is_empty() {
                continue;
            }
            services.push(NetworkService {
                name: name.trim().to_string(),
                device: None,
                enabled,
            });
        }
    }

    services
}

/// Parses the `interface:` line of `route -n get default`.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn parse_route_interface(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("interface:"))
        .map(|device| device.trim().to_string())
        .find(|device| !device.is_empty())
}

/// Services to receive the proxy: the one owning the primary interface, or
/// every enabled service when that cannot be determined.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn select_services(services: &[NetworkService], primary: Option<&str>) -> Vec<String> {
    let enabled = services.iter().filter(|service| service.enabled);

    if let Some(primary) = primary {
        if let Some(service) = enabled
            .clone()
            .find(|service| service.device.as_deref() == Some(primary))
        {
            return vec![service.name.clone()];
        }
    }

    enabled.map(|service| service.name.clone()).collect()
}

#[cfg(target_os = "macos")]
fn network_services() -> Result<Vec<NetworkService>> {
    let stdout = run("networksetup", ["-listnetworkserviceorder"])
        .map_err(|e| backend_error("networksetup -listnetworkserviceorder", e))?;
    let services = parse_service_order(&stdout);
    if services.iter().any(|service| service.enabled) {
        Ok(services)
    } else {
        Err(EffectorError::Backend("no enabled network service".to_string()))
    }
}

#[cfg(target_os = "macos")]
fn primary_interface() -> Option<String> {
    match run("route", ["-n", "get", "default"]) {
        Ok(stdout) => parse_route_interface(&stdout),
        Err(e) => {
            debug!("No default route: {}", e);
            None
        }
    }
}

#[cfg(target_os = "macos")]
fn set_proxy_state(service: &str, state: &str) -> Result<()> {
    run("networksetup", ["-setwebproxystate", service, state])
        .map_err(|e| backend_error("networksetup -setwebproxystate", e))?;
    run("networksetup", ["-setsecurewebproxystate", service, state])
        .map_err(|e| backend_error("networksetup -setsecurewebproxystate", e))?;
    Ok(())
}

#[cfg(target_os = "macos")]
fn enable_proxy(address: &str) -> Result<()> {
    let address = ProxyAddress::parse(address)?;
    let services = network_services()?;
    let primary = primary_interface();
    let port = address.port.to_string();

    for service in select_services(&services, primary.as_deref()) {
        debug!(service = %service, "Enabling proxy on network service");
        run(
            "networksetup",
            ["-setwebproxy", service.as_str(), address.host.as_str(), port.as_str()],
        )
        .map_err(|e| backend_error("networksetup -setwebproxy", e))?;
        run(
            "networksetup",
            ["-setsecurewebproxy", service.as_str(), address.host.as_str(), port.as_str()],
        )
        .map_err(|e| backend_error("networksetup -setsecurewebproxy", e))?;

        set_proxy_state(&service, "on")?;
    }
    Ok(())
}

// Turning off every enabled service covers a primary interface that changed
// since the proxy was enabled.
#[cfg(target_os = "macos")]
fn disable_proxy() -> Result<()> {
    for service in select_services(&network_services()?, None) {
        set_proxy_state(&service, "off")?;
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn clear_proxy() -> Result<()> {
    // networksetup cannot store an empty server; turning both proxies off is
    // the reset state.
    disable_proxy()
}

// ============================================================================
// Linux Implementation
// ============================================================================

#[cfg(target_os = "linux")]
fn gsettings(args: &[&str]) -> Result<()> {
    run("gsettings", args)
        .map(|_| ())
        .map_err(|e| backend_error("gsettings", e))
}

#[cfg(target_os = "linux")]
fn enable_proxy(address: &str) -> Result<()> {
    let address = ProxyAddress::parse(address)?;
    let port = address.port.to_string();

    for schema in ["org.gnome.system.proxy.http", "org.gnome.system.proxy.https"] {
        gsettings(&["set", schema, "host", address.host.as_str()])?;
        gsettings(&["set", schema, "port", port.as_str()])?;
    }
    gsettings(&["set", "org.gnome.system.proxy", "mode", "manual"])
}

#[cfg(target_os = "linux")]
fn disable_proxy() -> Result<()> {
    gsettings(&["set", "org.gnome.system.proxy", "mode", "none"])
}

#[cfg(target_os = "linux")]
fn clear_proxy() -> Result<()> {
    disable_proxy()?;
    for schema in ["org.gnome.system.proxy.http", "org.gnome.system.proxy.https"] {
        gsettings(&["reset", schema, "host"])?;
        gsettings(&["reset", schema, "port"])?;
    }
    Ok(())
}

// ============================================================================
// Unsupported platforms
// ============================================================================

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
fn enable_proxy(_address: &str) -> Result<()> {
    Err(EffectorError::Unsupported(std::env::consts::OS.to_string()))
}

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
fn disable_proxy() -> Result<()> {
    Err(EffectorError::Unsupported(std::env::consts::OS.to_string()))
}

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
fn clear_proxy() -> Result<()> {
    disable_proxy()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_parse_host_port() {
        let addr = assert_ok!(ProxyAddress::parse("10.1.2.3:8080"));
        assert_eq!(addr.host, "10.1.2.3");
        assert_eq!(addr.port, 8080);
        assert_eq!(addr.to_string(), "10.1.2.3:8080");
    }

    #[test]
    fn test_parse_strips_scheme() {
        let addr = assert_ok!(ProxyAddress::parse(" http://proxy.corp.example:3128/ "));
        assert_eq!(addr.host, "proxy.corp.example");
        assert_eq!(addr.port, 3128);
    }

    #[test]
    fn test_parse_rejects_bad_addresses() {
        for bad in ["", "proxy", ":8080", "proxy:", "proxy:0", "proxy:70000", "::1:80"] {
            assert!(
                matches!(
                    ProxyAddress::parse(bad),
                    Err(EffectorError::InvalidAddress(_))
                ),
                "accepted {:?}",
                bad
            );
        }
    }

    const SERVICE_ORDER: &str = "\
An asterisk (*) denotes that a network service is disabled.
(1) Wi-Fi
(Hardware Port: Wi-Fi, Device: en0)

(2) USB 10/100/1000 LAN
(Hardware Port: USB 10/100/1000 LAN, Device: en7)

(3) Thunderbolt Bridge
(Hardware Port: Thunderbolt Bridge, Device: bridge0)

(*) Bluetooth PAN
(Hardware Port: Bluetooth PAN, Device: en5)

(4) iPhone USB
(Hardware Port: iPhone USB, Device: )
";

    #[test]
    fn test_parse_service_order() {
        let services = parse_service_order(SERVICE_ORDER);
        let names: Vec<_> = services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["Wi-Fi", "USB 10/100/1000 LAN", "Thunderbolt Bridge", "Bluetooth PAN", "iPhone USB"]
        );
        assert_eq!(services[1].device.as_deref(), Some("en7"));
        assert!(!services[3].enabled);
        assert_eq!(services[4].device, None);
    }

    #[test]
    fn test_parse_route_interface() {
        let stdout = "   route to: default
destination: default
       mask: default
    gateway: 10.8.0.1
  interface: en7
      flags: <UP,GATEWAY,DONE,STATIC,PRCLONING>
";
        assert_eq!(parse_route_interface(stdout).as_deref(), Some("en7"));
        assert_eq!(parse_route_interface("route: writing to routing socket: not in table"), None);
    }

    #[test]
    fn test_select_service_of_primary_interface() {
        let services = parse_service_order(SERVICE_ORDER);

        // Wired adapter holds the default route; Wi-Fi must not be chosen.
        assert_eq!(select_services(&services, Some("en7")), ["USB 10/100/1000 LAN"]);

        // Disabled or unknown devices fall back to every enabled service.
        let all = ["Wi-Fi", "USB 10/100/1000 LAN", "Thunderbolt Bridge", "iPhone USB"];
        assert_eq!(select_services(&services, Some("en5")), all);
        assert_eq!(select_services(&services, Some("utun3")), all);
        assert_eq!(select_services(&services, None), all);
    }

    #[test]
    fn test_backend_error_mapping() {
        let err = backend_error("gsettings", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, EffectorError::PermissionDenied(_)));

        let err = backend_error("gsettings", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, EffectorError::Unsupported(_)));

        let err = backend_error("gsettings", io::Error::other("exit 1"));
        assert!(matches!(err, EffectorError::Backend(_)));
    }
}
