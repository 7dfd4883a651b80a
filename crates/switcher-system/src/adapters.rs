//! Adapter hardware snapshot.
//!
//! Reports which adapters are IEEE 802.11 devices, keyed by the same display
//! name the interface list uses:
//!
//! - Windows: `GetAdaptersAddresses` (`IfType` 71)
//! - macOS: `networksetup -listallhardwareports`
//! - Linux: `/sys/class/net/<name>/wireless` or `phy80211`

use std::path::Path;

use switcher_core::network::{
    AdapterInfo, AdapterSnapshot, AdapterSnapshotProvider, ObservationError, Result,
};
use tracing::trace;

#[cfg(target_os = "macos")]
use crate::command::run;

/// IANA ifType for IEEE 802.11 wireless interfaces.
pub const IF_TYPE_IEEE80211: u32 = 71;

/// Retries of `GetAdaptersAddresses` when the buffer turns out too small.
#[cfg(target_os = "windows")]
const MAX_GET_ADAPTERS_RETRIES: usize = 3;

/// Default sysfs directory listing network devices on Linux.
pub const SYSFS_NET: &str = "/sys/class/net";

/// Adapter snapshot provider backed by the operating system.
#[derive(Debug, Clone, Default)]
pub struct SystemAdapters;

impl SystemAdapters {
    /// Creates a new provider.
    pub fn new() -> Self {
        Self
    }
}

impl AdapterSnapshotProvider for SystemAdapters {
    fn adapter_snapshot(&self) -> Result<AdapterSnapshot> {
        let snapshot = platform_snapshot()?;
        trace!("Adapter snapshot: {} adapter(s)", snapshot.len());
        Ok(snapshot)
    }
}

#[cfg(target_os = "linux")]
fn platform_snapshot() -> Result<AdapterSnapshot> {
    sysfs_snapshot(Path::new(SYSFS_NET))
}

#[cfg(target_os = "windows")]
fn platform_snapshot() -> Result<AdapterSnapshot> {
    use windows_sys::Win32::Foundation::{ERROR_BUFFER_OVERFLOW, ERROR_SUCCESS};
    use windows_sys::Win32::NetworkManagement::IpHelper::{
        GetAdaptersAddresses, GAA_FLAG_INCLUDE_PREFIX, IP_ADAPTER_ADDRESSES_LH,
    };
    use windows_sys::Win32::Networking::WinSock::AF_UNSPEC;

    let mut size: u32 = 15_000;

    for _ in 0..MAX_GET_ADAPTERS_RETRIES {
        // u64 elements keep the buffer aligned for IP_ADAPTER_ADDRESSES_LH.
        let mut buffer = vec![0u64; (size as usize).div_ceil(8)];
        let head = buffer.as_mut_ptr() as *mut IP_ADAPTER_ADDRESSES_LH;

        // SAFETY: `head` points to `size` writable bytes owned by `buffer`.
        let ret = unsafe {
            GetAdaptersAddresses(
                AF_UNSPEC as u32,
                GAA_FLAG_INCLUDE_PREFIX,
                std::ptr::null(),
                head,
                &mut size,
            )
        };

        match ret {
            ERROR_SUCCESS => {
                let mut snapshot = AdapterSnapshot::new();
                let mut current = head as *const IP_ADAPTER_ADDRESSES_LH;
                while !current.is_null() {
                    // SAFETY: the list lives inside `buffer`, which outlives the walk;
                    // `FriendlyName` is a NUL-terminated UTF-16 string or null.
                    let adapter = unsafe { &*current };
                    let name = unsafe { wide_ptr_to_string(adapter.FriendlyName) };
                    if !name.is_empty() {
                        snapshot.insert(
                            name,
                            AdapterInfo {
                                is_wireless: adapter.IfType == IF_TYPE_IEEE80211,
                            },
                        );
                    }
                    current = adapter.Next;
                }
                return Ok(snapshot);
            }
            ERROR_BUFFER_OVERFLOW => continue,
            code => {
                return Err(ObservationError::AdapterSnapshot(format!(
                    "GetAdaptersAddresses failed: {}",
                    std::io::Error::from_raw_os_error(code as i32)
                )))
            }
        }
    }

    Err(ObservationError::AdapterSnapshot(
        "GetAdaptersAddresses: buffer still too small after retries".to_string(),
    ))
}

/// Reads a NUL-terminated UTF-16 string.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated sequence of `u16`.
#[cfg(target_os = "windows")]
unsafe fn wide_ptr_to_string(ptr: *const u16) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    utf16_until_nul(std::slice::from_raw_parts(ptr, len))
}

#[cfg(target_os = "macos")]
fn platform_snapshot() -> Result<AdapterSnapshot> {
    let stdout = run("networksetup", ["-listallhardwareports"])
        .map_err(|e| ObservationError::AdapterSnapshot(e.to_string()))?;
    Ok(parse_hardware_ports(&stdout))
}

// Without hardware metadata every interface counts as wired.
#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
fn platform_snapshot() -> Result<AdapterSnapshot> {
    Ok(AdapterSnapshot::new())
}

/// Reads adapters from a sysfs-style directory.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn sysfs_snapshot(root: &Path) -> Result<AdapterSnapshot> {
    let entries = std::fs::read_dir(root).map_err(|e| {
        ObservationError::AdapterSnapshot(format!("{}: {}", root.display(), e))
    })?;

    let snapshot = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let path = entry.path();
            let is_wireless = path.join("wireless").exists() || path.join("phy80211").exists();
            (
                entry.file_name().to_string_lossy().into_owned(),
                AdapterInfo { is_wireless },
            )
        })
        .collect();

    Ok(snapshot)
}

/// Decodes UTF-16 up to the first NUL.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn utf16_until_nul(units: &[u16]) -> String {
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end])
}

/// Parses `networksetup -listallhardwareports` output.
///
/// Each block has a `Hardware Port:` line followed by `Device:`; ports named
/// `Wi-Fi` or `AirPort` are wireless.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn parse_hardware_ports(stdout: &str) -> AdapterSnapshot {
    let mut snapshot = AdapterSnapshot::new();
    let mut port: Option<&str> = None;

    for line in stdout.lines().map(str::trim) {
        if let Some(name) = line.strip_prefix("Hardware Port:") {
            port = Some(name.trim());
        } else if let Some(device) = line.strip_prefix("Device:") {
            let device = device.trim();
            if let (Some(name), false) = (port.take(), device.is_empty()) {
                let is_wireless = matches!(name, "Wi-Fi" | "AirPort");
                snapshot.insert(device, AdapterInfo { is_wireless });
            }
        }
    }

    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_utf16_until_nul() {
        let wide: Vec<u16> = "WLAN 无线网络\0ignored".encode_utf16().collect();
        assert_eq!(utf16_until_nul(&wide), "WLAN 无线网络");

        let wide: Vec<u16> = "以太网".encode_utf16().collect();
        assert_eq!(utf16_until_nul(&wide), "以太网");
        assert_eq!(utf16_until_nul(&[]), "");
    }

    #[test]
    fn test_parse_hardware_ports() {
        let stdout = "\
Hardware Port: Ethernet
Device: en0
Ethernet Address: aa:bb:cc:dd:ee:ff

Hardware Port: Wi-Fi
Device: en1
Ethernet Address: 11:22:33:44:55:66

Hardware Port: Thunderbolt Bridge
Device: bridge0
Ethernet Address: N/A

VLAN Configurations
===================
";
        let snapshot = parse_hardware_ports(stdout);
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.is_wireless("en1"));
        assert!(!snapshot.is_wireless("en0"));
        assert!(!snapshot.is_wireless("bridge0"));
    }

    #[test]
    fn test_sysfs_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("wlan0/wireless")).unwrap();
        fs::create_dir_all(dir.path().join("wlp2s0/phy80211")).unwrap();
        fs::create_dir_all(dir.path().join("eth0")).unwrap();
        fs::create_dir_all(dir.path().join("lo")).unwrap();

        let snapshot = sysfs_snapshot(dir.path()).unwrap();
        assert_eq!(snapshot.len(), 4);
        assert!(snapshot.is_wireless("wlan0"));
        assert!(snapshot.is_wireless("wlp2s0"));
        assert!(!snapshot.is_wireless("eth0"));
    }

    #[test]
    fn test_sysfs_snapshot_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = sysfs_snapshot(&dir.path().join("missing"));
        assert!(matches!(result, Err(ObservationError::AdapterSnapshot(_))));
    }
}
