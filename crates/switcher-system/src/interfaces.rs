//! Logical interface list backed by `if-addrs`.

use std::net::IpAddr;
use std::path::Path;

use switcher_core::network::{
    InterfaceFlags, InterfaceSource, NetworkInterface, ObservationError, Result,
};

#[cfg(target_os = "linux")]
use crate::adapters::SYSFS_NET;

/// `IFF_UP` bit of the kernel interface flags.
const IFF_UP: u32 = 0x1;

/// Interface source backed by the operating system.
#[derive(Debug, Clone, Default)]
pub struct SystemInterfaces;

impl SystemInterfaces {
    /// Creates a new source.
    pub fn new() -> Self {
        Self
    }
}

impl InterfaceSource for SystemInterfaces {
    fn active_interfaces(&self) -> Result<Vec<NetworkInterface>> {
        let addrs = if_addrs::get_if_addrs()
            .map_err(|e| ObservationError::InterfaceList(e.to_string()))?;

        Ok(group_by_name(
            addrs
                .iter()
                .map(|iface| (iface.name.as_str(), iface.ip(), iface.is_loopback())),
            is_interface_up,
        ))
    }
}

/// Groups per-address entries into interfaces, preserving first-seen order.
///
/// An interface is loopback if any of its addresses is.
pub(crate) fn group_by_name<'a, F>(
    entries: impl IntoIterator<Item = (&'a str, IpAddr, bool)>,
    is_up: F,
) -> Vec<NetworkInterface>
where
    F: Fn(&str) -> bool,
{
    let mut interfaces: Vec<NetworkInterface> = Vec::new();

    for (name, ip, loopback) in entries {
        match interfaces.iter_mut().find(|iface| iface.name == name) {
            Some(iface) => {
                iface.addresses.push(ip);
                iface.flags.loopback |= loopback;
            }
            None => interfaces.push(NetworkInterface {
                name: name.to_string(),
                flags: InterfaceFlags {
                    up: is_up(name),
                    loopback,
                },
                addresses: vec![ip],
            }),
        }
    }

    interfaces
}

#[cfg(target_os = "linux")]
fn is_interface_up(name: &str) -> bool {
    sysfs_is_up(Path::new(SYSFS_NET), name)
}

// Only configured interfaces report addresses outside Linux.
#[cfg(not(target_os = "linux"))]
fn is_interface_up(_name: &str) -> bool {
    true
}

/// Reads `IFF_UP` from `<root>/<device>/flags`. Unreadable flags count as up.
///
/// Address labels such as `eth0:1` resolve to their parent device.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn sysfs_is_up(root: &Path, name: &str) -> bool {
    let device = name.split(':').next().unwrap_or(name);
    let Ok(raw) = std::fs::read_to_string(root.join(device).join("flags")) else {
        return true;
    };

    let raw = raw.trim();
    let hex = raw.strip_prefix("0x").unwrap_or(raw);
    u32::from_str_radix(hex, 16)
        .map(|flags| flags & IFF_UP != 0)
        .unwrap_or(true)
}
