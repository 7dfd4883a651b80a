//! Network observation contracts.
//!
//! The engine never talks to the operating system directly. It reads two
//! point-in-time views through these traits:
//!
//! - [`AdapterSnapshotProvider`]: hardware metadata keyed by adapter name
//! - [`InterfaceSource`]: logical interfaces with flags and bound addresses

use std::collections::HashMap;
use std::net::IpAddr;

use thiserror::Error;

/// Errors raised while observing the network environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObservationError {
    /// The adapter hardware snapshot could not be obtained.
    #[error("failed to read adapter snapshot: {0}")]
    AdapterSnapshot(String),

    /// The interface list could not be obtained.
    #[error("failed to list network interfaces: {0}")]
    InterfaceList(String),
}

/// Result type for observation operations.
pub type Result<T> = std::result::Result<T, ObservationError>;

/// Hardware metadata for one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdapterInfo {
    /// Adapter is an IEEE 802.11 device.
    pub is_wireless: bool,
}

/// Point-in-time adapter metadata keyed by display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterSnapshot {
    adapters: HashMap<String, AdapterInfo>,
}

impl AdapterSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records metadata for an adapter, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, info: AdapterInfo) {
        self.adapters.insert(name.into(), info);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_adapter(mut self, name: impl Into<String>, is_wireless: bool) -> Self {
        self.insert(name, AdapterInfo { is_wireless });
        self
    }

    /// Exact-name lookup.
    pub fn lookup(&self, name: &str) -> Option<AdapterInfo> {
        self.adapters.get(name).copied()
    }

    /// Returns true only when the adapter is known and wireless.
    pub fn is_wireless(&self, name: &str) -> bool {
        self.lookup(name).map(|a| a.is_wireless).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl FromIterator<(String, AdapterInfo)> for AdapterSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, AdapterInfo)>>(iter: T) -> Self {
        Self {
            adapters: iter.into_iter().collect(),
        }
    }
}

/// Interface flags relevant to candidate filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterfaceFlags {
    /// Administratively up.
    pub up: bool,
    /// Loopback device.
    pub loopback: bool,
}

impl InterfaceFlags {
    /// Flags of an ordinary, active interface.
    pub const ACTIVE: Self = Self {
        up: true,
        loopback: false,
    };
}

/// A logical network interface as reported by the operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    /// Display name, matched against [`AdapterSnapshot`] keys.
    pub name: String,
    /// Interface flags.
    pub flags: InterfaceFlags,
    /// Bound addresses. Only IPv4 entries carry evidence.
    pub addresses: Vec<IpAddr>,
}

impl NetworkInterface {
    /// Creates an up, non-loopback interface.
    pub fn new(name: impl Into<String>, addresses: Vec<IpAddr>) -> Self {
        Self {
            name: name.into(),
            flags: InterfaceFlags::ACTIVE,
            addresses,
        }
    }

    /// Replaces the flags.
    pub fn with_flags(mut self, flags: InterfaceFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Up and not loopback.
    pub fn is_candidate(&self) -> bool {
        self.flags.up && !self.flags.loopback
    }
}

/// Source of adapter hardware metadata.
pub trait AdapterSnapshotProvider {
    /// Returns a fresh snapshot. Called once per tick.
    fn adapter_snapshot(&self) -> Result<AdapterSnapshot>;
}

/// Source of the logical interface list.
pub trait InterfaceSource {
    /// Returns every interface the OS reports, including down and loopback ones.
    fn active_interfaces(&self) -> Result<Vec<NetworkInterface>>;
}

impl<T: AdapterSnapshotProvider + ?Sized> AdapterSnapshotProvider for &T {
    fn adapter_snapshot(&self) -> Result<AdapterSnapshot> {
        (**self).adapter_snapshot()
    }
}

impl<T: InterfaceSource + ?Sized> InterfaceSource for &T {
    fn active_interfaces(&self) -> Result<Vec<NetworkInterface>> {
        (**self).active_interfaces()
    }
}
