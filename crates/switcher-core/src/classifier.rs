//! Per-interface classification.

use std::net::{IpAddr, Ipv4Addr};

use crate::network::{AdapterSnapshot, NetworkInterface};
use crate::state::{InterfaceObservation, INTERNAL_PREFIX};

/// Returns true if the address lies in the trusted internal range.
///
/// The check is lexical on the dotted-quad form, so `10.0.0.1` matches while
/// `110.0.0.1` does not.
pub fn is_internal_ipv4(addr: Ipv4Addr) -> bool {
    addr.to_string().starts_with(INTERNAL_PREFIX)
}

/// Classifies one candidate interface against the adapter snapshot.
///
/// Callers filter out down and loopback interfaces first. Non-IPv4 bindings
/// are ignored, and an interface missing from the snapshot is treated as
/// wired.
pub fn classify_interface(
    iface: &NetworkInterface,
    adapters: &AdapterSnapshot,
) -> InterfaceObservation {
    let is_wireless = adapters.is_wireless(&iface.name);

    let mut has_internal = false;
    let mut has_external = false;
    for addr in &iface.addresses {
        let v4 = match addr {
            IpAddr::V4(v4) => *v4,
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => v4,
                None => continue,
            },
        };

        if is_internal_ipv4(v4) {
            has_internal = true;
        } else {
            has_external = true;
        }
    }

    InterfaceObservation {
        name: iface.name.clone(),
        is_wireless,
        has_internal_ipv4: has_internal,
        has_external_ipv4_wireless: is_wireless && has_external,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn v4(s: &str) -> IpAddr {
        IpAddr::V4(s.parse().unwrap())
    }

    #[test]
    fn internal_prefix_is_lexical() {
        assert!(is_internal_ipv4("10.0.0.5".parse().unwrap()));
        assert!(is_internal_ipv4("10.255.1.1".parse().unwrap()));
        assert!(!is_internal_ipv4("110.0.0.1".parse().unwrap()));
        assert!(!is_internal_ipv4("192.168.1.10".parse().unwrap()));
    }

    #[test]
    fn wired_internal_interface() {
        let adapters = AdapterSnapshot::new().with_adapter("Ethernet", false);
        let iface = NetworkInterface::new("Ethernet", vec![v4("10.0.0.5")]);

        let obs = classify_interface(&iface, &adapters);
        assert!(!obs.is_wireless);
        assert!(obs.has_internal_ipv4);
        assert!(!obs.has_external_ipv4_wireless);
    }

    #[test]
    fn wireless_external_interface() {
        let adapters = AdapterSnapshot::new().with_adapter("Wi-Fi", true);
        let iface = NetworkInterface::new("Wi-Fi", vec![v4("192.168.43.7")]);

        let obs = classify_interface(&iface, &adapters);
        assert!(obs.is_wireless);
        assert!(!obs.has_internal_ipv4);
        assert!(obs.has_external_ipv4_wireless);
    }

    #[test]
    fn missing_adapter_defaults_to_wired() {
        let iface = NetworkInterface::new("usb0", vec![v4("172.20.10.2")]);
        let obs = classify_interface(&iface, &AdapterSnapshot::new());
        assert!(!obs.is_wireless);
        assert!(!obs.has_external_ipv4_wireless);
    }

    #[test]
    fn ipv6_only_bindings_are_ignored() {
        let adapters = AdapterSnapshot::new().with_adapter("Wi-Fi", true);
        let iface = NetworkInterface::new(
            "Wi-Fi",
            vec![IpAddr::V6("fe80::1".parse::<Ipv6Addr>().unwrap())],
        );

        let obs = classify_interface(&iface, &adapters);
        assert!(!obs.has_internal_ipv4);
        assert!(!obs.has_external_ipv4_wireless);
    }

    #[test]
    fn mixed_addresses_are_or_ed() {
        let adapters = AdapterSnapshot::new().with_adapter("Wi-Fi", true);
        let iface = NetworkInterface::new("Wi-Fi", vec![v4("10.1.2.3"), v4("192.168.0.4")]);

        let obs = classify_interface(&iface, &adapters);
        assert!(obs.has_internal_ipv4);
        assert!(obs.has_external_ipv4_wireless);
    }

    #[test]
    fn no_addresses() {
        let iface = NetworkInterface::new("eth1", vec![]);
        let obs = classify_interface(&iface, &AdapterSnapshot::new());
        assert!(!obs.has_internal_ipv4);
        assert!(!obs.has_external_ipv4_wireless);
    }
}
