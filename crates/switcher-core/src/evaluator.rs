//! Environment evaluation.
//!
//! Aggregates the observations of every candidate interface into one target
//! state. Priority is fixed:
//!
//! 1. Any wireless interface with an external IPv4 address -> `Off`
//! 2. Any wired interface with an internal IPv4 address -> `On`
//! 3. Otherwise -> `Off`

use tracing::{debug, error, trace};

use crate::classifier::classify_interface;
use crate::network::{AdapterSnapshotProvider, InterfaceSource, ObservationError};
use crate::state::{InterfaceObservation, ProxyState};

/// Resolves a tick's observations into one target state.
pub fn resolve_target(observations: &[InterfaceObservation]) -> ProxyState {
    if observations.iter().any(|o| o.has_external_ipv4_wireless) {
        return ProxyState::Off;
    }

    if observations
        .iter()
        .any(|o| !o.is_wireless && o.has_internal_ipv4)
    {
        return ProxyState::On;
    }

    ProxyState::Off
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Target state for this tick.
    pub target: ProxyState,
    /// Set when observation failed and `target` is the held fallback.
    pub failure: Option<ObservationError>,
}

impl Evaluation {
    /// Returns true if the target was derived from fresh observations.
    pub fn is_observed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Reads the environment through its collaborators and resolves a target.
#[derive(Debug, Clone)]
pub struct EnvironmentEvaluator<A, I> {
    adapters: A,
    interfaces: I,
}

impl<A, I> EnvironmentEvaluator<A, I>
where
    A: AdapterSnapshotProvider,
    I: InterfaceSource,
{
    /// Creates an evaluator over the given collaborators.
    pub fn new(adapters: A, interfaces: I) -> Self {
        Self {
            adapters,
            interfaces,
        }
    }

    /// Classifies every up, non-loopback interface.
    ///
    /// The adapter snapshot is taken once and shared by all interfaces.
    pub fn observe(&self) -> Result<Vec<InterfaceObservation>, ObservationError> {
        let adapters = self.adapters.adapter_snapshot()?;
        let interfaces = self.interfaces.active_interfaces()?;

        let observations = interfaces
            .iter()
            .filter(|iface| iface.is_candidate())
            .map(|iface| {
                let obs = classify_interface(iface, &adapters);
                trace!(
                    interface = %obs.name,
                    wireless = obs.is_wireless,
                    internal = obs.has_internal_ipv4,
                    external_wireless = obs.has_external_ipv4_wireless,
                    "Classified interface"
                );
                obs
            })
            .collect();

        Ok(observations)
    }

    /// Evaluates the environment.
    ///
    /// When observation fails, `fallback` (the last confirmed state) is
    /// returned unchanged together with the failure.
    pub fn evaluate(&self, fallback: ProxyState) -> Evaluation {
        match self.observe() {
            Ok(observations) => {
                let target = resolve_target(&observations);
                debug!(
                    interfaces = observations.len(),
                    %target,
                    "Evaluated network environment"
                );
                Evaluation {
                    target,
                    failure: None,
                }
            }
            Err(e) => {
                error!("Network observation failed, holding {}: {}", fallback, e);
                Evaluation {
                    target: fallback,
                    failure: Some(e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{AdapterSnapshot, InterfaceFlags, NetworkInterface, Result};
    use std::net::IpAddr;
    use tokio_test::{assert_err, assert_ok};

    struct FixedAdapters(Result<AdapterSnapshot>);

    impl AdapterSnapshotProvider for FixedAdapters {
        fn adapter_snapshot(&self) -> Result<AdapterSnapshot> {
            self.0.clone()
        }
    }

    struct FixedInterfaces(Result<Vec<NetworkInterface>>);

    impl InterfaceSource for FixedInterfaces {
        fn active_interfaces(&self) -> Result<Vec<NetworkInterface>> {
            self.0.clone()
        }
    }

    fn iface(name: &str, addr: &str) -> NetworkInterface {
        NetworkInterface::new(name, vec![addr.parse::<IpAddr>().unwrap()])
    }

    fn evaluator(
        adapters: AdapterSnapshot,
        interfaces: Vec<NetworkInterface>,
    ) -> EnvironmentEvaluator<FixedAdapters, FixedInterfaces> {
        EnvironmentEvaluator::new(FixedAdapters(Ok(adapters)), FixedInterfaces(Ok(interfaces)))
    }

    fn obs(wireless: bool, internal: bool, external_wireless: bool) -> InterfaceObservation {
        InterfaceObservation {
            name: "x".to_string(),
            is_wireless: wireless,
            has_internal_ipv4: internal,
            has_external_ipv4_wireless: external_wireless,
        }
    }

    #[test]
    fn test_resolve_empty_is_off() {
        assert_eq!(resolve_target(&[]), ProxyState::Off);
    }

    #[test]
    fn test_resolve_external_wifi_wins() {
        let observations = [obs(false, true, false), obs(true, false, true)];
        assert_eq!(resolve_target(&observations), ProxyState::Off);
    }

    #[test]
    fn test_resolve_wired_internal_is_on() {
        assert_eq!(resolve_target(&[obs(false, true, false)]), ProxyState::On);
    }

    #[test]
    fn test_resolve_wireless_internal_is_not_trigger() {
        assert_eq!(resolve_target(&[obs(true, true, false)]), ProxyState::Off);
    }

    #[test]
    fn test_external_wifi_beats_wired_internal() {
        let adapters = AdapterSnapshot::new()
            .with_adapter("Wi-Fi", true)
            .with_adapter("Ethernet", false);
        let eval = evaluator(
            adapters,
            vec![iface("Ethernet", "10.0.0.5"), iface("Wi-Fi", "192.168.43.2")],
        );

        let result = eval.evaluate(ProxyState::Unknown);
        assert_eq!(result.target, ProxyState::Off);
        assert!(result.is_observed());
    }

    #[test]
    fn test_only_wired_internal_is_on() {
        let adapters = AdapterSnapshot::new().with_adapter("Ethernet", false);
        let eval = evaluator(adapters, vec![iface("Ethernet", "10.0.0.5")]);
        assert_eq!(eval.evaluate(ProxyState::Off).target, ProxyState::On);
    }

    #[test]
    fn test_only_wireless_internal_is_off() {
        let adapters = AdapterSnapshot::new().with_adapter("Wi-Fi", true);
        let eval = evaluator(adapters, vec![iface("Wi-Fi", "10.0.0.5")]);
        assert_eq!(eval.evaluate(ProxyState::On).target, ProxyState::Off);
    }

    #[test]
    fn test_no_qualifying_interfaces_is_off() {
        let lo = iface("lo", "127.0.0.1").with_flags(InterfaceFlags {
            up: true,
            loopback: true,
        });
        let down = iface("eth0", "10.0.0.9").with_flags(InterfaceFlags {
            up: false,
            loopback: false,
        });
        let eval = evaluator(AdapterSnapshot::new(), vec![lo, down]);
        assert_eq!(eval.evaluate(ProxyState::On).target, ProxyState::Off);
    }

    #[test]
    fn test_snapshot_failure_holds_previous_state() {
        let eval = EnvironmentEvaluator::new(
            FixedAdapters(Err(ObservationError::AdapterSnapshot("denied".into()))),
            FixedInterfaces(Ok(vec![iface("Ethernet", "10.0.0.5")])),
        );

        let result = eval.evaluate(ProxyState::Off);
        assert_eq!(result.target, ProxyState::Off);
        assert!(matches!(
            result.failure,
            Some(ObservationError::AdapterSnapshot(_))
        ));
    }

    #[test]
    fn test_interface_failure_holds_previous_state() {
        let eval = EnvironmentEvaluator::new(
            FixedAdapters(Ok(AdapterSnapshot::new())),
            FixedInterfaces(Err(ObservationError::InterfaceList("gone".into()))),
        );

        let result = eval.evaluate(ProxyState::On);
        assert_eq!(result.target, ProxyState::On);
        assert!(!result.is_observed());
    }

    #[test]
    fn test_observe_filters_candidates() {
        let lo = iface("lo", "127.0.0.1").with_flags(InterfaceFlags {
            up: true,
            loopback: true,
        });
        let adapters = AdapterSnapshot::new()
            .with_adapter("Ethernet", false)
            .with_adapter("Wi-Fi", true);
        let eval = evaluator(
            adapters,
            vec![lo, iface("Ethernet", "10.0.0.5"), iface("Wi-Fi", "192.168.0.7")],
        );

        let observations = assert_ok!(eval.observe());
        let names: Vec<_> = observations.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Ethernet", "Wi-Fi"]);
        assert!(observations[1].has_external_ipv4_wireless);

        let failing = EnvironmentEvaluator::new(
            FixedAdapters(Ok(AdapterSnapshot::new())),
            FixedInterfaces(Err(ObservationError::InterfaceList("gone".into()))),
        );
        assert_err!(failing.observe());
    }
}
