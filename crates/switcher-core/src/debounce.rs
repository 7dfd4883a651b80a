//! Debounced proxy state machine.
//!
//! A new target has to be seen on [`DEBOUNCE_THRESHOLD`] consecutive ticks
//! before it is committed. Input that alternates every tick never commits,
//! because each sample replaces the pending candidate and restarts its count.
//!
//! The machine only decides. The caller performs the commit and reports the
//! outcome through [`DebounceMachine::confirm`]; a failed commit is simply not
//! confirmed, which leaves the count at the threshold so the next matching
//! sample retries immediately.

use crate::state::{CommitDecision, ProxyState, DEBOUNCE_THRESHOLD};

/// Debounce state carried across ticks.
#[derive(Debug, Clone)]
pub struct DebounceMachine {
    address: String,
    last_confirmed: ProxyState,
    pending: ProxyState,
    consecutive_matches: u32,
}

impl DebounceMachine {
    /// Creates a machine in the startup state.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            last_confirmed: ProxyState::Unknown,
            pending: ProxyState::Unknown,
            consecutive_matches: 0,
        }
    }

    /// Last state successfully committed.
    pub fn last_confirmed(&self) -> ProxyState {
        self.last_confirmed
    }

    /// Candidate currently under observation.
    pub fn pending(&self) -> ProxyState {
        self.pending
    }

    /// Consecutive samples of the pending candidate.
    pub fn consecutive_matches(&self) -> u32 {
        self.consecutive_matches
    }

    /// Proxy address placed into commit decisions.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Feeds one target sample.
    ///
    /// Returns a decision when the sample completes the debounce window.
    pub fn observe(&mut self, target: ProxyState) -> Option<CommitDecision> {
        // Unknown only reaches here through the observation fail-safe and
        // never becomes a candidate.
        if target == self.last_confirmed || !target.is_known() {
            self.pending = target;
            self.consecutive_matches = 0;
            return None;
        }

        if target != self.pending {
            self.pending = target;
            self.consecutive_matches = 1;
        } else {
            self.consecutive_matches += 1;
        }

        if self.consecutive_matches >= DEBOUNCE_THRESHOLD {
            Some(CommitDecision::for_state(target, self.address.clone()))
        } else {
            None
        }
    }

    /// Records a successful commit of `state`.
    pub fn confirm(&mut self, state: ProxyState) {
        self.last_confirmed = state;
        self.consecutive_matches = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProxyState::{Off, On, Unknown};

    const ADDR: &str = "10.10.1.1:3128";

    /// Feeds samples, confirming every decision, and returns the decisions.
    fn run(machine: &mut DebounceMachine, samples: &[ProxyState]) -> Vec<CommitDecision> {
        let mut commits = Vec::new();
        for &sample in samples {
            if let Some(decision) = machine.observe(sample) {
                machine.confirm(decision.target());
                commits.push(decision);
            }
        }
        commits
    }

    #[test]
    fn test_initial_state() {
        let machine = DebounceMachine::new(ADDR);
        assert_eq!(machine.last_confirmed(), Unknown);
        assert_eq!(machine.pending(), Unknown);
        assert_eq!(machine.consecutive_matches(), 0);
    }

    #[test]
    fn test_two_consecutive_samples_commit() {
        let mut machine = DebounceMachine::new(ADDR);
        assert_eq!(machine.observe(On), None);

        let decision = machine.observe(On).unwrap();
        assert!(decision.enable);
        assert_eq!(decision.address, ADDR);

        machine.confirm(On);
        assert_eq!(machine.last_confirmed(), On);
        assert_eq!(machine.consecutive_matches(), 0);
    }

    #[test]
    fn test_oscillation_never_commits() {
        let mut machine = DebounceMachine::new(ADDR);
        let samples: Vec<_> = (0..50).map(|i| if i % 2 == 0 { On } else { Off }).collect();
        assert!(run(&mut machine, &samples).is_empty());
        assert_eq!(machine.last_confirmed(), Unknown);
    }

    #[test]
    fn test_oscillation_after_confirm_never_commits() {
        let mut machine = DebounceMachine::new(ADDR);
        run(&mut machine, &[Off, Off]);
        assert_eq!(machine.last_confirmed(), Off);

        // Off is confirmed, so only On can be a candidate and it never repeats.
        let commits = run(&mut machine, &[On, Off, On, Off, On, Off]);
        assert!(commits.is_empty());
    }

    #[test]
    fn test_stable_sample_resets_pending() {
        let mut machine = DebounceMachine::new(ADDR);
        run(&mut machine, &[On, On]);

        assert_eq!(machine.observe(Off), None);
        assert_eq!(machine.pending(), Off);
        assert_eq!(machine.consecutive_matches(), 1);

        assert_eq!(machine.observe(On), None);
        assert_eq!(machine.pending(), On);
        assert_eq!(machine.consecutive_matches(), 0);

        // The interrupted Off run starts over.
        assert_eq!(machine.observe(Off), None);
        assert!(machine.observe(Off).is_some());
    }

    #[test]
    fn test_commit_iff_two_consecutive_new_targets() {
        let cases: &[(&[ProxyState], usize)] = &[
            (&[On], 0),
            (&[On, On], 1),
            (&[On, Off, On], 0),
            (&[On, On, On], 1),
            (&[On, On, Off, Off], 2),
            (&[Off, On, On, Off], 1),
            (&[Off, Off, Off, On, Off, On], 1),
        ];

        for (samples, expected) in cases {
            let mut machine = DebounceMachine::new(ADDR);
            let commits = run(&mut machine, samples);
            assert_eq!(commits.len(), *expected, "samples: {:?}", samples);
        }
    }

    #[test]
    fn test_unconfirmed_commit_retries_immediately() {
        let mut machine = DebounceMachine::new(ADDR);
        machine.observe(On);
        assert!(machine.observe(On).is_some());

        // Effector failed: no confirm.
        assert_eq!(machine.last_confirmed(), Unknown);
        assert!(machine.observe(On).is_some());
        assert_eq!(machine.consecutive_matches(), 3);
    }

    #[test]
    fn test_unknown_target_never_commits() {
        let mut machine = DebounceMachine::new(ADDR);
        run(&mut machine, &[On, On]);

        assert_eq!(machine.observe(Unknown), None);
        assert_eq!(machine.observe(Unknown), None);
        assert_eq!(machine.last_confirmed(), On);
        assert_eq!(machine.consecutive_matches(), 0);
    }
}
