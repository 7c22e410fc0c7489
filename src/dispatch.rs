//! Notification dispatcher.
//!
//! Compares each zone's debounced value against the last value sent for that
//! zone and fans out only the differences, so quiescent zones cost zero
//! network activity. One channel is active per deployment; batch-capable
//! channels receive the whole zone vector as a single record whenever any
//! zone changed.

use crate::debounce::DebounceReport;
use crate::transport::{Commit, Delivery, NotifyChannel};

/// Wire sentinel for an unlatched zone.
pub const NO_VEHICLE: &str = "none";

/// Per-cycle dispatch result, exposed to the loop for observability.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Zones whose value changed this cycle.
    pub changed: Vec<usize>,
    /// Sends attempted (batch counts as one).
    pub attempted: usize,
    /// Sends that reported success.
    pub delivered: usize,
}

impl DispatchOutcome {
    pub fn quiescent(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Owns the per-zone last-sent record and the active channel.
pub struct Dispatcher {
    last_sent: Vec<String>,
    channel: Option<Box<dyn NotifyChannel>>,
}

impl Dispatcher {
    /// `channel = None` (selector `none`) tracks state changes without any
    /// transport activity.
    pub fn new(zone_count: usize, channel: Option<Box<dyn NotifyChannel>>) -> Self {
        Self {
            last_sent: vec![NO_VEHICLE.to_string(); zone_count],
            channel,
        }
    }

    /// Fan out this cycle's changed values. Transport failures are absorbed
    /// here: logged, counted, never propagated.
    pub fn dispatch(&mut self, reports: &[DebounceReport]) -> DispatchOutcome {
        debug_assert_eq!(reports.len(), self.last_sent.len());

        let values: Vec<String> = reports
            .iter()
            .map(|r| r.vehicle.clone().unwrap_or_else(|| NO_VEHICLE.to_string()))
            .collect();
        let changed: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(zone, value)| self.last_sent.get(*zone) != Some(*value))
            .map(|(zone, _)| zone)
            .collect();

        let mut outcome = DispatchOutcome {
            changed: changed.clone(),
            ..DispatchOutcome::default()
        };
        if changed.is_empty() {
            return outcome;
        }

        let Some(channel) = self.channel.as_mut() else {
            // Display-only deployment: record the change, send nothing.
            for &zone in &changed {
                self.last_sent[zone] = values[zone].clone();
            }
            return outcome;
        };

        match channel.delivery() {
            Delivery::Batch => {
                outcome.attempted = 1;
                let ok = match channel.send_batch(&values) {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!("{} batch send failed: {:#}", channel.name(), e);
                        false
                    }
                };
                if ok {
                    outcome.delivered = 1;
                }
                if ok || channel.commit() == Commit::OnAttempt {
                    self.last_sent.clone_from_slice(&values);
                }
            }
            Delivery::PerZone => {
                for &zone in &changed {
                    outcome.attempted += 1;
                    let value = &values[zone];
                    let ok = match channel.send(zone, value) {
                        Ok(()) => true,
                        Err(e) => {
                            log::warn!(
                                "{} send failed for zone {} value '{}': {:#}",
                                channel.name(),
                                zone,
                                value,
                                e
                            );
                            false
                        }
                    };
                    if ok {
                        outcome.delivered += 1;
                    }
                    if ok || channel.commit() == Commit::OnAttempt {
                        self.last_sent[zone] = value.clone();
                    }
                }
            }
        }

        outcome
    }

    pub fn last_sent(&self, zone: usize) -> Option<&str> {
        self.last_sent.get(zone).map(String::as_str)
    }

    /// Release the active channel's resources. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.shutdown();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::{Arc, Mutex};

    fn report(zone: usize, vehicle: Option<&str>) -> DebounceReport {
        DebounceReport {
            zone,
            vehicle: vehicle.map(String::from),
            elapsed_secs: 0.0,
        }
    }

    /// Records sends and fails on demand; used in place of a live transport.
    struct RecordingChannel {
        log: Arc<Mutex<Vec<(usize, String)>>>,
        batches: Arc<Mutex<Vec<Vec<String>>>>,
        fail: Arc<Mutex<bool>>,
        delivery: Delivery,
        commit: Commit,
    }

    impl RecordingChannel {
        fn per_zone(commit: Commit) -> (Self, Arc<Mutex<Vec<(usize, String)>>>, Arc<Mutex<bool>>) {
            let log = Arc::new(Mutex::new(Vec::new()));
            let fail = Arc::new(Mutex::new(false));
            (
                Self {
                    log: log.clone(),
                    batches: Arc::new(Mutex::new(Vec::new())),
                    fail: fail.clone(),
                    delivery: Delivery::PerZone,
                    commit,
                },
                log,
                fail,
            )
        }

        fn batch() -> (Self, Arc<Mutex<Vec<Vec<String>>>>) {
            let batches = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    log: Arc::new(Mutex::new(Vec::new())),
                    batches: batches.clone(),
                    fail: Arc::new(Mutex::new(false)),
                    delivery: Delivery::Batch,
                    commit: Commit::OnAttempt,
                },
                batches,
            )
        }
    }

    impl NotifyChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn delivery(&self) -> Delivery {
            self.delivery
        }

        fn commit(&self) -> Commit {
            self.commit
        }

        fn send(&mut self, zone: usize, value: &str) -> anyhow::Result<()> {
            if *self.fail.lock().unwrap() {
                return Err(anyhow!("simulated failure"));
            }
            self.log.lock().unwrap().push((zone, value.to_string()));
            Ok(())
        }

        fn send_batch(&mut self, values: &[String]) -> anyhow::Result<()> {
            if *self.fail.lock().unwrap() {
                return Err(anyhow!("simulated failure"));
            }
            self.batches.lock().unwrap().push(values.to_vec());
            Ok(())
        }
    }

    #[test]
    fn change_gated_dispatch_sends_exactly_on_changes() {
        // Debounced sequence [A, A, A, B, B] -> exactly two sends.
        let (channel, log, _) = RecordingChannel::per_zone(Commit::OnSuccess);
        let mut dispatcher = Dispatcher::new(1, Some(Box::new(channel)));

        let sequence = [Some("car"), Some("car"), Some("car"), Some("bus"), Some("bus")];
        for value in sequence {
            dispatcher.dispatch(&[report(0, value)]);
        }

        let sends = log.lock().unwrap();
        assert_eq!(
            *sends,
            vec![(0, "car".to_string()), (0, "bus".to_string())]
        );
    }

    #[test]
    fn quiescent_cycle_sends_nothing() {
        // Scenario 2: ["car", "none"], unchanged next cycle -> 0 sends.
        let (channel, log, _) = RecordingChannel::per_zone(Commit::OnSuccess);
        let mut dispatcher = Dispatcher::new(2, Some(Box::new(channel)));

        let cycle = [report(0, Some("car")), report(1, None)];
        let first = dispatcher.dispatch(&cycle);
        assert_eq!(first.changed, vec![0]);
        assert_eq!(first.attempted, 1);

        let second = dispatcher.dispatch(&cycle);
        assert!(second.quiescent());
        assert_eq!(second.attempted, 0);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn on_success_commit_retries_after_failure() {
        // Scenario 3: failed socket-style send leaves last-sent unchanged,
        // so the same value retries next cycle.
        let (channel, log, fail) = RecordingChannel::per_zone(Commit::OnSuccess);
        let mut dispatcher = Dispatcher::new(1, Some(Box::new(channel)));

        *fail.lock().unwrap() = true;
        let failed = dispatcher.dispatch(&[report(0, Some("car"))]);
        assert_eq!(failed.attempted, 1);
        assert_eq!(failed.delivered, 0);
        assert_eq!(dispatcher.last_sent(0), Some(NO_VEHICLE));

        *fail.lock().unwrap() = false;
        let retried = dispatcher.dispatch(&[report(0, Some("car"))]);
        assert_eq!(retried.delivered, 1);
        assert_eq!(dispatcher.last_sent(0), Some("car"));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn on_attempt_commit_does_not_retry_after_failure() {
        let (channel, log, fail) = RecordingChannel::per_zone(Commit::OnAttempt);
        let mut dispatcher = Dispatcher::new(1, Some(Box::new(channel)));

        *fail.lock().unwrap() = true;
        dispatcher.dispatch(&[report(0, Some("car"))]);
        assert_eq!(dispatcher.last_sent(0), Some("car"));

        *fail.lock().unwrap() = false;
        let next = dispatcher.dispatch(&[report(0, Some("car"))]);
        assert!(next.quiescent());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn failure_in_one_zone_does_not_block_the_cycle_or_later_state() {
        let (channel, log, fail) = RecordingChannel::per_zone(Commit::OnSuccess);
        let mut dispatcher = Dispatcher::new(2, Some(Box::new(channel)));

        *fail.lock().unwrap() = true;
        let outcome = dispatcher.dispatch(&[report(0, Some("car")), report(1, Some("bus"))]);
        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.delivered, 0);

        *fail.lock().unwrap() = false;
        let outcome = dispatcher.dispatch(&[report(0, Some("car")), report(1, Some("bus"))]);
        assert_eq!(outcome.delivered, 2);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn batch_channel_receives_full_vector_on_any_change() {
        let (channel, batches) = RecordingChannel::batch();
        let mut dispatcher = Dispatcher::new(3, Some(Box::new(channel)));

        let outcome = dispatcher.dispatch(&[
            report(0, Some("car")),
            report(1, None),
            report(2, None),
        ]);
        assert_eq!(outcome.changed, vec![0]);
        assert_eq!(outcome.attempted, 1);

        let sent = batches.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            vec!["car".to_string(), "none".to_string(), "none".to_string()]
        );
    }

    #[test]
    fn none_transport_tracks_changes_silently() {
        let mut dispatcher = Dispatcher::new(1, None);
        let outcome = dispatcher.dispatch(&[report(0, Some("car"))]);
        assert_eq!(outcome.changed, vec![0]);
        assert_eq!(outcome.attempted, 0);
        assert_eq!(dispatcher.last_sent(0), Some("car"));
        assert!(dispatcher.dispatch(&[report(0, Some("car"))]).quiescent());
    }

    #[test]
    fn release_to_none_is_dispatched_as_a_change() {
        let (channel, log, _) = RecordingChannel::per_zone(Commit::OnSuccess);
        let mut dispatcher = Dispatcher::new(1, Some(Box::new(channel)));

        dispatcher.dispatch(&[report(0, Some("car"))]);
        dispatcher.dispatch(&[report(0, None)]);

        let sends = log.lock().unwrap();
        assert_eq!(
            *sends,
            vec![(0, "car".to_string()), (0, NO_VEHICLE.to_string())]
        );
    }
}
