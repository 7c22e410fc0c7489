//! Per-zone occupancy debouncer.
//!
//! Detection is frame-noisy: a vehicle flickers in and out of a polygon
//! across frames as its bounding box jitters. Each zone therefore runs a
//! small state machine that latches the first observed class label and holds
//! it for a fixed wall-clock window, giving downstream consumers a stable
//! value instead of a frame-rate stream of toggles.
//!
//! The window is measured in wall-clock seconds, not frames, so it is
//! unaffected by the loop's frame decimation. The reset after the window
//! elapses is unconditional: a still-occupied zone reports `none` for one
//! processed frame and re-latches on the next.

use std::fmt;

/// Debounce state for one zone. Owned by the pipeline's state array and
/// mutated only by [`ZoneDebounceState::step`].
#[derive(Clone, Debug, Default)]
pub struct ZoneDebounceState {
    latched_vehicle: Option<String>,
    is_latched: bool,
    latch_start: Option<f64>,
}

/// Result of one debounce step for one zone.
#[derive(Clone, Debug, PartialEq)]
pub struct DebounceReport {
    pub zone: usize,
    /// Latched class label, or `None` when the zone reports empty.
    pub vehicle: Option<String>,
    /// Seconds since the latch engaged; 0.0 when not latched.
    pub elapsed_secs: f64,
}

impl DebounceReport {
    /// Two-decimal elapsed display, matching the status-line format.
    pub fn elapsed_display(&self) -> String {
        format!("{:.2}", self.elapsed_secs)
    }
}

impl fmt::Display for DebounceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "zone {} -> {} [{}]",
            self.zone,
            self.vehicle.as_deref().unwrap_or("none"),
            self.elapsed_display()
        )
    }
}

impl ZoneDebounceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_latched(&self) -> bool {
        self.is_latched
    }

    pub fn latched_vehicle(&self) -> Option<&str> {
        self.latched_vehicle.as_deref()
    }

    /// Advance the state machine by one processed frame.
    ///
    /// `occupancy` is this zone's slice of the frame snapshot (labels in
    /// detection order), `now_secs` the current wall-clock timestamp and
    /// `interval_secs` the configured debounce window.
    ///
    /// An empty zone latches the *first* label of a non-empty snapshot.
    /// A latched zone ignores further occupancy until the window elapses,
    /// then resets unconditionally; occupancy seen on the reset frame is
    /// only noticed on the following one.
    pub fn step(
        &mut self,
        zone: usize,
        occupancy: &[String],
        now_secs: f64,
        interval_secs: f64,
    ) -> DebounceReport {
        if !self.is_latched && !occupancy.is_empty() {
            self.is_latched = true;
            self.latch_start = Some(now_secs);
            self.latched_vehicle = Some(occupancy[0].clone());
            log::info!("zone {}: latched '{}'", zone, occupancy[0]);
        }

        if self.is_latched {
            if let Some(start) = self.latch_start {
                if now_secs - start >= interval_secs {
                    log::info!(
                        "zone {}: latch window elapsed, releasing '{}'",
                        zone,
                        self.latched_vehicle.as_deref().unwrap_or("none")
                    );
                    self.is_latched = false;
                    self.latch_start = None;
                    self.latched_vehicle = None;
                }
            }
        }

        let elapsed_secs = self
            .latch_start
            .map(|start| now_secs - start)
            .unwrap_or(0.0);

        DebounceReport {
            zone,
            vehicle: self.latched_vehicle.clone(),
            elapsed_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_zone_stays_empty() {
        let mut state = ZoneDebounceState::new();
        let report = state.step(0, &[], 100.0, 2.0);
        assert_eq!(report.vehicle, None);
        assert_eq!(report.elapsed_secs, 0.0);
        assert!(!state.is_latched());
    }

    #[test]
    fn first_occupancy_latches_first_label() {
        let mut state = ZoneDebounceState::new();
        let report = state.step(0, &occ(&["car", "bus"]), 100.0, 2.0);
        assert_eq!(report.vehicle.as_deref(), Some("car"));
        assert_eq!(report.elapsed_secs, 0.0);
        assert!(state.is_latched());
    }

    #[test]
    fn latched_value_holds_until_window_elapses() {
        let mut state = ZoneDebounceState::new();
        state.step(0, &occ(&["car"]), 100.0, 2.0);

        let mid = state.step(0, &occ(&["bus"]), 101.0, 2.0);
        assert_eq!(mid.vehicle.as_deref(), Some("car"));
        assert_eq!(mid.elapsed_display(), "1.00");

        let done = state.step(0, &occ(&["bus"]), 102.1, 2.0);
        assert_eq!(done.vehicle, None);
        assert_eq!(done.elapsed_secs, 0.0);
    }

    #[test]
    fn mid_window_snapshots_do_not_reset_the_start_time() {
        let mut state = ZoneDebounceState::new();
        state.step(0, &occ(&["car"]), 100.0, 5.0);
        state.step(0, &occ(&["truck"]), 102.0, 5.0);
        let report = state.step(0, &occ(&["bus"]), 104.0, 5.0);
        assert_eq!(report.vehicle.as_deref(), Some("car"));
        assert_eq!(report.elapsed_display(), "4.00");
    }

    #[test]
    fn reset_is_unconditional_and_relatches_next_frame() {
        let mut state = ZoneDebounceState::new();
        state.step(0, &occ(&["car"]), 100.0, 2.0);

        // Still occupied when the window elapses: reports none this frame.
        let released = state.step(0, &occ(&["car"]), 102.5, 2.0);
        assert_eq!(released.vehicle, None);

        // Occupancy is noticed again on the following frame.
        let relatched = state.step(0, &occ(&["car"]), 102.6, 2.0);
        assert_eq!(relatched.vehicle.as_deref(), Some("car"));
        assert_eq!(relatched.elapsed_secs, 0.0);
    }

    #[test]
    fn latch_at_time_zero_tracks_elapsed() {
        // Scenario 1: square zone, interval 2.0s, "car" enters at t=0.
        let mut state = ZoneDebounceState::new();

        let t0 = state.step(0, &occ(&["car"]), 0.0, 2.0);
        assert_eq!(t0.vehicle.as_deref(), Some("car"));
        assert_eq!(t0.elapsed_display(), "0.00");

        let t1 = state.step(0, &occ(&["car"]), 1.0, 2.0);
        assert_eq!(t1.vehicle.as_deref(), Some("car"));
        assert_eq!(t1.elapsed_display(), "1.00");

        let t2 = state.step(0, &[], 2.1, 2.0);
        assert_eq!(t2.vehicle, None);
        assert_eq!(t2.elapsed_display(), "0.00");
    }

    #[test]
    fn zero_interval_latches_and_releases_in_one_step() {
        let mut state = ZoneDebounceState::new();
        let report = state.step(0, &occ(&["car"]), 50.0, 0.0);
        assert_eq!(report.vehicle, None);
        assert!(!state.is_latched());
    }
}
