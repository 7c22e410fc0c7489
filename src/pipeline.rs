//! Orchestration loop.
//!
//! One processing cycle runs strictly in sequence on a single thread:
//! assign detections to zones, step every zone's debounce state machine,
//! dispatch changed values. The loop applies a fixed sampling decimation to
//! bound compute cost and checks a cooperative stop flag once per cycle;
//! transport sessions are released on every exit path.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::assign::{self, OccupancySnapshot};
use crate::debounce::{DebounceReport, ZoneDebounceState};
use crate::detect::{ClassList, Detection, DetectionSource};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::geometry::ZoneStore;
use crate::render::Renderer;

/// Everything one processed frame produced, for rendering and logging.
#[derive(Clone, Debug)]
pub struct CycleReport {
    /// 1-based index of the processed frame (after decimation).
    pub cycle: u64,
    pub snapshot: OccupancySnapshot,
    pub reports: Vec<DebounceReport>,
    pub outcome: DispatchOutcome,
    pub processing_ms: f64,
}

/// Totals for a completed run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_seen: u64,
    pub cycles: u64,
    pub sends_attempted: u64,
    pub sends_delivered: u64,
}

pub struct Pipeline {
    zones: ZoneStore,
    classes: ClassList,
    states: Vec<ZoneDebounceState>,
    dispatcher: Dispatcher,
    interval_secs: f64,
    sample_every: u32,
    frames_seen: u64,
    cycles: u64,
}

impl Pipeline {
    pub fn new(
        zones: ZoneStore,
        classes: ClassList,
        dispatcher: Dispatcher,
        interval_secs: f64,
        sample_every: u32,
    ) -> Self {
        let states = (0..zones.len()).map(|_| ZoneDebounceState::new()).collect();
        Self {
            zones,
            classes,
            states,
            dispatcher,
            interval_secs,
            sample_every: sample_every.max(1),
            frames_seen: 0,
            cycles: 0,
        }
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Per-frame entry point: assign, debounce each zone in index order,
    /// dispatch. `now_secs` is the wall-clock timestamp of the frame.
    pub fn process_frame(&mut self, detections: &[Detection], now_secs: f64) -> CycleReport {
        let started = Instant::now();
        self.cycles += 1;

        let snapshot = assign::assign(&self.zones, &self.classes, detections);

        let interval_secs = self.interval_secs;
        let reports: Vec<DebounceReport> = self
            .states
            .iter_mut()
            .enumerate()
            .map(|(zone, state)| state.step(zone, &snapshot[zone], now_secs, interval_secs))
            .collect();

        let outcome = self.dispatcher.dispatch(&reports);

        CycleReport {
            cycle: self.cycles,
            snapshot,
            reports,
            outcome,
            processing_ms: started.elapsed().as_secs_f64() * 1_000.0,
        }
    }

    /// Pull frames until end-of-stream, renderer quit, or the stop flag.
    ///
    /// The transport session is released before returning, on error paths
    /// included.
    pub fn run(
        &mut self,
        source: &mut dyn DetectionSource,
        renderer: &mut dyn Renderer,
        stop: &AtomicBool,
    ) -> Result<RunSummary> {
        let result = self.run_inner(source, renderer, stop);
        self.dispatcher.shutdown();
        result
    }

    fn run_inner(
        &mut self,
        source: &mut dyn DetectionSource,
        renderer: &mut dyn Renderer,
        stop: &AtomicBool,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        loop {
            if stop.load(Ordering::SeqCst) {
                log::info!("stop requested, shutting down after {} cycle(s)", self.cycles);
                break;
            }
            let Some(detections) = source.next_frame()? else {
                log::info!("detection source ended after {} frame(s)", self.frames_seen);
                break;
            };
            self.frames_seen += 1;
            summary.frames_seen = self.frames_seen;

            // Fixed decimation: process every Nth frame.
            if self.frames_seen % u64::from(self.sample_every) != 0 {
                continue;
            }

            let cycle = self.process_frame(&detections, crate::wall_clock_secs());
            summary.cycles = self.cycles;
            summary.sends_attempted += cycle.outcome.attempted as u64;
            summary.sends_delivered += cycle.outcome.delivered as u64;

            if !cycle.outcome.quiescent() {
                log::debug!(
                    "cycle {}: zones {:?} changed, {}/{} send(s) delivered",
                    cycle.cycle,
                    cycle.outcome.changed,
                    cycle.outcome.delivered,
                    cycle.outcome.attempted
                );
            }

            if !renderer.present(&cycle)? {
                log::info!("renderer requested quit");
                break;
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ScriptedSource;
    use crate::render::NullRenderer;

    fn det(x1: f64, y1: f64, x2: f64, y2: f64, class_id: usize) -> Detection {
        Detection {
            x1,
            y1,
            x2,
            y2,
            confidence: 0.9,
            class_id,
        }
    }

    fn pipeline(interval_secs: f64, sample_every: u32) -> Pipeline {
        let zones = ZoneStore::parse("0: [(0, 0), (10, 0), (10, 10), (0, 10)]\n").expect("zones");
        let classes = ClassList::new(vec!["car".into(), "bus".into()]);
        let dispatcher = Dispatcher::new(zones.len(), None);
        Pipeline::new(zones, classes, dispatcher, interval_secs, sample_every)
    }

    #[test]
    fn process_frame_latches_and_reports() {
        let mut p = pipeline(2.0, 1);
        let cycle = p.process_frame(&[det(2.0, 2.0, 8.0, 8.0, 0)], 100.0);
        assert_eq!(cycle.snapshot[0], vec!["car".to_string()]);
        assert_eq!(cycle.reports[0].vehicle.as_deref(), Some("car"));
        assert_eq!(cycle.outcome.changed, vec![0]);

        // Unchanged next frame: latched, quiescent.
        let next = p.process_frame(&[det(2.0, 2.0, 8.0, 8.0, 0)], 100.5);
        assert_eq!(next.reports[0].vehicle.as_deref(), Some("car"));
        assert!(next.outcome.quiescent());
    }

    #[test]
    fn run_applies_frame_decimation() {
        let mut p = pipeline(2.0, 3);
        let frames = vec![vec![det(2.0, 2.0, 8.0, 8.0, 0)]; 7];
        let mut source = ScriptedSource::new(frames);
        let stop = AtomicBool::new(false);

        let summary = p
            .run(&mut source, &mut NullRenderer, &stop)
            .expect("run");
        assert_eq!(summary.frames_seen, 7);
        assert_eq!(summary.cycles, 2); // frames 3 and 6
    }

    #[test]
    fn run_stops_on_stop_flag_before_reading() {
        let mut p = pipeline(2.0, 1);
        let mut source = ScriptedSource::new(vec![vec![]; 100]);
        let stop = AtomicBool::new(true);

        let summary = p
            .run(&mut source, &mut NullRenderer, &stop)
            .expect("run");
        assert_eq!(summary.frames_seen, 0);
    }

    #[test]
    fn run_honors_renderer_quit() {
        struct QuitAfter(u32);
        impl Renderer for QuitAfter {
            fn present(&mut self, _cycle: &CycleReport) -> Result<bool> {
                self.0 -= 1;
                Ok(self.0 > 0)
            }
        }

        let mut p = pipeline(2.0, 1);
        let mut source = ScriptedSource::new(vec![vec![]; 100]);
        let stop = AtomicBool::new(false);

        let summary = p
            .run(&mut source, &mut QuitAfter(2), &stop)
            .expect("run");
        assert_eq!(summary.cycles, 2);
    }
}
