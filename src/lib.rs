//! zonewatch
//!
//! This crate turns noisy per-frame object detections inside configured
//! polygonal zones into a small number of stable, debounced notifications,
//! delivered over one of several downstream transports.
//!
//! # Architecture
//!
//! A processing cycle is a strict single-threaded sequence:
//!
//! 1. A detection source yields the frame's detections (the model itself is
//!    an external collaborator behind the [`detect::DetectionSource`] seam).
//! 2. The zone assigner groups detections by the first zone containing each
//!    bounding-box center.
//! 3. One debounce state machine per zone latches the first observed label
//!    for a fixed wall-clock window, suppressing detection flicker.
//! 4. The dispatcher fans out only the values that changed since the last
//!    send, through the one transport channel active for the deployment.
//!
//! # Module Structure
//!
//! - `config`: JSON config file, env overrides, transport selection
//! - `geometry`: zone store, polygon membership, zone-file parsing
//! - `detect`: detection types, class list, frame sources
//! - `assign`: per-frame occupancy snapshot
//! - `debounce`: per-zone latch state machine
//! - `dispatch`: change-gated fan-out and last-sent bookkeeping
//! - `transport`: broker, wireless hub, direct socket, cloud database
//! - `pipeline`: the orchestration loop
//! - `render`: optional presentation seam

pub mod assign;
pub mod config;
pub mod debounce;
pub mod detect;
pub mod dispatch;
pub mod geometry;
pub mod pipeline;
pub mod render;
pub mod transport;

pub use assign::OccupancySnapshot;
pub use config::{TransportSelector, ZonewatchConfig};
pub use debounce::{DebounceReport, ZoneDebounceState};
pub use detect::{ClassList, Detection, DetectionSource, ReplaySource, ScriptedSource};
pub use dispatch::{DispatchOutcome, Dispatcher, NO_VEHICLE};
pub use geometry::{Point, Zone, ZoneStore};
pub use pipeline::{CycleReport, Pipeline, RunSummary};
pub use render::{LogRenderer, NullRenderer, Renderer};
pub use transport::{Commit, Delivery, NotifyChannel};

/// Current wall-clock time as fractional epoch seconds.
///
/// The debounce window is measured against this clock, not frame counts, so
/// it is robust to the loop's sampling decimation and variable frame rates.
pub fn wall_clock_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
