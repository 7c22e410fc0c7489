//! Renderer seam.
//!
//! Frame drawing (polygon overlays, bounding boxes, the interactive zone
//! authoring tool) lives outside this crate. What remains here is the seam
//! the loop hands each processed cycle to, plus a log-backed implementation
//! of the classic per-zone status line. Returning `false` from `present` is
//! the external quit signal.

use anyhow::Result;

use crate::pipeline::CycleReport;

pub trait Renderer {
    fn present(&mut self, cycle: &CycleReport) -> Result<bool>;
}

/// Headless deployments: no output, never quits.
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn present(&mut self, _cycle: &CycleReport) -> Result<bool> {
        Ok(true)
    }
}

/// Writes the per-zone status line through `log` instead of an on-frame
/// overlay: `zone: 0 | nv: 2 | pv: car [1.27]`.
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn present(&mut self, cycle: &CycleReport) -> Result<bool> {
        for report in &cycle.reports {
            log::info!(
                "zone: {} | nv: {} | pv: {} [{}]",
                report.zone,
                cycle.snapshot[report.zone].len(),
                report.vehicle.as_deref().unwrap_or("none"),
                report.elapsed_display()
            );
        }
        log::debug!("cycle {} processed in {:.1} ms", cycle.cycle, cycle.processing_ms);
        Ok(true)
    }
}
