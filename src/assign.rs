//! Zone assigner.
//!
//! Groups the current frame's detections by zone: a detection belongs to the
//! first zone (in configured enumeration order) whose polygon strictly
//! contains its bounding-box center, and to at most one zone. The result is
//! the per-frame occupancy snapshot consumed by the debouncer.

use crate::detect::{ClassList, Detection};
use crate::geometry::ZoneStore;

/// Per-frame occupancy snapshot: for every zone, the class labels of the
/// detections that fell inside it this frame, in detection order.
pub type OccupancySnapshot = Vec<Vec<String>>;

/// Assign detections to zones. Pure over its inputs; a detection whose class
/// index has no label is a data inconsistency and is skipped with a warning.
pub fn assign(
    zones: &ZoneStore,
    classes: &ClassList,
    detections: &[Detection],
) -> OccupancySnapshot {
    let mut snapshot: OccupancySnapshot = vec![Vec::new(); zones.len()];

    for detection in detections {
        let Some(label) = classes.resolve(detection.class_id) else {
            log::warn!(
                "skipping detection with unmapped class index {} (bbox {:.0},{:.0})",
                detection.class_id,
                detection.x1,
                detection.y1
            );
            continue;
        };
        let center = detection.center();
        for (slot, zone) in zones.iter().enumerate() {
            if zone.contains(center) {
                snapshot[slot].push(label.to_string());
                break;
            }
        }
    }

    snapshot
}
