//! Detection boundary types and frame sources.
//!
//! The object-detection model itself lives outside this crate. What crosses
//! the boundary is a per-frame batch of [`Detection`] values: a bounding box,
//! a confidence score, and a class index resolvable through the loaded
//! [`ClassList`]. Sources implement [`DetectionSource`]:
//! - `ReplaySource`: JSON-lines file, one array of detections per frame
//! - `ScriptedSource`: in-memory frames for tests and demos
//!
//! Sources must not block the pipeline indefinitely; end of stream is
//! signalled by returning `Ok(None)`.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;

use crate::geometry::Point;

/// One detected object in a frame. Ephemeral: produced per frame, consumed
/// within the same processing step, never persisted.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Detection {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    /// Reference point used for zone membership: the bounding-box center.
    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// Ordered class-name list, one name per line of an external file.
#[derive(Clone, Debug)]
pub struct ClassList {
    names: Vec<String>,
}

impl ClassList {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read class list {}", path.display()))?;
        let names: Vec<String> = raw
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if names.is_empty() {
            return Err(anyhow!("class list {} is empty", path.display()));
        }
        Ok(Self { names })
    }

    /// Resolve a class index to its label. `None` marks a data inconsistency;
    /// callers skip the detection and continue.
    pub fn resolve(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Per-frame detection source (the external-collaborator seam).
pub trait DetectionSource {
    /// Yield the next frame's detections, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Vec<Detection>>>;
}

/// Replays recorded detections from a JSON-lines file, one array per frame.
///
/// Stands in for the live model the way a stub source stands in for a
/// camera: same contract, deterministic content.
pub struct ReplaySource {
    lines: std::io::Lines<std::io::BufReader<std::fs::File>>,
    frames_read: u64,
}

impl ReplaySource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open replay file {}", path.display()))?;
        Ok(Self {
            lines: std::io::BufReader::new(file).lines(),
            frames_read: 0,
        })
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl DetectionSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<Vec<Detection>>> {
        for line in self.lines.by_ref() {
            let line = line.context("failed to read replay line")?;
            if line.trim().is_empty() {
                continue;
            }
            let detections: Vec<Detection> = serde_json::from_str(&line)
                .with_context(|| format!("invalid replay frame {}", self.frames_read + 1))?;
            self.frames_read += 1;
            return Ok(Some(detections));
        }
        Ok(None)
    }
}

/// In-memory frame script for tests and demos.
pub struct ScriptedSource {
    frames: std::vec::IntoIter<Vec<Detection>>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl DetectionSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Vec<Detection>>> {
        Ok(self.frames.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

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

    #[test]
    fn center_is_bbox_midpoint() {
        let d = det(0.0, 0.0, 10.0, 4.0, 0);
        assert_eq!(d.center(), Point::new(5.0, 2.0));
    }

    #[test]
    fn class_list_resolves_in_order() {
        let classes = ClassList::new(vec!["car".into(), "bus".into()]);
        assert_eq!(classes.resolve(0), Some("car"));
        assert_eq!(classes.resolve(1), Some("bus"));
        assert_eq!(classes.resolve(7), None);
    }

    #[test]
    fn class_list_load_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().expect("temp classes");
        writeln!(file, "car\n\nbus\n  truck  ").expect("write");
        let classes = ClassList::load(file.path()).expect("load");
        assert_eq!(classes.len(), 3);
        assert_eq!(classes.resolve(2), Some("truck"));
    }

    #[test]
    fn replay_source_reads_one_frame_per_line() {
        let mut file = tempfile::NamedTempFile::new().expect("temp replay");
        writeln!(
            file,
            r#"[{{"x1":0,"y1":0,"x2":10,"y2":10,"confidence":0.8,"class_id":0}}]"#
        )
        .expect("write");
        writeln!(file, "[]").expect("write");

        let mut source = ReplaySource::open(file.path()).expect("open");
        let first = source.next_frame().expect("frame").expect("some");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].class_id, 0);
        let second = source.next_frame().expect("frame").expect("some");
        assert!(second.is_empty());
        assert!(source.next_frame().expect("frame").is_none());
        assert_eq!(source.frames_read(), 2);
    }

    #[test]
    fn replay_source_rejects_malformed_frame() {
        let mut file = tempfile::NamedTempFile::new().expect("temp replay");
        writeln!(file, "{{not json}}").expect("write");
        let mut source = ReplaySource::open(file.path()).expect("open");
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn scripted_source_ends() {
        let mut source = ScriptedSource::new(vec![vec![det(0.0, 0.0, 2.0, 2.0, 0)], vec![]]);
        assert_eq!(source.next_frame().unwrap().unwrap().len(), 1);
        assert_eq!(source.next_frame().unwrap().unwrap().len(), 0);
        assert!(source.next_frame().unwrap().is_none());
    }
}
