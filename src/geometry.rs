//! Zone geometry store.
//!
//! Zones are polygonal regions of the processing frame, loaded once at
//! startup from a plain text file and immutable afterwards. Each line of the
//! file describes one zone:
//!
//! ```text
//! 0: [(373, 167), (243, 350), (520, 350), (434, 167)]
//! 1: [(562, 165), (621, 350), (920, 350), (689, 165)]
//! ```
//!
//! Malformed lines are a fatal startup error. Zone order in the file is the
//! assignment priority order: a detection landing in overlapping zones is
//! credited to the first zone that contains it.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::path::Path;

/// A 2-D point in frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One configured zone: a stable index and a closed polygon boundary.
#[derive(Clone, Debug)]
pub struct Zone {
    pub index: usize,
    pub polygon: Vec<Point>,
}

impl Zone {
    /// Strict interior test (even-odd ray casting).
    ///
    /// Points lying on an edge or vertex are treated as outside, so a
    /// detection sitting exactly on a shared boundary contributes to no zone.
    pub fn contains(&self, p: Point) -> bool {
        if self.on_boundary(p) {
            return false;
        }
        let mut inside = false;
        let n = self.polygon.len();
        let mut j = n - 1;
        for i in 0..n {
            let a = self.polygon[i];
            let b = self.polygon[j];
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    fn on_boundary(&self, p: Point) -> bool {
        let n = self.polygon.len();
        let mut j = n - 1;
        for i in 0..n {
            let a = self.polygon[i];
            let b = self.polygon[j];
            let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
            if cross.abs() < f64::EPSILON * 1e3 {
                let within_x = p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x);
                let within_y = p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y);
                if within_x && within_y {
                    return true;
                }
            }
            j = i;
        }
        false
    }

    fn scaled(&self, sx: f64, sy: f64) -> Zone {
        Zone {
            index: self.index,
            polygon: self
                .polygon
                .iter()
                .map(|p| Point::new(p.x * sx, p.y * sy))
                .collect(),
        }
    }
}

/// Immutable collection of zones in assignment priority order.
#[derive(Clone, Debug)]
pub struct ZoneStore {
    zones: Vec<Zone>,
}

impl ZoneStore {
    pub fn new(zones: Vec<Zone>) -> Result<Self> {
        for zone in &zones {
            if zone.polygon.len() < 3 {
                return Err(anyhow!(
                    "zone {} has {} points, a polygon needs at least 3",
                    zone.index,
                    zone.polygon.len()
                ));
            }
        }
        for (pos, zone) in zones.iter().enumerate() {
            if zones[..pos].iter().any(|z| z.index == zone.index) {
                return Err(anyhow!("duplicate zone index {}", zone.index));
            }
        }
        Ok(Self { zones })
    }

    /// Load zones from the line-based text format. Any malformed line aborts
    /// startup with the offending line number.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read zone file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid zone file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let line_re = Regex::new(r"^\s*(\d+)\s*:\s*\[(.*)\]\s*$").expect("zone line pattern");
        let point_re =
            Regex::new(r"^\(\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*\)$")
                .expect("zone point pattern");

        let mut zones = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let caps = line_re
                .captures(line)
                .ok_or_else(|| anyhow!("line {}: expected `<index>: [(x, y), ...]`", lineno + 1))?;
            let index: usize = caps[1]
                .parse()
                .map_err(|_| anyhow!("line {}: invalid zone index", lineno + 1))?;

            let mut polygon = Vec::new();
            for part in split_points(&caps[2]) {
                let pc = point_re.captures(part.trim()).ok_or_else(|| {
                    anyhow!("line {}: invalid point `{}`", lineno + 1, part.trim())
                })?;
                let x: f64 = pc[1]
                    .parse()
                    .map_err(|_| anyhow!("line {}: invalid coordinate", lineno + 1))?;
                let y: f64 = pc[2]
                    .parse()
                    .map_err(|_| anyhow!("line {}: invalid coordinate", lineno + 1))?;
                polygon.push(Point::new(x, y));
            }
            if polygon.len() < 3 {
                return Err(anyhow!(
                    "line {}: zone {} needs at least 3 points",
                    lineno + 1,
                    index
                ));
            }
            zones.push(Zone { index, polygon });
        }
        if zones.is_empty() {
            return Err(anyhow!("zone file contains no zones"));
        }
        Self::new(zones)
    }

    /// Rescale every polygon from the frame size the zones were authored at
    /// to the size the pipeline actually processes.
    pub fn scaled_to(&self, authored: (u32, u32), target: (u32, u32)) -> ZoneStore {
        if authored == target {
            return self.clone();
        }
        let sx = f64::from(target.0) / f64::from(authored.0);
        let sy = f64::from(target.1) / f64::from(authored.1);
        ZoneStore {
            zones: self.zones.iter().map(|z| z.scaled(sx, sy)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }
}

/// Split the inside of the bracket list on commas that separate points,
/// not the comma inside each `(x, y)` pair.
fn split_points(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, ch) in list.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = list[start..].trim();
    if !tail.is_empty() {
        parts.push(&list[start..]);
    }
    parts
}
