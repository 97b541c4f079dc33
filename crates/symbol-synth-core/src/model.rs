use crate::error::{Result, SynthError};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Exclusive right edge (`x + w`).
    pub fn x2(&self) -> u32 {
        self.x + self.w
    }
    /// Exclusive bottom edge (`y + h`).
    pub fn y2(&self) -> u32 {
        self.y + self.h
    }
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
    /// True when the interiors of `self` and `other` intersect.
    /// Rectangles that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x2() && self.x2() > other.x && self.y < other.y2() && self.y2() > other.y
    }
    /// True if the rectangle lies inside a `width x height` canvas.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x2() <= width && self.y2() <= height
    }
}

/// One normalized bounding box: `class x_center y_center width height`.
///
/// All four numeric fields are fractions of the canvas size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    pub class_id: usize,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl Annotation {
    /// Derives the normalized box of `rect` on a `canvas_w x canvas_h` canvas.
    pub fn from_rect(class_id: usize, rect: &Rect, canvas_w: u32, canvas_h: u32) -> Self {
        let cw = canvas_w as f64;
        let ch = canvas_h as f64;
        Self {
            class_id,
            x_center: (rect.x as f64 + rect.w as f64 / 2.0) / cw,
            y_center: (rect.y as f64 + rect.h as f64 / 2.0) / ch,
            width: rect.w as f64 / cw,
            height: rect.h as f64 / ch,
        }
    }

    /// Pixel-space center form `(cx, cy, w, h)` on a canvas of the given size.
    pub fn to_pixel_center(&self, canvas_w: u32, canvas_h: u32) -> (f64, f64, f64, f64) {
        let cw = canvas_w as f64;
        let ch = canvas_h as f64;
        (
            self.x_center * cw,
            self.y_center * ch,
            self.width * cw,
            self.height * ch,
        )
    }

    /// Pixel-space top-left form `(x, y, w, h)` on a canvas of the given size.
    pub fn to_pixel_top_left(&self, canvas_w: u32, canvas_h: u32) -> (f64, f64, f64, f64) {
        let (cx, cy, w, h) = self.to_pixel_center(canvas_w, canvas_h);
        (cx - w / 2.0, cy - h / 2.0, w, h)
    }

    /// Formats the annotation as a label line (without trailing newline).
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.class_id, self.x_center, self.y_center, self.width, self.height
        )
    }

    /// Parses a `class xc yc w h` label line.
    pub fn parse_line(line: &str) -> Result<Self> {
        let bad = |reason: &str| SynthError::Annotation {
            line: line.to_string(),
            reason: reason.to_string(),
        };
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(bad("expected 5 fields"));
        }
        let class_id = fields[0]
            .parse::<usize>()
            .map_err(|_| bad("class is not a non-negative integer"))?;
        let mut nums = [0f64; 4];
        for (slot, raw) in nums.iter_mut().zip(&fields[1..]) {
            *slot = raw.parse::<f64>().map_err(|_| bad("coordinate is not a number"))?;
        }
        Ok(Self {
            class_id,
            x_center: nums[0],
            y_center: nums[1],
            width: nums[2],
            height: nums[3],
        })
    }
}

/// Renders annotations as a label file body, one newline-terminated line per box.
pub fn annotations_to_text(annotations: &[Annotation]) -> String {
    let mut out = String::new();
    for a in annotations {
        out.push_str(&a.to_line());
        out.push('\n');
    }
    out
}

/// Parses a label file body, ignoring blank lines.
pub fn parse_annotations(text: &str) -> Result<Vec<Annotation>> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(Annotation::parse_line)
        .collect()
}

/// A symbol accepted by the placement engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placement {
    /// Index of the symbol in the caller's input order.
    pub input_index: usize,
    pub class_id: usize,
    pub rect: Rect,
}

/// Why a symbol was left out of a placement round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Wider or taller than the background.
    Oversized,
    /// No free position was found within the attempt budget.
    Exhausted,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedSymbol {
    pub input_index: usize,
    pub class_id: usize,
    pub reason: SkipReason,
}

/// Counters for a generation run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationStats {
    /// Number of image/label pairs written.
    pub examples: usize,
    /// Symbols drawn from the pool.
    pub requested: usize,
    /// Symbols that ended up on a canvas.
    pub placed: usize,
    pub skipped_oversized: usize,
    pub skipped_exhausted: usize,
}

impl GenerationStats {
    pub fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::Oversized => self.skipped_oversized += 1,
            SkipReason::Exhausted => self.skipped_exhausted += 1,
        }
    }

    /// Fraction of requested symbols that were placed (0.0 to 1.0).
    pub fn placement_rate(&self) -> f64 {
        if self.requested > 0 {
            self.placed as f64 / self.requested as f64
        } else {
            0.0
        }
    }

    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Examples: {}, Symbols: {}/{} placed ({:.2}%), Oversized: {}, Exhausted: {}",
            self.examples,
            self.placed,
            self.requested,
            self.placement_rate() * 100.0,
            self.skipped_oversized,
            self.skipped_exhausted,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_edges_do_not_overlap() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(!a.overlaps(&Rect::new(10, 0, 10, 10)));
        assert!(!a.overlaps(&Rect::new(0, 10, 10, 10)));
        assert!(a.overlaps(&Rect::new(9, 9, 10, 10)));
    }

    #[test]
    fn thin_rect_crossing_without_corners_overlaps() {
        // A horizontal bar through a vertical bar: no corner of either lies inside the other.
        let vertical = Rect::new(40, 0, 20, 100);
        let horizontal = Rect::new(0, 40, 100, 20);
        assert!(vertical.overlaps(&horizontal));
        assert!(horizontal.overlaps(&vertical));
    }

    #[test]
    fn parse_line_rejects_garbage() {
        assert!(Annotation::parse_line("0 0.5 0.5 0.1").is_err());
        assert!(Annotation::parse_line("x 0.5 0.5 0.1 0.1").is_err());
        assert!(Annotation::parse_line("1 0.5 nope 0.1 0.1").is_err());
        let a = Annotation::parse_line("3 0.5 0.25 0.1 0.2").expect("parse");
        assert_eq!(a.class_id, 3);
        assert_eq!(a.y_center, 0.25);
    }
}
