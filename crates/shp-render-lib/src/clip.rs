//! Viewport inclusion tests and sub-pixel decimation
//!
//! Clipping is only ever used to decide whether a part is kept; the clipped coordinates
//! stay local to the test and the emitted vertices are always the original ones.
//!
//! Open parts (polyline chains) are kept when one of their segments reaches the viewport.
//! Polygon rings are also kept when none does but the ring contains the viewport centre:
//! a ring enclosing the whole viewport has no segment inside it and still covers it.

use crate::Envelope;

pub const CLIP_LEFT: u8 = 1;
pub const CLIP_RIGHT: u8 = 2;
pub const CLIP_BOTTOM: u8 = 4;
pub const CLIP_TOP: u8 = 8;

/// Maximum clip steps; each endpoint needs at most two
const MAX_CLIP_STEPS: usize = 4;

/// Cohen-Sutherland outcode of `(x, y)` against `rect`
#[inline]
pub fn outcode(x: f64, y: f64, rect: &Envelope) -> u8 {
    let mut code = 0u8;
    if x < rect.min_x {
        code |= CLIP_LEFT;
    } else if x > rect.max_x {
        code |= CLIP_RIGHT;
    }
    if y < rect.min_y {
        code |= CLIP_BOTTOM;
    } else if y > rect.max_y {
        code |= CLIP_TOP;
    }
    code
}

/// Check if the segment `(x0, y0)-(x1, y1)` touches `rect`
pub fn segment_intersects(x0: f64, y0: f64, x1: f64, y1: f64, rect: &Envelope) -> bool {
    let (mut x0, mut y0) = (x0, y0);
    let mut code0 = outcode(x0, y0, rect);
    let code1 = outcode(x1, y1, rect);

    for _ in 0..MAX_CLIP_STEPS {
        if code0 == 0 || code1 == 0 {
            return true;
        }
        if code0 & code1 != 0 {
            return false;
        }

        // Both endpoints are outside on different sides: move the first one onto the
        // edge it crosses and try again.
        if code0 & CLIP_TOP != 0 {
            x0 += (x1 - x0) * (rect.max_y - y0) / (y1 - y0);
            y0 = rect.max_y;
        } else if code0 & CLIP_BOTTOM != 0 {
            x0 += (x1 - x0) * (rect.min_y - y0) / (y1 - y0);
            y0 = rect.min_y;
        } else if code0 & CLIP_RIGHT != 0 {
            y0 += (y1 - y0) * (rect.max_x - x0) / (x1 - x0);
            x0 = rect.max_x;
        } else {
            y0 += (y1 - y0) * (rect.min_x - x0) / (x1 - x0);
            x0 = rect.min_x;
        }
        code0 = outcode(x0, y0, rect);
    }

    code0 == 0
}

/// Check if any segment of an interleaved part touches `rect`
///
/// A single-vertex part is tested as a point.
pub fn part_intersects(coords: &[f64], rect: &Envelope) -> bool {
    match coords.len() {
        0 | 1 => false,
        2 | 3 => rect.contains_point(coords[0], coords[1]),
        len => (0..len - 3).step_by(2).any(|i| {
            segment_intersects(coords[i], coords[i + 1], coords[i + 2], coords[i + 3], rect)
        }),
    }
}

/// Even-odd point-in-ring test on an interleaved ring
pub fn ring_contains(coords: &[f64], x: f64, y: f64) -> bool {
    let n = coords.len() / 2;
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (coords[2 * i], coords[2 * i + 1]);
        let (xj, yj) = (coords[2 * j], coords[2 * j + 1]);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Whether a polygon ring should be drawn for `rect`
///
/// A ring whose edges all miss the viewport may still cover it entirely.
pub fn ring_visible(coords: &[f64], rect: &Envelope) -> bool {
    if part_intersects(coords, rect) {
        return true;
    }
    let center = rect.center();
    ring_contains(coords, center.x, center.y)
}

/// Whether a bbox fits in a single device pixel
#[inline]
pub fn is_sub_pixel(bbox: &Envelope, span_x: f64, span_y: f64) -> bool {
    bbox.width() <= span_x && bbox.height() <= span_y
}

/// Running merge of vertices closer than one device pixel to the last kept vertex
#[derive(Clone, Copy, Debug)]
pub struct SubPixelMerge {
    span_x: f64,
    span_y: f64,
    last: Option<(f64, f64)>,
}

impl SubPixelMerge {
    pub fn new(span_x: f64, span_y: f64) -> Self {
        Self {
            span_x,
            span_y,
            last: None,
        }
    }

    /// Decide whether to keep `(x, y)`; `force` keeps it unconditionally
    ///
    /// The first vertex is always kept.
    #[inline]
    pub fn keep(&mut self, x: f64, y: f64, force: bool) -> bool {
        let keep = match self.last {
            None => true,
            Some((lx, ly)) => {
                force || (x - lx).abs() > self.span_x || (y - ly).abs() > self.span_y
            }
        };
        if keep {
            self.last = Some((x, y));
        }
        keep
    }
}
