//! Screen-ready output geometry

use crate::Envelope;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kind of decoded geometry, independent of the Z/M variant on disk
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeKind {
    Point,
    MultiPoint,
    Polyline,
    Polygon,
}

/// A decoded, culled and transformed record
///
/// Each part is an interleaved `x, y, x, y, ...` sequence in screen coordinates, so it
/// always has an even length; a part of length 2 is a degenerate point.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimpleGeometry {
    pub kind: ShapeKind,
    pub parts: Vec<Vec<f64>>,
    /// Record bounding box in source coordinates
    pub bbox: Envelope,
}

impl SimpleGeometry {
    pub fn new(kind: ShapeKind, parts: Vec<Vec<f64>>, bbox: Envelope) -> Self {
        debug_assert!(parts.iter().all(|p| p.len() % 2 == 0));
        Self { kind, parts, bbox }
    }

    /// Total number of vertices across all parts
    pub fn num_points(&self) -> usize {
        self.parts.iter().map(|p| p.len() / 2).sum()
    }

    /// Whether every part has collapsed to a single vertex
    pub fn is_degenerate(&self) -> bool {
        self.parts.iter().all(|p| p.len() == 2)
    }

    /// Iterate the vertices of one part as `(x, y)` pairs
    pub fn part_coords(&self, part: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.parts
            .get(part)
            .map(|p| p.as_slice())
            .unwrap_or(&[])
            .chunks_exact(2)
            .map(|c| (c[0], c[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let geom = SimpleGeometry::new(
            ShapeKind::Polyline,
            vec![vec![0.0, 0.0, 1.0, 1.0, 2.0, 0.0], vec![5.0, 5.0]],
            Envelope::new(0.0, 0.0, 5.0, 5.0),
        );
        assert_eq!(geom.num_points(), 4);
        assert!(!geom.is_degenerate());
        assert_eq!(
            geom.part_coords(0).collect::<Vec<_>>(),
            vec![(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)]
        );
        assert_eq!(geom.part_coords(7).count(), 0);
    }

    #[test]
    fn test_degenerate_point() {
        let geom = SimpleGeometry::new(
            ShapeKind::Point,
            vec![vec![3.0, 4.0]],
            Envelope::new(3.0, 4.0, 3.0, 4.0),
        );
        assert!(geom.is_degenerate());
    }
}
