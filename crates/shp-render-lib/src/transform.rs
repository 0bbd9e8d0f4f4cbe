//! Source-to-screen coordinate transforms and the per-point failure policy

use crate::{Envelope, utils};
use geo::{AffineTransform, Coord};
use std::sync::Arc;

/// A transform could not map a coordinate (e.g. outside the projection's domain)
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("Coordinate ({x}, {y}) is outside the transform domain")]
pub struct TransformError {
    pub x: f64,
    pub y: f64,
}

/// Forward (source to device pixels) and inverse transform, failing per coordinate
pub trait CoordinateTransform: Send + Sync {
    fn forward(&self, coord: Coord<f64>) -> Result<Coord<f64>, TransformError>;

    fn inverse(&self, coord: Coord<f64>) -> Result<Coord<f64>, TransformError>;
}

/// Maps a world rectangle onto a `width x height` pixel screen, y axis pointing down
#[derive(Debug, Clone, Copy)]
pub struct AffineScreenTransform {
    forward: AffineTransform<f64>,
    inverse: Option<AffineTransform<f64>>,
}

impl AffineScreenTransform {
    pub fn new(world: Envelope, screen_size: (u32, u32)) -> Self {
        let sx = screen_size.0 as f64 / world.width();
        let sy = screen_size.1 as f64 / world.height();
        let forward = AffineTransform::new(sx, 0.0, -world.min_x * sx, 0.0, -sy, world.max_y * sy);
        let inverse = if sx.is_finite() && sy.is_finite() && sx > 0.0 && sy > 0.0 {
            forward.inverse()
        } else {
            None
        };
        Self { forward, inverse }
    }
}

impl CoordinateTransform for AffineScreenTransform {
    #[inline]
    fn forward(&self, coord: Coord<f64>) -> Result<Coord<f64>, TransformError> {
        Ok(self.forward.apply(coord))
    }

    fn inverse(&self, coord: Coord<f64>) -> Result<Coord<f64>, TransformError> {
        self.inverse
            .map(|inverse| inverse.apply(coord))
            .ok_or(TransformError {
                x: coord.x,
                y: coord.y,
            })
    }
}

/// WGS84 longitude/latitude source data, drawn through Web Mercator
///
/// Latitudes beyond the Mercator limit fail instead of being clamped.
#[derive(Debug, Clone, Copy)]
pub struct MercatorScreenTransform {
    screen: AffineScreenTransform,
}

impl MercatorScreenTransform {
    /// `viewport` is given in degrees (x = longitude, y = latitude)
    pub fn new(viewport: Envelope, screen_size: (u32, u32)) -> Self {
        let min = utils::project_clamped(viewport.min_x, viewport.min_y);
        let max = utils::project_clamped(viewport.max_x, viewport.max_y);
        let world = Envelope::new(min.x, min.y, max.x, max.y);
        Self {
            screen: AffineScreenTransform::new(world, screen_size),
        }
    }
}

impl CoordinateTransform for MercatorScreenTransform {
    fn forward(&self, coord: Coord<f64>) -> Result<Coord<f64>, TransformError> {
        let mercator = utils::project(coord.x, coord.y).ok_or(TransformError {
            x: coord.x,
            y: coord.y,
        })?;
        self.screen.forward(mercator)
    }

    fn inverse(&self, coord: Coord<f64>) -> Result<Coord<f64>, TransformError> {
        let mercator = self.screen.inverse(coord)?;
        Ok(utils::unproject(mercator.x, mercator.y))
    }
}

/// Adapter applying the failure policy around an injected transform
///
/// A failing point takes the value of the last successful point of the same part; failures
/// before the first success are backfilled with it. A part in which every point fails is
/// dropped. The first failure is logged once per adapter instance.
pub struct CoordinateTransformer {
    inner: Arc<dyn CoordinateTransform>,
    failures: usize,
}

impl CoordinateTransformer {
    pub fn new(inner: Arc<dyn CoordinateTransform>) -> Self {
        Self { inner, failures: 0 }
    }

    /// Number of point failures seen so far
    #[inline]
    pub fn failures(&self) -> usize {
        self.failures
    }

    fn forward(&mut self, x: f64, y: f64) -> Option<Coord<f64>> {
        let result = self
            .inner
            .forward(Coord { x, y })
            .and_then(|c| {
                if c.x.is_finite() && c.y.is_finite() {
                    Ok(c)
                } else {
                    Err(TransformError { x, y })
                }
            });
        match result {
            Ok(c) => Some(c),
            Err(err) => {
                if self.failures == 0 {
                    tracing::warn!("Coordinate transform failed, substituting neighbours: {err}");
                }
                self.failures += 1;
                None
            }
        }
    }

    /// Transform a single point; `None` if it cannot be mapped
    pub fn transform_point(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        self.forward(x, y).map(|c| (c.x, c.y))
    }

    /// Transform an interleaved part in place
    ///
    /// Returns `false` if no point of the part could be transformed.
    pub fn transform_part(&mut self, coords: &mut [f64]) -> bool {
        let mut last: Option<Coord<f64>> = None;
        for i in (0..coords.len().saturating_sub(1)).step_by(2) {
            match self.forward(coords[i], coords[i + 1]) {
                Some(c) => {
                    if last.is_none() {
                        // Backfill every earlier failure with the first success
                        for j in (0..i).step_by(2) {
                            coords[j] = c.x;
                            coords[j + 1] = c.y;
                        }
                    }
                    coords[i] = c.x;
                    coords[i + 1] = c.y;
                    last = Some(c);
                }
                None => {
                    if let Some(prev) = last {
                        coords[i] = prev.x;
                        coords[i + 1] = prev.y;
                    }
                }
            }
        }
        last.is_some()
    }

    pub fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64), TransformError> {
        self.inner.inverse(Coord { x, y }).map(|c| (c.x, c.y))
    }
}
