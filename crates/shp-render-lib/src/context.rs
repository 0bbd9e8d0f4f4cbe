//! Per-pass decode state shared by every shape decoder

use crate::{CoordinateTransformer, Envelope, ScreenMap};
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counters updated by the decoders during one pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecodeStats {
    /// Records skipped because their bbox misses the viewport
    pub rejected_bbox: usize,
    /// Records collapsed to a single pixel
    pub collapsed: usize,
    /// Parts decoded but dropped (off-screen, or untransformable)
    pub parts_culled: usize,
    /// Vertices dropped by the sub-pixel merge
    pub vertices_merged: usize,
    /// Points dropped because their pixel was already drawn
    pub screen_duplicates: usize,
}

/// Everything a decoder needs besides the cursor
///
/// The pixel spans are computed once per pass and never per record.
pub struct DecodeContext {
    /// Visible area in source coordinates
    pub viewport: Envelope,
    pub transform: CoordinateTransformer,
    /// Source-space width of one device pixel
    pub span_x: f64,
    /// Source-space height of one device pixel
    pub span_y: f64,
    pub screen_map: Option<ScreenMap>,
    pub stats: DecodeStats,
}

impl DecodeContext {
    /// Build a context, deriving the pixel spans from the transform
    ///
    /// `bias` divides the spans: higher values keep more detail.
    pub fn new(
        viewport: Envelope,
        transform: CoordinateTransformer,
        screen_size: (u32, u32),
        bias: f64,
    ) -> Self {
        let (span_x, span_y) = pixel_span(&transform, screen_size, bias);
        Self::with_spans(viewport, transform, span_x, span_y)
    }

    /// Build a context with explicit pixel spans
    pub fn with_spans(
        viewport: Envelope,
        transform: CoordinateTransformer,
        span_x: f64,
        span_y: f64,
    ) -> Self {
        Self {
            viewport,
            transform,
            span_x,
            span_y,
            screen_map: None,
            stats: DecodeStats::default(),
        }
    }

    pub fn with_screen_map(mut self, screen_map: ScreenMap) -> Self {
        self.screen_map = Some(screen_map);
        self
    }
}

/// Source-space size of the device pixel at the screen centre
///
/// Falls back to zero (no decimation) when the transform cannot be inverted.
fn pixel_span(transform: &CoordinateTransformer, screen_size: (u32, u32), bias: f64) -> (f64, f64) {
    let bias = if bias.is_finite() && bias > 0.0 {
        bias
    } else {
        1.0
    };
    let cx = (screen_size.0 / 2) as f64;
    let cy = (screen_size.1 / 2) as f64;
    match (transform.inverse(cx, cy), transform.inverse(cx + 1.0, cy + 1.0)) {
        (Ok((x0, y0)), Ok((x1, y1))) => {
            let span_x = (x1 - x0).abs() / bias;
            let span_y = (y1 - y0).abs() / bias;
            if span_x.is_finite() && span_y.is_finite() {
                (span_x, span_y)
            } else {
                (0.0, 0.0)
            }
        }
        (Err(err), _) | (_, Err(err)) => {
            tracing::warn!("Cannot compute pixel span, decimation disabled: {err}");
            (0.0, 0.0)
        }
    }
}

/// Reusable buffers for the decoders
///
/// Passing one to [`crate::ShapeDecoder::decode_with`] across records avoids per-record
/// allocation of the part table and the vertex buffer.
#[derive(Debug, Default)]
pub struct DecodeScratch {
    pub(crate) offsets: SmallVec<[usize; 8]>,
    pub(crate) coords: Vec<f64>,
}

impl DecodeScratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn clear(&mut self) {
        self.offsets.clear();
        self.coords.clear();
    }
}
