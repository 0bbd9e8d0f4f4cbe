//! Shapefile Render Library - Viewport-Culled Geometry Decoding
//!
//! This library decodes ESRI shapefiles into screen-ready geometry for interactive map
//! rendering. Records are rejected and decimated as early as possible, so that only visible,
//! pixel-significant coordinates are ever materialized: most records of a large file are
//! either off-screen or collapse to a single pixel.
//!
//! # Architecture
//!
//! - **[`BinaryCursor`]**: Bounded, position-tracking reader over the geometry file
//! - **[`IndexHandle`]**: Optional spatial index (Quad-tree file, in-memory R-tree or none)
//! - **[`RecordSelector`]**: Index-driven or sequential record iteration
//! - **[`ShapeDecoder`]**: Per-kind decoders with inline culling and decimation
//! - **[`CoordinateTransformer`]**: Failure-tolerant adapter around a source-to-screen transform
//! - **[`ShapefileLayer`]**: High-level manager running one render pass per viewport
//!
//! # Performance Characteristics
//!
//! - **Rejected record**: one bbox read plus a single relative seek
//! - **Sub-pixel record**: at most two coordinate pairs read
//! - **Indexed pass**: O(K) record visits in ascending file order, K = candidates

mod clip;
mod context;
mod cursor;
mod decoder;
mod envelope;
mod geometry;
mod header;
mod index;
mod layer;
mod screen_map;
mod selector;
mod transform;
pub mod utils;

#[cfg(test)]
mod fixtures;

// Public API exports
pub use clip::{CLIP_BOTTOM, CLIP_LEFT, CLIP_RIGHT, CLIP_TOP, outcode, segment_intersects};
pub use context::{DecodeContext, DecodeScratch, DecodeStats};
pub use cursor::BinaryCursor;
pub use decoder::ShapeDecoder;
pub use envelope::Envelope;
pub use geometry::{ShapeKind, SimpleGeometry};
pub use header::{Dimension, FileHeader, RecordHeader, ShapeType};
pub use index::{IndexHandle, IndexKind, PositionTable, QuadTreeIndex, RTreeIndex, SpatialIndex};
pub use layer::{Config, PassStats, RenderRequest, RenderedLayer, ShapefileLayer, render_layers};
pub use screen_map::ScreenMap;
pub use selector::{RecordHandle, RecordSelector, SelectorMode};
pub use transform::{
    AffineScreenTransform, CoordinateTransform, CoordinateTransformer, MercatorScreenTransform,
    TransformError,
};

use std::path::PathBuf;

/// Error types for decoding a layer
///
/// Every variant aborts the current layer only; callers rendering several layers
/// keep going with the others.
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("Cannot open {path}: {source}")]
    ResourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Truncated read at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("Malformed record at offset {offset}: {reason}")]
    MalformedRecord { offset: u64, reason: String },

    #[error("Invalid file header: {0}")]
    InvalidHeader(String),

    #[error("Unsupported shape type code {0}")]
    UnsupportedShapeType(i32),

    #[error("Spatial index unavailable: {0}")]
    IndexUnavailable(String),
}

pub type Result<T> = std::result::Result<T, ShapeError>;
