//! Spatial index companions of a geometry file
//!
//! Three variants are tried in a fixed order when a pass starts: the quad-tree file, an
//! in-memory R-tree built from the record envelopes, and no index at all. A variant that
//! fails to open is logged and the next one is tried; the pass never fails because of
//! its index.

mod position;
mod quadtree;
mod rtree;

pub use position::PositionTable;
pub use quadtree::QuadTreeIndex;
pub use rtree::RTreeIndex;

use crate::{BinaryCursor, Envelope, RecordHandle, Result, ShapeError, ShapefileLayer};
use std::fmt;
use std::io::{Read, Seek};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which index variant served a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IndexKind {
    None,
    RTree,
    QuadTree,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexKind::None => "no",
            IndexKind::RTree => "R-tree",
            IndexKind::QuadTree => "quad-tree",
        })
    }
}

/// A spatial index over the records of one geometry file
pub trait SpatialIndex {
    fn kind(&self) -> IndexKind;

    /// Records whose envelope may intersect `viewport`, in any order
    fn query(&mut self, viewport: &Envelope) -> Result<Vec<RecordHandle>>;
}

/// Optional, scoped index resource for one pass
///
/// Closing releases the underlying files; it is a no-op when no index is open and may be
/// called any number of times. Dropping the handle closes it.
pub struct IndexHandle {
    index: Option<Box<dyn SpatialIndex + Send>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl IndexHandle {
    /// A handle without any index
    pub fn none() -> Self {
        Self { index: None }
    }

    pub fn new(index: Box<dyn SpatialIndex + Send>) -> Self {
        Self { index: Some(index) }
    }

    /// Open the best index available for `layer`
    ///
    /// `cursor` reads the layer's geometry file; it is only used to build the R-tree.
    pub fn open<R: Read + Seek>(layer: &ShapefileLayer, cursor: &mut BinaryCursor<R>) -> Self {
        let config = layer.config();
        if !config.use_spatial_index {
            tracing::debug!("Spatial index disabled for {}", layer.path().display());
            return Self::none();
        }

        let qix = layer.qix_path();
        if qix.is_file() {
            match QuadTreeIndex::open(&qix, layer.shx_path()) {
                Ok(index) => return Self::new(Box::new(index)),
                Err(err) => tracing::warn!("Cannot use quad-tree {}: {err}", qix.display()),
            }
        }

        if config.build_rtree {
            match layer.rtree(cursor) {
                Ok(index) => return Self::new(Box::new(index)),
                Err(err) => tracing::warn!(
                    "Cannot build R-tree for {}: {err}",
                    layer.path().display()
                ),
            }
        }

        Self::none()
    }

    pub fn kind(&self) -> IndexKind {
        self.index
            .as_ref()
            .map_or(IndexKind::None, |index| index.kind())
    }

    pub fn is_open(&self) -> bool {
        self.index.is_some()
    }

    pub fn query(&mut self, viewport: &Envelope) -> Result<Vec<RecordHandle>> {
        match self.index.as_mut() {
            Some(index) => index.query(viewport),
            None => Err(ShapeError::IndexUnavailable("no index is open".to_string())),
        }
    }

    pub fn close(&mut self) {
        if let Some(index) = self.index.take() {
            tracing::trace!("Closing {} index", index.kind());
        }
    }
}

impl Drop for IndexHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexHandle")
            .field("kind", &self.kind())
            .finish()
    }
}
