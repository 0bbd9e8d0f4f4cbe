//! In-memory R-tree built from the record envelopes
//!
//! Used when a layer ships without a quad-tree file. Building costs one walk over the
//! record headers and bounding boxes; the result is shared between passes.

use super::{IndexKind, SpatialIndex};
use crate::header::{FILE_HEADER_LEN, RECORD_HEADER_LEN};
use crate::{BinaryCursor, Envelope, FileHeader, RecordHandle, RecordHeader, Result, ShapeType};
use rstar::{AABB, RTree, RTreeObject};
use std::io::{Read, Seek};
use std::sync::Arc;

/// A record and its envelope in source coordinates
#[derive(Clone, Copy, Debug)]
struct IndexedRecord {
    handle: RecordHandle,
    min: [f64; 2],
    max: [f64; 2],
}

impl RTreeObject for IndexedRecord {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// Shared, immutable R-tree over one geometry file
#[derive(Clone)]
pub struct RTreeIndex {
    tree: Arc<RTree<IndexedRecord>>,
}

impl std::fmt::Debug for RTreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RTreeIndex")
            .field("records", &self.tree.size())
            .finish()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl RTreeIndex {
    /// Walk every record of the geometry file behind `cursor` and bulk-load their envelopes
    ///
    /// Null records are not indexed.
    pub fn build<R: Read + Seek>(
        cursor: &mut BinaryCursor<R>,
        header: &FileHeader,
    ) -> Result<Self> {
        #[cfg(feature = "profiling")]
        profiling::scope!("rtree::build");

        let end = header.effective_length(cursor.len());
        let mut records = Vec::new();
        let mut offset = FILE_HEADER_LEN;
        let mut index = 0;

        cursor.clear_limit();
        while offset + RECORD_HEADER_LEN <= end {
            cursor.seek(offset)?;
            let record = RecordHeader::read(cursor)?;
            let handle = RecordHandle {
                index,
                offset,
                content_length: record.content_length,
            };
            cursor.set_limit(handle.end())?;
            if let Some(envelope) = read_envelope(cursor)? {
                records.push(IndexedRecord {
                    handle,
                    min: [envelope.min_x, envelope.min_y],
                    max: [envelope.max_x, envelope.max_y],
                });
            }
            cursor.clear_limit();
            offset = handle.end();
            index += 1;
        }

        tracing::debug!("Built R-tree over {} of {index} records", records.len());
        Ok(Self {
            tree: Arc::new(RTree::bulk_load(records)),
        })
    }

    /// Number of indexed records
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records whose envelope intersects `viewport`, in no particular order
    pub fn locate(&self, viewport: &Envelope) -> Vec<RecordHandle> {
        if viewport.is_empty() {
            return Vec::new();
        }
        let query = AABB::from_corners(
            [viewport.min_x, viewport.min_y],
            [viewport.max_x, viewport.max_y],
        );
        self.tree
            .locate_in_envelope_intersecting(&query)
            .map(|record| record.handle)
            .collect()
    }
}

impl SpatialIndex for RTreeIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::RTree
    }

    fn query(&mut self, viewport: &Envelope) -> Result<Vec<RecordHandle>> {
        Ok(self.locate(viewport))
    }
}

/// Envelope of the record whose shape type is next in `cursor`; `None` for null shapes
fn read_envelope<R: Read + Seek>(cursor: &mut BinaryCursor<R>) -> Result<Option<Envelope>> {
    if cursor.remaining() < 4 {
        return Ok(None);
    }
    let envelope = match ShapeType::from_code(cursor.read_i32()?)? {
        ShapeType::Null => None,
        ShapeType::Point(_) => {
            let (x, y) = cursor.read_xy()?;
            Some(Envelope::new(x, y, x, y))
        }
        _ => Some(cursor.read_envelope()?),
    };
    Ok(envelope.filter(Envelope::is_finite))
}
