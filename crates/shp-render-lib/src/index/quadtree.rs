//! Quad-tree index file (`.qix`) reader
//!
//! Layout:
//! - 8-byte header: `"SQT"`, byte order (1 = LSB, 2 = MSB, 0 = native), version, 3 reserved
//! - `numShapes:i32`, `maxDepth:i32`
//! - nodes in pre-order: `subtreeBytes:i32, bbox:4×f64, numIds:i32, ids[numIds],
//!   numChildren:i32, children...`
//!
//! `subtreeBytes` covers all child nodes, so a node missing the query is skipped in a
//! single seek. Ids are 0-based record indices, resolved through the position table.

use super::{IndexKind, PositionTable, SpatialIndex};
use crate::{BinaryCursor, Envelope, RecordHandle, Result, ShapeError};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

const MAGIC: &[u8; 3] = b"SQT";
const HEADER_LEN: u64 = 16;
/// Deeper trees are treated as corrupt
const MAX_DEPTH: usize = 64;

/// Quad-tree index over a geometry file
#[derive(Debug)]
pub struct QuadTreeIndex<R = BufReader<File>> {
    cursor: BinaryCursor<R>,
    positions: PositionTable<R>,
    big_endian: bool,
    num_shapes: i32,
}

impl QuadTreeIndex {
    /// Open `qix` together with the position table `shx`
    pub fn open(qix: impl AsRef<Path>, shx: impl AsRef<Path>) -> Result<Self> {
        Self::new(BinaryCursor::open(qix)?, PositionTable::open(shx)?)
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<R: Read + Seek> QuadTreeIndex<R> {
    pub fn new(mut cursor: BinaryCursor<R>, positions: PositionTable<R>) -> Result<Self> {
        let mut magic = [0u8; 3];
        for byte in &mut magic {
            *byte = cursor.read_u8()?;
        }
        if &magic != MAGIC {
            return Err(ShapeError::IndexUnavailable(format!(
                "bad quad-tree signature {magic:?}"
            )));
        }
        let big_endian = match cursor.read_u8()? {
            0 => cfg!(target_endian = "big"),
            1 => false,
            2 => true,
            other => {
                return Err(ShapeError::IndexUnavailable(format!(
                    "unknown quad-tree byte order {other}"
                )));
            }
        };
        let version = cursor.read_u8()?;
        if version != 1 {
            return Err(ShapeError::IndexUnavailable(format!(
                "unsupported quad-tree version {version}"
            )));
        }
        cursor.skip(3)?;

        let mut index = Self {
            cursor,
            positions,
            big_endian,
            num_shapes: 0,
        };
        index.num_shapes = index.read_i32()?;
        let _max_depth = index.read_i32()?;
        if index.num_shapes as usize != index.positions.len() {
            tracing::debug!(
                "Quad-tree lists {} shapes, position table has {}",
                index.num_shapes,
                index.positions.len()
            );
        }
        Ok(index)
    }

    fn read_i32(&mut self) -> Result<i32> {
        if self.big_endian {
            self.cursor.read_i32_be()
        } else {
            self.cursor.read_i32()
        }
    }

    fn read_f64(&mut self) -> Result<f64> {
        if self.big_endian {
            self.cursor.read_f64_be()
        } else {
            self.cursor.read_f64()
        }
    }

    fn read_len(&mut self, what: &str) -> Result<u64> {
        let offset = self.cursor.position();
        let value = self.read_i32()?;
        u64::try_from(value).map_err(|_| ShapeError::MalformedRecord {
            offset,
            reason: format!("negative quad-tree {what} {value}"),
        })
    }

    /// Collect the ids of every node intersecting `viewport`, depth-first
    fn visit(&mut self, viewport: &Envelope, depth: usize, ids: &mut Vec<usize>) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(ShapeError::MalformedRecord {
                offset: self.cursor.position(),
                reason: format!("quad-tree deeper than {MAX_DEPTH} levels"),
            });
        }
        let subtree = self.read_len("subtree size")?;
        let bbox = Envelope::new(
            self.read_f64()?,
            self.read_f64()?,
            self.read_f64()?,
            self.read_f64()?,
        );
        let num_ids = self.read_len("id count")?;

        if !bbox.intersects(viewport) {
            return self.cursor.skip(4 * num_ids + 4 + subtree);
        }

        for _ in 0..num_ids {
            let offset = self.cursor.position();
            let id = self.read_i32()?;
            let id = usize::try_from(id).map_err(|_| ShapeError::MalformedRecord {
                offset,
                reason: format!("negative quad-tree record id {id}"),
            })?;
            ids.push(id);
        }
        let num_children = self.read_len("child count")?;
        for _ in 0..num_children {
            self.visit(viewport, depth + 1, ids)?;
        }
        Ok(())
    }
}

impl<R: Read + Seek> SpatialIndex for QuadTreeIndex<R> {
    fn kind(&self) -> IndexKind {
        IndexKind::QuadTree
    }

    fn query(&mut self, viewport: &Envelope) -> Result<Vec<RecordHandle>> {
        if viewport.is_empty() {
            return Ok(Vec::new());
        }
        self.cursor.seek(HEADER_LEN)?;
        let mut ids = Vec::new();
        self.visit(viewport, 0, &mut ids)?;

        // A record may sit in several nodes
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter().map(|id| self.positions.entry(id)).collect()
    }
}
