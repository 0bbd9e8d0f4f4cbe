//! Per-kind record decoders
//!
//! Every decoder reads the record bbox first and either rejects the record, skipping
//! exactly the bytes a full decode would consume, or decodes it with inline culling and
//! decimation. Either way the cursor ends at the start of the next record.
//!
//! Whether the optional M block of a measured record is present can only be told from the
//! record length, so measured records must be read through a cursor fenced to the record
//! end with [`BinaryCursor::set_limit`]; unfenced, they fail with
//! [`ShapeError::MalformedRecord`] instead of reading into the next record.

mod multiline;
mod multipoint;
mod point;

use crate::{
    BinaryCursor, DecodeContext, DecodeScratch, Dimension, Result, ShapeError, ShapeType,
    SimpleGeometry,
};
use std::io::{Read, Seek};

/// Decoder for one on-disk shape type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShapeDecoder {
    shape_type: ShapeType,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ShapeDecoder {
    pub fn new(shape_type: ShapeType) -> Self {
        Self { shape_type }
    }

    pub fn shape_type(&self) -> ShapeType {
        self.shape_type
    }

    /// Decode one record body
    ///
    /// The cursor sits right after the shape type and is fenced to the record end.
    pub fn decode<R: Read + Seek>(
        &self,
        cursor: &mut BinaryCursor<R>,
        ctx: &mut DecodeContext,
    ) -> Result<Option<SimpleGeometry>> {
        let mut scratch = DecodeScratch::new();
        self.decode_with(cursor, ctx, &mut scratch)
    }

    /// Like [`ShapeDecoder::decode`], reusing caller-owned buffers
    pub fn decode_with<R: Read + Seek>(
        &self,
        cursor: &mut BinaryCursor<R>,
        ctx: &mut DecodeContext,
        scratch: &mut DecodeScratch,
    ) -> Result<Option<SimpleGeometry>> {
        scratch.clear();
        require_fence(cursor, self.shape_type.dimension())?;
        match self.shape_type {
            ShapeType::Null => Ok(None),
            ShapeType::Point(dim) => point::decode(cursor, ctx, dim),
            ShapeType::MultiPoint(dim) => multipoint::decode(cursor, ctx, dim),
            ShapeType::Polyline(dim) => {
                multiline::decode(cursor, ctx, scratch, dim, multiline::Rings::Open)
            }
            ShapeType::Polygon(dim) => {
                multiline::decode(cursor, ctx, scratch, dim, multiline::Rings::Closed)
            }
        }
    }

    /// Consume one record body without materializing anything
    pub fn skip<R: Read + Seek>(&self, cursor: &mut BinaryCursor<R>) -> Result<()> {
        require_fence(cursor, self.shape_type.dimension())?;
        match self.shape_type {
            ShapeType::Null => Ok(()),
            ShapeType::Point(dim) => point::skip(cursor, dim),
            ShapeType::MultiPoint(dim) => {
                cursor.skip(32)?;
                let n = read_count(cursor, "point count")?;
                multipoint::skip_body(cursor, dim, n)
            }
            ShapeType::Polyline(dim) | ShapeType::Polygon(dim) => {
                cursor.skip(32)?;
                let parts = read_count(cursor, "part count")?;
                let points = read_count(cursor, "point count")?;
                multiline::skip_body(cursor, dim, parts, points)
            }
        }
    }
}

/// Read a non-negative element count
pub(crate) fn read_count<R: Read + Seek>(
    cursor: &mut BinaryCursor<R>,
    what: &str,
) -> Result<usize> {
    let offset = cursor.position();
    let count = cursor.read_i32()?;
    usize::try_from(count).map_err(|_| ShapeError::MalformedRecord {
        offset,
        reason: format!("negative {what} {count}"),
    })
}

/// Fail unless the record end is known; the M block cannot be detected otherwise
fn require_fence<R: Read + Seek>(
    cursor: &BinaryCursor<R>,
    dim: Dimension,
) -> Result<()> {
    if dim == Dimension::Xy || cursor.is_fenced() {
        return Ok(());
    }
    Err(ShapeError::MalformedRecord {
        offset: cursor.position(),
        reason: "measured record read without a record limit".to_string(),
    })
}

/// Skip the trailing Z and M blocks of an `n`-vertex record
///
/// Z variants always carry the Z block; the M block is present only if the record is long
/// enough to hold it.
pub(crate) fn skip_measures<R: Read + Seek>(
    cursor: &mut BinaryCursor<R>,
    dim: Dimension,
    n: usize,
) -> Result<()> {
    let block = 16 + 8 * n as u64;
    if dim == Dimension::Xyzm {
        cursor.skip(block)?;
    }
    if dim != Dimension::Xy && cursor.remaining() >= block {
        cursor.skip(block)?;
    }
    Ok(())
}
