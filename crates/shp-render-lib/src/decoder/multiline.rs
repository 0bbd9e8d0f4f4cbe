//! Polyline and polygon records:
//! `bbox, numParts, numPoints, partOffsets[numParts], points[numPoints]`

use super::{read_count, skip_measures};
use crate::clip::{SubPixelMerge, is_sub_pixel, part_intersects, ring_visible};
use crate::{
    BinaryCursor, DecodeContext, DecodeScratch, Dimension, Envelope, Result, ShapeError,
    ShapeKind, SimpleGeometry,
};
use std::io::{Read, Seek};

/// Whether parts are open chains or closed rings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Rings {
    Open,
    Closed,
}

impl Rings {
    fn kind(self) -> ShapeKind {
        match self {
            Rings::Open => ShapeKind::Polyline,
            Rings::Closed => ShapeKind::Polygon,
        }
    }

    fn visible(self, coords: &[f64], viewport: &Envelope) -> bool {
        match self {
            Rings::Open => part_intersects(coords, viewport),
            Rings::Closed => ring_visible(coords, viewport),
        }
    }
}

/// Skip part offsets, coordinates and measures once bbox and counts have been read
pub(super) fn skip_body<R: Read + Seek>(
    cursor: &mut BinaryCursor<R>,
    dim: Dimension,
    num_parts: usize,
    num_points: usize,
) -> Result<()> {
    cursor.skip(4 * num_parts as u64 + 16 * num_points as u64)?;
    skip_measures(cursor, dim, num_points)
}

/// Read and validate the part offset table into `offsets`
fn read_offsets<R: Read + Seek>(
    cursor: &mut BinaryCursor<R>,
    offsets: &mut smallvec::SmallVec<[usize; 8]>,
    num_parts: usize,
    num_points: usize,
) -> Result<()> {
    let mut previous = 0usize;
    for i in 0..num_parts {
        let position = cursor.position();
        let raw = cursor.read_i32()?;
        let offset = usize::try_from(raw)
            .ok()
            .filter(|&o| o >= previous && o <= num_points && (i > 0 || o == 0));
        let Some(offset) = offset else {
            return Err(ShapeError::MalformedRecord {
                offset: position,
                reason: format!(
                    "part offset {raw} out of range (part {i} of {num_parts}, {num_points} points)"
                ),
            });
        };
        offsets.push(offset);
        previous = offset;
    }
    Ok(())
}

pub(super) fn decode<R: Read + Seek>(
    cursor: &mut BinaryCursor<R>,
    ctx: &mut DecodeContext,
    scratch: &mut DecodeScratch,
    dim: Dimension,
    rings: Rings,
) -> Result<Option<SimpleGeometry>> {
    let bbox = cursor.read_envelope()?;
    let num_parts = read_count(cursor, "part count")?;
    let num_points = read_count(cursor, "point count")?;

    if !bbox.is_finite() || !bbox.intersects(&ctx.viewport) {
        ctx.stats.rejected_bbox += 1;
        skip_body(cursor, dim, num_parts, num_points)?;
        return Ok(None);
    }

    let DecodeScratch { offsets, coords } = scratch;
    read_offsets(cursor, offsets, num_parts, num_points)?;

    if num_parts == 0 || num_points == 0 {
        cursor.skip(16 * num_points as u64)?;
        skip_measures(cursor, dim, num_points)?;
        return Ok(None);
    }

    if is_sub_pixel(&bbox, ctx.span_x, ctx.span_y) {
        // First and last vertex only, to keep the orientation
        let (fx, fy) = cursor.read_xy()?;
        let (lx, ly) = if num_points > 1 {
            cursor.skip(16 * (num_points as u64 - 2))?;
            cursor.read_xy()?
        } else {
            (fx, fy)
        };
        skip_measures(cursor, dim, num_points)?;
        ctx.stats.collapsed += 1;

        let mut part = vec![fx, fy, lx, ly];
        if !ctx.transform.transform_part(&mut part) {
            ctx.stats.parts_culled += 1;
            return Ok(None);
        }
        return Ok(Some(SimpleGeometry::new(rings.kind(), vec![part], bbox)));
    }

    let mut parts = Vec::with_capacity(num_parts);
    for i in 0..num_parts {
        let start = offsets[i];
        let end = offsets.get(i + 1).copied().unwrap_or(num_points);
        let count = end - start;
        if count == 0 {
            continue;
        }

        // Decode the whole part even if it ends up culled, to stay in sync
        coords.clear();
        let mut merge = SubPixelMerge::new(ctx.span_x, ctx.span_y);
        for k in 0..count {
            let (x, y) = cursor.read_xy()?;
            if merge.keep(x, y, k + 1 == count) {
                coords.push(x);
                coords.push(y);
            } else {
                ctx.stats.vertices_merged += 1;
            }
        }

        if !rings.visible(coords, &ctx.viewport) {
            ctx.stats.parts_culled += 1;
            continue;
        }
        let mut part = coords.clone();
        if ctx.transform.transform_part(&mut part) {
            parts.push(part);
        } else {
            ctx.stats.parts_culled += 1;
        }
    }
    skip_measures(cursor, dim, num_points)?;

    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(SimpleGeometry::new(rings.kind(), parts, bbox)))
}
