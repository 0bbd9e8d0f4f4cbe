//! MultiPoint records: `bbox, numPoints, points[numPoints]`
//!
//! Every visible point becomes its own single-vertex part.

use super::{read_count, skip_measures};
use crate::clip::{SubPixelMerge, is_sub_pixel};
use crate::{BinaryCursor, DecodeContext, Dimension, Result, ShapeKind, SimpleGeometry};
use std::io::{Read, Seek};

/// Skip the coordinates and measures once the bbox and count have been read
pub(super) fn skip_body<R: Read + Seek>(
    cursor: &mut BinaryCursor<R>,
    dim: Dimension,
    n: usize,
) -> Result<()> {
    cursor.skip(16 * n as u64)?;
    skip_measures(cursor, dim, n)
}

/// Transform and screen-dedup one point; `None` drops it
fn emit(ctx: &mut DecodeContext, x: f64, y: f64) -> Option<Vec<f64>> {
    let Some((sx, sy)) = ctx.transform.transform_point(x, y) else {
        ctx.stats.parts_culled += 1;
        return None;
    };
    if let Some(screen_map) = ctx.screen_map.as_mut() {
        if !screen_map.claim(sx, sy) {
            ctx.stats.screen_duplicates += 1;
            return None;
        }
    }
    Some(vec![sx, sy])
}

pub(super) fn decode<R: Read + Seek>(
    cursor: &mut BinaryCursor<R>,
    ctx: &mut DecodeContext,
    dim: Dimension,
) -> Result<Option<SimpleGeometry>> {
    let bbox = cursor.read_envelope()?;
    let n = read_count(cursor, "point count")?;

    if !bbox.is_finite() || !bbox.intersects(&ctx.viewport) {
        ctx.stats.rejected_bbox += 1;
        skip_body(cursor, dim, n)?;
        return Ok(None);
    }
    if n == 0 {
        skip_measures(cursor, dim, n)?;
        return Ok(None);
    }

    if is_sub_pixel(&bbox, ctx.span_x, ctx.span_y) {
        let (x, y) = cursor.read_xy()?;
        skip_body(cursor, dim, n - 1)?;
        ctx.stats.collapsed += 1;
        return Ok(emit(ctx, x, y)
            .map(|part| SimpleGeometry::new(ShapeKind::MultiPoint, vec![part], bbox)));
    }

    let mut merge = SubPixelMerge::new(ctx.span_x, ctx.span_y);
    let mut parts = Vec::new();
    for _ in 0..n {
        let (x, y) = cursor.read_xy()?;
        if !ctx.viewport.contains_point(x, y) {
            ctx.stats.parts_culled += 1;
            continue;
        }
        if !merge.keep(x, y, false) {
            ctx.stats.vertices_merged += 1;
            continue;
        }
        if let Some(part) = emit(ctx, x, y) {
            parts.push(part);
        }
    }
    skip_measures(cursor, dim, n)?;

    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(SimpleGeometry::new(ShapeKind::MultiPoint, parts, bbox)))
}
