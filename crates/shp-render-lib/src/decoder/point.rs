//! Point records: a bare `x, y` pair with no bbox

use crate::{
    BinaryCursor, DecodeContext, Dimension, Envelope, Result, ShapeKind, SimpleGeometry,
};
use std::io::{Read, Seek};

/// Skip the trailing `z` / `m` values of a point record
fn skip_trailing<R: Read + Seek>(cursor: &mut BinaryCursor<R>, dim: Dimension) -> Result<()> {
    if dim == Dimension::Xyzm {
        cursor.skip(8)?;
    }
    if dim != Dimension::Xy && cursor.remaining() >= 8 {
        cursor.skip(8)?;
    }
    Ok(())
}

pub(super) fn skip<R: Read + Seek>(cursor: &mut BinaryCursor<R>, dim: Dimension) -> Result<()> {
    cursor.skip(16)?;
    skip_trailing(cursor, dim)
}

pub(super) fn decode<R: Read + Seek>(
    cursor: &mut BinaryCursor<R>,
    ctx: &mut DecodeContext,
    dim: Dimension,
) -> Result<Option<SimpleGeometry>> {
    let (x, y) = cursor.read_xy()?;
    skip_trailing(cursor, dim)?;

    if !ctx.viewport.contains_point(x, y) {
        ctx.stats.rejected_bbox += 1;
        return Ok(None);
    }

    let Some((sx, sy)) = ctx.transform.transform_point(x, y) else {
        ctx.stats.parts_culled += 1;
        return Ok(None);
    };

    let claimed = match ctx.screen_map.as_mut() {
        Some(screen_map) => screen_map.claim(sx, sy),
        None => true,
    };
    if !claimed {
        ctx.stats.screen_duplicates += 1;
        return Ok(None);
    }

    Ok(Some(SimpleGeometry::new(
        ShapeKind::Point,
        vec![vec![sx, sy]],
        Envelope::new(x, y, x, y),
    )))
}
