//! Web Mercator (EPSG:3857) projection of WGS84 longitude/latitude
//!
//! All functions take and return `x = longitude`, `y = latitude` in degrees on the WGS84
//! side and meters on the Mercator side.

use geo::Coord;
use std::f64::consts::{FRAC_PI_2, PI};

/// Half the width of the projected world, in meters
pub const HALF_WORLD_METERS: f64 = 20037508.34;

/// Latitude at which the projected world becomes square
pub const MAX_LATITUDE: f64 = 85.05112878;

const METERS_PER_DEGREE: f64 = HALF_WORLD_METERS / 180.0;
const Y_SCALE: f64 = HALF_WORLD_METERS / PI;

/// Whether `(lon, lat)` lies in the projection's domain
#[inline]
pub fn in_mercator_domain(lon: f64, lat: f64) -> bool {
    lon.is_finite() && lat.is_finite() && lon.abs() <= 180.0 && lat.abs() <= MAX_LATITUDE
}

/// Project without any domain check; latitudes near the poles diverge
#[inline(always)]
pub fn project_unchecked(lon: f64, lat: f64) -> Coord<f64> {
    let phi = lat.to_radians();
    Coord {
        x: lon * METERS_PER_DEGREE,
        y: (phi.tan() + phi.cos().recip()).ln() * Y_SCALE,
    }
}

/// Project `(lon, lat)`, or `None` outside the Mercator domain
#[inline]
pub fn project(lon: f64, lat: f64) -> Option<Coord<f64>> {
    in_mercator_domain(lon, lat).then(|| project_unchecked(lon, lat))
}

/// Project with the latitude clamped into the domain; used for viewport corners
#[inline]
pub fn project_clamped(lon: f64, lat: f64) -> Coord<f64> {
    project_unchecked(
        lon.clamp(-180.0, 180.0),
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE),
    )
}

/// Inverse projection from meters back to `(lon, lat)`
#[inline(always)]
pub fn unproject(x: f64, y: f64) -> Coord<f64> {
    Coord {
        x: x / METERS_PER_DEGREE,
        y: (FRAC_PI_2 - 2.0 * (-y / Y_SCALE).exp().atan()).to_degrees(),
    }
}
