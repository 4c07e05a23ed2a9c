//! Geometry over E7 fixed-point coordinates.
//!
//! Points carry latitude and longitude as `i32` values scaled by `1e7`. The
//! helpers here are pure: validity of a point, containment in a rectangle,
//! and great-circle distance.

use crate::{
    Error, Result,
    proto::{Point, Rectangle},
};
use core::fmt;

/// Scale factor between E7 integers and degrees.
pub const COORD_FACTOR: f64 = 1e7;

/// Mean Earth radius used by [`distance`], in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Builds a [`Point`] from E7 latitude and longitude.
pub const fn point(latitude: i32, longitude: i32) -> Point {
    Point {
        latitude,
        longitude,
    }
}

/// Converts an E7 coordinate to degrees.
pub fn to_degrees(e7: i32) -> f64 {
    f64::from(e7) / COORD_FACTOR
}

/// `false` only for the `(0, 0)` "no location" sentinel.
pub const fn is_valid(point: &Point) -> bool {
    point.latitude != 0 || point.longitude != 0
}

/// Whether `point` lies inside `rect`, corners included.
///
/// A rectangle missing either corner contains nothing.
pub fn contains(rect: &Rectangle, point: &Point) -> bool {
    Bounds::try_from(rect).is_ok_and(|bounds| bounds.contains(point))
}

/// Haversine distance between two points, in meters.
pub fn distance(start: &Point, end: &Point) -> f64 {
    let lat1 = to_degrees(start.latitude).to_radians();
    let lat2 = to_degrees(end.latitude).to_radians();
    let delta_lat = lat2 - lat1;
    let delta_lon = (to_degrees(end.longitude) - to_degrees(start.longitude)).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// An axis-aligned box with its corners normalized so that `min <= max` on
/// both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    min_latitude: i32,
    max_latitude: i32,
    min_longitude: i32,
    max_longitude: i32,
}

impl Bounds {
    pub fn from_corners(a: &Point, b: &Point) -> Self {
        Self {
            min_latitude: a.latitude.min(b.latitude),
            max_latitude: a.latitude.max(b.latitude),
            min_longitude: a.longitude.min(b.longitude),
            max_longitude: a.longitude.max(b.longitude),
        }
    }

    pub const fn contains(&self, point: &Point) -> bool {
        point.latitude >= self.min_latitude
            && point.latitude <= self.max_latitude
            && point.longitude >= self.min_longitude
            && point.longitude <= self.max_longitude
    }
}

impl TryFrom<&Rectangle> for Bounds {
    type Error = Error;

    fn try_from(rect: &Rectangle) -> Result<Self> {
        match (rect.lo.as_ref(), rect.hi.as_ref()) {
            (Some(lo), Some(hi)) => Ok(Self::from_corners(lo, hi)),
            (None, _) => Err(Error::invalid_argument("rectangle is missing its `lo` corner")),
            (_, None) => Err(Error::invalid_argument("rectangle is missing its `hi` corner")),
        }
    }
}

/// Renders a point in degrees, e.g. `40.914614, -74.618891`.
pub struct Degrees<'a>(pub &'a Point);

impl fmt::Display for Degrees<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6}, {:.6}",
            to_degrees(self.0.latitude),
            to_degrees(self.0.longitude)
        )
    }
}
