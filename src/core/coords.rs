//! Coordinate pairs, the key type of every distance query.

use std::fmt;

/// Equatorial earth radius in meters used for straight-line distances
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// A directed (from, to) pair of WGS84 points.
///
/// Equality is exact on all four components, which is also how the cache keys
/// records: `(A -> B)` and `(B -> A)` are different keys, and two pairs that
/// differ only in the last bit of a coordinate never share a cache entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatePair {
    pub from_lat: f64,
    pub from_lon: f64,
    pub to_lat: f64,
    pub to_lon: f64,
}

impl CoordinatePair {
    pub fn new(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> Self {
        Self {
            from_lat,
            from_lon,
            to_lat,
            to_lon,
        }
    }

    /// All four components are finite numbers
    pub fn is_finite(&self) -> bool {
        self.from_lat.is_finite()
            && self.from_lon.is_finite()
            && self.to_lat.is_finite()
            && self.to_lon.is_finite()
    }

    /// Same points, opposite direction
    pub fn reversed(&self) -> Self {
        Self::new(self.to_lat, self.to_lon, self.from_lat, self.from_lon)
    }

    /// Great-circle distance between the two points in meters
    pub fn straight_line_distance(&self) -> f64 {
        haversine_distance(self.from_lat, self.from_lon, self.to_lat, self.to_lon)
    }
}

impl fmt::Display for CoordinatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) -> ({}, {})",
            self.from_lat, self.from_lon, self.to_lat, self.to_lon
        )
    }
}

pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}
