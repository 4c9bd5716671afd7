//! Universal Transverse Mercator on the WGS84 ellipsoid.
//!
//! Flux rasters are delivered in the UTM zone of the building
//! (EPSG:326zz north, EPSG:327zz south). Only the corner coordinates of a
//! raster go through here, so the series expansions from USGS Professional
//! Paper 1395 (Snyder) are plenty accurate at rooftop scale.
//!
//! The projection parameters:
//! - Scale factor on the central meridian: 0.9996
//! - False easting: 500 000 m
//! - False northing: 0 m (north), 10 000 000 m (south)

use std::f64::consts::PI;

use solar_common::LatLng;
use thiserror::Error;

/// WGS84 semi-major axis (meters)
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

#[derive(Debug, Error, PartialEq)]
pub enum UtmError {
    #[error("UTM zone out of range: {0}")]
    InvalidZone(u8),

    #[error("EPSG code {0} is not a WGS84 UTM zone")]
    UnsupportedEpsg(u16),
}

/// A WGS84 UTM zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    pub zone: u8,
    pub north: bool,
}

impl UtmZone {
    pub fn new(zone: u8, north: bool) -> Result<Self, UtmError> {
        if !(1..=60).contains(&zone) {
            return Err(UtmError::InvalidZone(zone));
        }
        Ok(Self { zone, north })
    }

    /// Zone from an EPSG code: 32601–32660 (north) or 32701–32760 (south).
    pub fn from_epsg(code: u16) -> Result<Self, UtmError> {
        match code {
            32601..=32660 => Self::new((code - 32600) as u8, true),
            32701..=32760 => Self::new((code - 32700) as u8, false),
            _ => Err(UtmError::UnsupportedEpsg(code)),
        }
    }

    /// Zone containing a point (no Norway/Svalbard exceptions).
    pub fn containing(p: &LatLng) -> Self {
        let zone = (((p.lng + 180.0) / 6.0).floor() as i32).clamp(0, 59) + 1;
        Self {
            zone: zone as u8,
            north: p.lat >= 0.0,
        }
    }

    pub fn epsg(&self) -> u16 {
        if self.north {
            32600 + self.zone as u16
        } else {
            32700 + self.zone as u16
        }
    }

    /// Central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        (self.zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }

    /// Project easting/northing (meters) to geographic coordinates.
    pub fn to_geographic(&self, easting: f64, northing: f64) -> LatLng {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);

        let x = easting - FALSE_EASTING;
        let y = if self.north {
            northing
        } else {
            northing - FALSE_NORTHING_SOUTH
        };

        // Footpoint latitude
        let m = y / K0;
        let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin1 = phi1.sin();
        let cos1 = phi1.cos();
        let tan1 = phi1.tan();
        let n1 = WGS84_A / (1.0 - e2 * sin1 * sin1).sqrt();
        let t1 = tan1 * tan1;
        let c1 = ep2 * cos1 * cos1;
        let r1 = WGS84_A * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
        let d = x / (n1 * K0);

        let lat = phi1
            - (n1 * tan1 / r1)
                * (d.powi(2) / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);

        let lon = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5)
                / 120.0)
            / cos1;

        LatLng::new(lat * 180.0 / PI, self.central_meridian() + lon * 180.0 / PI)
    }

    /// Project geographic coordinates to easting/northing (meters).
    pub fn to_projected(&self, p: &LatLng) -> (f64, f64) {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);

        let phi = p.lat.to_radians();
        let lam = p.lng.to_radians();
        let lam0 = self.central_meridian().to_radians();

        let sin = phi.sin();
        let cos = phi.cos();
        let tan = phi.tan();
        let n = WGS84_A / (1.0 - e2 * sin * sin).sqrt();
        let t = tan * tan;
        let c = ep2 * cos * cos;
        let a = cos * (lam - lam0);

        let easting = K0
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
            + FALSE_EASTING;

        let mut northing = K0
            * (meridian_arc(phi, e2)
                + n * tan
                    * (a * a / 2.0
                        + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                        + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
        if !self.north {
            northing += FALSE_NORTHING_SOUTH;
        }

        (easting, northing)
    }
}

/// Distance along the meridian from the equator to latitude `phi` (radians).
fn meridian_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}
