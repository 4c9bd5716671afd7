//! Geographic bounds and anchor-containment repair.

use serde::{Deserialize, Serialize};

use crate::geo::LatLng;

/// Minimum half-extent (degrees) kept around an anchor when bounds are repaired.
pub const MIN_SAFETY_MARGIN_DEG: f64 = 0.0002;

/// Extents above this are logged as too coarse for a rooftop overlay.
pub const LARGE_EXTENT_DEG: f64 = 0.01;

/// Extents below this are logged as suspiciously small.
pub const SMALL_EXTENT_DEG: f64 = 0.0001;

/// South-west / north-east corners of a lat/lng box.
///
/// Longitudes are assumed not to cross the antimeridian; rooftop rasters
/// span a few hundred meters at most.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub sw: LatLng,
    pub ne: LatLng,
}

impl GeoBounds {
    pub fn new(sw: LatLng, ne: LatLng) -> Self {
        Self { sw, ne }
    }

    /// Build from edge values.
    pub fn from_edges(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            sw: LatLng::new(south, west),
            ne: LatLng::new(north, east),
        }
    }

    /// Square box (in degrees) centered on `center`.
    pub fn around(center: LatLng, half_extent_deg: f64) -> Self {
        Self::around_with(center, half_extent_deg, half_extent_deg)
    }

    /// Box centered on `center` with separate latitude/longitude half-extents.
    pub fn around_with(center: LatLng, half_lat: f64, half_lng: f64) -> Self {
        Self::from_edges(
            center.lat - half_lat,
            center.lng - half_lng,
            center.lat + half_lat,
            center.lng + half_lng,
        )
    }

    /// Smallest box containing every point, or `None` for an empty iterator.
    pub fn envelope<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Self::new(p, p),
                Some(b) => Self::from_edges(
                    b.south().min(p.lat),
                    b.west().min(p.lng),
                    b.north().max(p.lat),
                    b.east().max(p.lng),
                ),
            })
        })
    }

    pub fn south(&self) -> f64 {
        self.sw.lat
    }

    pub fn west(&self) -> f64 {
        self.sw.lng
    }

    pub fn north(&self) -> f64 {
        self.ne.lat
    }

    pub fn east(&self) -> f64 {
        self.ne.lng
    }

    /// Latitude span in degrees.
    pub fn height_deg(&self) -> f64 {
        self.north() - self.south()
    }

    /// Longitude span in degrees.
    pub fn width_deg(&self) -> f64 {
        self.east() - self.west()
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south() + self.north()) / 2.0,
            (self.west() + self.east()) / 2.0,
        )
    }

    /// Swap corners so that `north >= south` and `east >= west`.
    pub fn normalized(&self) -> Self {
        Self::from_edges(
            self.south().min(self.north()),
            self.west().min(self.east()),
            self.south().max(self.north()),
            self.west().max(self.east()),
        )
    }

    /// Finite, with strictly positive width and height.
    pub fn is_valid(&self) -> bool {
        [self.south(), self.west(), self.north(), self.east()]
            .iter()
            .all(|v| v.is_finite())
            && self.north() > self.south()
            && self.east() > self.west()
    }

    /// Inclusive containment.
    pub fn contains_point(&self, p: &LatLng) -> bool {
        p.lat >= self.south() && p.lat <= self.north() && p.lng >= self.west() && p.lng <= self.east()
    }

    /// Containment with the point off every edge.
    pub fn strictly_contains(&self, p: &LatLng) -> bool {
        p.lat > self.south() && p.lat < self.north() && p.lng > self.west() && p.lng < self.east()
    }

    /// Grow every edge by `pad_deg`.
    pub fn padded(&self, pad_deg: f64) -> Self {
        Self::from_edges(
            self.south() - pad_deg,
            self.west() - pad_deg,
            self.north() + pad_deg,
            self.east() + pad_deg,
        )
    }

    /// Normalize and, if needed, recenter on `anchor` so it is strictly contained.
    ///
    /// When the anchor already lies inside valid bounds they are returned
    /// normalized and unchanged. Otherwise the result is centered on the
    /// anchor with half-extents of `max(existing half-extent, min_margin_deg)`
    /// on each axis.
    pub fn repair_around(&self, anchor: LatLng, min_margin_deg: f64) -> BoundsRepair {
        let bounds = self.normalized();
        if bounds.is_valid() && bounds.strictly_contains(&anchor) {
            return BoundsRepair {
                bounds,
                repaired: false,
            };
        }

        // f64::max drops NaN, so degenerate input still yields the margin.
        let half_lat = (bounds.height_deg() / 2.0).max(min_margin_deg);
        let half_lng = (bounds.width_deg() / 2.0).max(min_margin_deg);

        BoundsRepair {
            bounds: Self::around_with(anchor, half_lat, half_lng),
            repaired: true,
        }
    }

    /// True when either span is outside the range a rooftop overlay expects.
    pub fn has_unusual_extent(&self) -> bool {
        let (w, h) = (self.width_deg().abs(), self.height_deg().abs());
        w > LARGE_EXTENT_DEG || h > LARGE_EXTENT_DEG || w < SMALL_EXTENT_DEG || h < SMALL_EXTENT_DEG
    }
}

/// Result of [`GeoBounds::repair_around`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsRepair {
    pub bounds: GeoBounds,
    /// Whether the input had to be recentered.
    pub repaired: bool,
}
