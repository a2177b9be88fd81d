//! Geographic utilities: great-circle distance, bearing, bounds and a flat
//! equirectangular projection for drawing routes.
//!
//! Everything here is pure. Checked variants reject coordinates outside
//! [-90, 90] / [-180, 180] with [`ActivityError::InvalidCoordinate`].

use geo::{BoundingRect, MultiPoint, Point as GeoPoint};
use serde::{Deserialize, Serialize};

use crate::{ActivityError, Bounds, Position, Result};

/// Earth radius used by every distance computation, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine great-circle distance in meters.
///
/// Does not validate its inputs; use [`distance`] for untrusted coordinates.
///
/// # Example
/// ```
/// use activity_fusion::Position;
/// use activity_fusion::geo_utils::haversine_distance;
///
/// let london = Position::new(51.5074, -0.1278);
/// let paris = Position::new(48.8566, 2.3522);
/// let d = haversine_distance(&london, &paris);
/// assert!((d - 343_500.0).abs() < 1_000.0);
/// ```
pub fn haversine_distance(a: &Position, b: &Position) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Distance in meters between two positions, rejecting invalid coordinates.
pub fn distance(a: &Position, b: &Position) -> Result<f64> {
    validate(a)?;
    validate(b)?;
    Ok(haversine_distance(a, b))
}

/// Initial bearing from `a` towards `b`, in compass degrees [0, 360).
pub fn initial_bearing(a: &Position, b: &Position) -> Result<f64> {
    validate(a)?;
    validate(b)?;

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    Ok((y.atan2(x).to_degrees() + 360.0) % 360.0)
}

/// Total length of a polyline in meters. Invalid positions are skipped.
pub fn polyline_length(positions: &[Position]) -> f64 {
    let valid: Vec<&Position> = positions.iter().filter(|p| p.is_valid()).collect();
    valid
        .windows(2)
        .map(|w| haversine_distance(w[0], w[1]))
        .sum()
}

/// Bounding box of the valid positions, or `None` if there are none.
pub fn compute_bounds(positions: &[Position]) -> Option<Bounds> {
    let points: MultiPoint<f64> = positions
        .iter()
        .filter(|p| p.is_valid())
        .map(|p| GeoPoint::new(p.longitude, p.latitude))
        .collect();

    let rect = points.bounding_rect()?;
    Some(Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}

fn validate(p: &Position) -> Result<()> {
    if p.is_valid() {
        Ok(())
    } else {
        Err(ActivityError::InvalidCoordinate {
            latitude: p.latitude,
            longitude: p.longitude,
        })
    }
}

// ============================================================================
// Equirectangular projection
// ============================================================================

/// Flat equirectangular mapping of a route's bounds onto a pixel canvas.
///
/// Longitudes are scaled by the cosine of the center latitude so the route
/// keeps its aspect ratio. The route is centered; `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteProjection {
    pub width: f64,
    pub height: f64,
    center_x: f64,
    center_y: f64,
    lon_scale: f64,
    pixels_per_degree: f64,
}

impl RouteProjection {
    /// Fit `bounds` into a `width` x `height` canvas leaving `padding` pixels on every side.
    pub fn fit(bounds: &Bounds, width: f64, height: f64, padding: f64) -> Self {
        let center = bounds.center();
        let lon_scale = center.latitude.to_radians().cos();

        let span_x = (bounds.max_lng - bounds.min_lng) * lon_scale;
        let span_y = bounds.max_lat - bounds.min_lat;
        let avail_w = (width - 2.0 * padding).max(0.0);
        let avail_h = (height - 2.0 * padding).max(0.0);

        let pixels_per_degree = match (span_x > 0.0, span_y > 0.0) {
            (true, true) => (avail_w / span_x).min(avail_h / span_y),
            (true, false) => avail_w / span_x,
            (false, true) => avail_h / span_y,
            // Single location: everything maps to the center
            (false, false) => 0.0,
        };

        Self {
            width,
            height,
            center_x: center.longitude * lon_scale,
            center_y: center.latitude,
            lon_scale,
            pixels_per_degree,
        }
    }

    /// Pixel coordinates of a position.
    pub fn project(&self, position: &Position) -> (f64, f64) {
        let x = position.longitude * self.lon_scale;
        let px = self.width / 2.0 + (x - self.center_x) * self.pixels_per_degree;
        let py = self.height / 2.0 - (position.latitude - self.center_y) * self.pixels_per_degree;
        (px, py)
    }
}
