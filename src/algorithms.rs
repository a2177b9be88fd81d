//! # Algorithm Toolbox
//!
//! Direct access to every algorithm in the engine, for callers that want one
//! step without the whole pipeline.
//!
//! ## Core Algorithms
//!
//! - **Normalization**: raw decoder records to canonical points
//! - **Kinematics**: distances, derived speeds, track aggregates
//! - **Timeline Synthesis**: estimated times for untimed recordings
//! - **Fusion**: temporal join of several recordings
//!
//! ## Geographic Utilities
//!
//! - **Haversine Distance**: Great-circle distance between positions
//! - **Initial Bearing**: Compass heading between positions
//! - **Bounds Computation**: Bounding box for GPS tracks
//! - **Douglas-Peucker**: Route outline simplification
//!
//! # Example
//!
//! ```rust
//! use activity_fusion::algorithms::{distance, initial_bearing, Position};
//!
//! let london = Position::new(51.5074, -0.1278);
//! let paris = Position::new(48.8566, 2.3522);
//! let meters = distance(&london, &paris).unwrap();
//! let heading = initial_bearing(&london, &paris).unwrap();
//! println!("London to Paris: {:.0} km heading {:.0}°", meters / 1000.0, heading);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{ActivityTrack, Bounds, Point, Position, TimelineKind, TrackStats};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{
    compute_bounds, distance, haversine_distance, initial_bearing, polyline_length,
    RouteProjection, EARTH_RADIUS_M,
};

// =============================================================================
// Pipeline Steps
// =============================================================================

/// Convert decoder records into canonical points.
pub use crate::normalize::normalize_points;

/// Fill in distances and derived speeds.
pub use crate::kinematics::derive_kinematics;

/// Recompute track aggregates from points.
pub use crate::kinematics::compute_stats;

/// Give untimed points a distance-proportional or point-indexed timeline.
pub use crate::timeline::synthesize_timeline;

/// Merge several tracks into one timeline.
pub use crate::fusion::fuse;

// =============================================================================
// Line Simplification
// =============================================================================

/// Douglas-Peucker simplification of a track's route outline.
///
/// Points without a valid position are skipped. Uses the geo crate's
/// implementation; `tolerance` is in degrees.
///
/// # Example
/// ```rust
/// use activity_fusion::algorithms::{simplify_route, Point};
///
/// let track = vec![
///     Point::at(0.0).with_position(51.5074, -0.1278),
///     Point::at(1.0).with_position(51.5080, -0.1280),
///     Point::at(2.0),
///     Point::at(3.0).with_position(51.5090, -0.1300),
/// ];
/// let outline = simplify_route(&track, 0.0001);
/// assert!(outline.len() <= 3);
/// ```
pub fn simplify_route(points: &[Point], tolerance: f64) -> Vec<Position> {
    use geo::{algorithm::simplify::Simplify, Coord, LineString};

    let coords: Vec<Coord<f64>> = points
        .iter()
        .filter_map(|p| p.position)
        .filter(|p| p.is_valid())
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();

    if coords.len() < 3 {
        return coords.iter().map(|c| Position::new(c.y, c.x)).collect();
    }

    let line = LineString::new(coords);
    line.simplify(&tolerance)
        .coords()
        .map(|c| Position::new(c.y, c.x))
        .collect()
}
