//! # Activity Fusion
//!
//! Normalization, kinematics and multi-source fusion for GPS activity recordings.
//!
//! This library provides:
//! - Conversion of decoded GPX/TCX/FIT point streams into one canonical [`Point`] schema
//! - Distance, speed and elevation statistics derived from the points themselves
//! - Timeline synthesis for recordings without usable timestamps
//! - Fusion of several recordings of the same activity into one timeline
//!
//! Decoding the files is left to format libraries: they hand the engine
//! [`RawPoint`]s with every missing field marked absent.
//!
//! ## Features
//!
//! - **`parallel`** - Run the per-file pipeline across input files with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use activity_fusion::{normalize_and_derive, EngineConfig, RawPoint, SourceFormat, SourceHints};
//!
//! // A GPX route with no timestamps, ~111m between points
//! let raw: Vec<RawPoint> = (0..5)
//!     .map(|i| RawPoint::with_position(51.5 + i as f64 * 0.001, -0.12))
//!     .collect();
//!
//! let hints = SourceHints::for_format(SourceFormat::Gpx);
//! let track = normalize_and_derive(&raw, &hints, &EngineConfig::default()).unwrap();
//!
//! assert!(!track.has_real_time());
//! assert!(track.stats().total_distance > 400.0);
//! assert!(track.stats().total_duration > 0.0);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{ActivityError, Result};

// Geographic utilities (distance, bearing, bounds, projection)
pub mod geo_utils;
pub use geo_utils::RouteProjection;

// Source-specific raw records -> canonical points
pub mod normalize;
pub use normalize::{
    normalize_points, NormalizedPoints, PositionUnit, RawPoint, SourceFormat, SourceHints,
    SpeedUnit,
};

// Distance/speed/elevation derivation and aggregates
pub mod kinematics;
pub use kinematics::{compute_stats, cumulative_distances, derive_kinematics};

// Synthetic timelines for untimed recordings
pub mod timeline;
pub use timeline::{synthesize_timeline, TimelineConfig};

// Multi-source fusion
pub mod fusion;
pub use fusion::{fuse, FieldPriorities, FusedField, FusionConfig};

// Per-file pipeline and batch entry points
pub mod pipeline;
pub use pipeline::{normalize_and_derive, normalize_and_derive_all, process, EngineConfig, SourceInput};

// Read-only lookups for rendering collaborators
pub mod playback;
pub use playback::{distance_at, frame_times, point_at};

// Algorithm toolbox - modular access to all algorithms
pub mod algorithms;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate in degrees.
///
/// # Example
/// ```
/// use activity_fusion::Position;
/// let point = Position::new(51.5074, -0.1278); // London
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    /// Create a new position.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the position has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One sample along an activity.
///
/// Every optional field is genuinely optional: `None` means the source never
/// measured it, and is never stood in for by zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Latitude/longitude, both present or both absent
    pub position: Option<Position>,
    /// Elevation in meters
    pub elevation: Option<f64>,
    /// Absolute instant, authoritative for elapsed time when present
    pub timestamp: Option<DateTime<Utc>>,
    /// Seconds since the track's first point (real or synthesized)
    pub elapsed_time: f64,
    /// Meters from the previous paired point, 0 for the first point
    pub distance_from_prev: f64,
    /// Speed in km/h; `None` when it could not be measured
    pub speed: Option<f64>,
    /// Heart rate in bpm
    pub heart_rate: Option<u16>,
    /// Cadence in rpm (or spm)
    pub cadence: Option<u16>,
    /// Power in watts
    pub power: Option<u16>,
}

impl Point {
    /// Create a point at the given elapsed time with every optional field absent.
    pub fn at(elapsed_time: f64) -> Self {
        Self {
            elapsed_time,
            ..Default::default()
        }
    }

    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.position = Some(Position::new(latitude, longitude));
        self
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed = Some(speed_kmh);
        self
    }

    pub fn with_heart_rate(mut self, heart_rate: u16) -> Self {
        self.heart_rate = Some(heart_rate);
        self
    }

    pub fn with_cadence(mut self, cadence: u16) -> Self {
        self.cadence = Some(cadence);
        self
    }

    pub fn with_power(mut self, power: u16) -> Self {
        self.power = Some(power);
        self
    }

    /// True if the point carries a position with valid coordinates.
    pub fn has_position(&self) -> bool {
        self.position.is_some_and(|p| p.is_valid())
    }

    pub fn latitude(&self) -> Option<f64> {
        self.position.map(|p| p.latitude)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.position.map(|p| p.longitude)
    }

    /// Speed for display: unmeasured reads as 0 km/h.
    pub fn speed_kmh(&self) -> f64 {
        self.speed.unwrap_or(0.0)
    }
}

/// How a track's `elapsed_time` values were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    /// From genuine timestamps
    Recorded,
    /// Spread proportionally to distance at an assumed pace
    DistanceEstimated,
    /// One second per point
    PointIndexed,
    /// Bucket means of several point-indexed timelines; no longer one second per point
    MergedEstimate,
}

/// Track-level aggregates.
///
/// A cache over the points: always produced by [`compute_stats`], never edited.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackStats {
    /// Duration in seconds
    pub total_duration: f64,
    /// Distance in meters
    pub total_distance: f64,
    /// Maximum speed in km/h (0 if no speed was measured)
    pub max_speed: f64,
    /// Mean of the positive speeds in km/h (0 if none)
    pub avg_speed: f64,
    /// Highest elevation in meters
    pub max_elevation: Option<f64>,
    /// Lowest elevation in meters
    pub min_elevation: Option<f64>,
    /// Total climb in meters
    pub total_elevation_gain: f64,
    /// Total descent in meters
    pub total_elevation_loss: f64,
}

/// Bounding box for a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from positions. Invalid coordinates are ignored.
    pub fn from_positions(positions: &[Position]) -> Option<Self> {
        geo_utils::compute_bounds(positions)
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> Position {
        Position::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// One normalized, time-ordered point sequence plus its aggregates.
///
/// Invariants held by every constructor:
/// - `points` is never empty
/// - `elapsed_time` is non-decreasing along `points`
/// - `stats` equals `compute_stats(points, timeline)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityTrack {
    points: Vec<Point>,
    has_real_time: bool,
    timeline: TimelineKind,
    sources: usize,
    stats: TrackStats,
}

impl ActivityTrack {
    /// Build a track from an already-normalized point sequence.
    ///
    /// Aggregates are computed from the points. Fails if `points` is empty or
    /// its elapsed times go backwards.
    pub fn from_points(
        points: Vec<Point>,
        has_real_time: bool,
        timeline: TimelineKind,
    ) -> Result<Self> {
        Self::from_parts(points, has_real_time, timeline, 1)
    }

    pub(crate) fn from_parts(
        points: Vec<Point>,
        has_real_time: bool,
        timeline: TimelineKind,
        sources: usize,
    ) -> Result<Self> {
        if points.is_empty() {
            return Err(ActivityError::NoPoints {
                message: "track has no points".to_string(),
            });
        }
        if let Some(index) = points
            .windows(2)
            .position(|w| w[1].elapsed_time < w[0].elapsed_time)
        {
            return Err(ActivityError::UnorderedTimeline { index: index + 1 });
        }

        let stats = compute_stats(&points, timeline);
        Ok(Self {
            points,
            has_real_time,
            timeline,
            sources,
            stats,
        })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    /// True only if a contributing source supplied genuine timestamps.
    pub fn has_real_time(&self) -> bool {
        self.has_real_time
    }

    pub fn timeline(&self) -> TimelineKind {
        self.timeline
    }

    /// Number of input recordings merged into this track.
    pub fn sources(&self) -> usize {
        self.sources
    }

    pub fn stats(&self) -> &TrackStats {
        &self.stats
    }

    /// Compute the aggregates from the points again, without touching the cache.
    pub fn recompute_stats(&self) -> TrackStats {
        compute_stats(&self.points, self.timeline)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> &Point {
        &self.points[0]
    }

    pub fn last(&self) -> &Point {
        &self.points[self.points.len() - 1]
    }

    /// True if any point carries a valid position.
    pub fn has_gps(&self) -> bool {
        self.points.iter().any(Point::has_position)
    }

    /// Fail with [`ActivityError::NoGpsData`] unless the track can draw a route.
    pub fn require_route(&self) -> Result<()> {
        if self.has_gps() {
            Ok(())
        } else {
            Err(ActivityError::NoGpsData {
                point_count: self.points.len(),
            })
        }
    }

    /// Bounding box over all valid positions.
    pub fn bounds(&self) -> Option<Bounds> {
        let positions: Vec<Position> = self.points.iter().filter_map(|p| p.position).collect();
        Bounds::from_positions(&positions)
    }

    /// Running distance at each point, in meters.
    pub fn cumulative_distances(&self) -> Vec<f64> {
        cumulative_distances(&self.points)
    }

    /// Serialize the track (points, flags and aggregates) as JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ActivityError::Internal {
            message: format!("failed to serialize track: {}", e),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
