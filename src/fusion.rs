//! Multi-source fusion: merge several recordings of one activity into a single
//! timeline.
//!
//! ## Algorithm
//!
//! 1. Flatten every track's points, tagged with the track's index, and stable-sort
//!    them by `elapsed_time`.
//! 2. Greedy bucketing: the first unconsumed point anchors a bucket, which absorbs
//!    every following point within `bucket_tolerance_secs` of the *anchor* (not of
//!    the previous member). Membership depends on the input order near the
//!    tolerance boundary, but is deterministic for a given input.
//! 3. Each bucket becomes one point. Each field is resolved on its own: the first
//!    member from the field's priority source that has a value, else the first
//!    member in sort order that has one, else absent.
//! 4. The merged `elapsed_time` is the mean of the bucket members' times.
//! 5. Distances, derived speeds and every aggregate are computed again from the
//!    merged points. Without any position, the distance comes from the sources'
//!    cumulative distances, resolved per bucket like any other field.
//!
//! ## Example
//! ```rust
//! use activity_fusion::{fuse, ActivityTrack, FieldPriorities, FusedField, FusionConfig, Point, TimelineKind};
//!
//! let watch = ActivityTrack::from_points(
//!     vec![Point::at(0.0).with_position(45.0, 7.0).with_heart_rate(150)],
//!     true,
//!     TimelineKind::Recorded,
//! ).unwrap();
//! let strap = ActivityTrack::from_points(
//!     vec![Point::at(0.4).with_heart_rate(160)],
//!     true,
//!     TimelineKind::Recorded,
//! ).unwrap();
//!
//! let priorities = FieldPriorities::new().with(FusedField::HeartRate, 1);
//! let merged = fuse(&[watch, strap], &priorities, &FusionConfig::default()).unwrap();
//!
//! assert_eq!(merged.len(), 1);
//! assert_eq!(merged.first().heart_rate, Some(160));
//! assert!(merged.first().position.is_some());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::kinematics::derive_kinematics;
use crate::normalize::apply_device_distances;
use crate::{ActivityError, ActivityTrack, Point, Position, Result, TimelineKind};

/// Point fields that fusion resolves independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusedField {
    Position,
    Timestamp,
    Speed,
    #[serde(alias = "ele")]
    Elevation,
    #[serde(alias = "hr")]
    HeartRate,
    Cadence,
    Power,
    /// Cumulative distance of position-less tracks
    Distance,
}

impl FusedField {
    pub const ALL: [FusedField; 8] = [
        FusedField::Position,
        FusedField::Timestamp,
        FusedField::Speed,
        FusedField::Elevation,
        FusedField::HeartRate,
        FusedField::Cadence,
        FusedField::Power,
        FusedField::Distance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FusedField::Position => "position",
            FusedField::Timestamp => "timestamp",
            FusedField::Speed => "speed",
            FusedField::Elevation => "elevation",
            FusedField::HeartRate => "heart_rate",
            FusedField::Cadence => "cadence",
            FusedField::Power => "power",
            FusedField::Distance => "distance",
        }
    }
}

impl fmt::Display for FusedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FusedField {
    type Err = ActivityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "position" | "gps" => Ok(FusedField::Position),
            "timestamp" | "time" => Ok(FusedField::Timestamp),
            "speed" => Ok(FusedField::Speed),
            "elevation" | "ele" | "altitude" => Ok(FusedField::Elevation),
            "heart_rate" | "hr" => Ok(FusedField::HeartRate),
            "cadence" => Ok(FusedField::Cadence),
            "power" => Ok(FusedField::Power),
            "distance" => Ok(FusedField::Distance),
            _ => Err(ActivityError::UnknownField {
                name: s.to_string(),
            }),
        }
    }
}

/// Preferred source track per field.
///
/// Fields without an entry take the first value in time order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPriorities(BTreeMap<FusedField, usize>);

impl FieldPriorities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer `source` (an index into the fused tracks) for `field`.
    pub fn with(mut self, field: FusedField, source: usize) -> Self {
        self.0.insert(field, source);
        self
    }

    pub fn set(&mut self, field: FusedField, source: usize) {
        self.0.insert(field, source);
    }

    /// Build from `(field name, source index)` pairs, e.g. `[("hr", 1)]`.
    pub fn from_names<'a>(pairs: impl IntoIterator<Item = (&'a str, usize)>) -> Result<Self> {
        let mut priorities = Self::new();
        for (name, source) in pairs {
            priorities.set(name.parse()?, source);
        }
        Ok(priorities)
    }

    pub fn get(&self, field: FusedField) -> Option<usize> {
        self.0.get(&field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FusedField, usize)> + '_ {
        self.0.iter().map(|(field, source)| (*field, *source))
    }

    /// Every configured source must be one of the `track_count` tracks.
    pub fn validate(&self, track_count: usize) -> Result<()> {
        match self.iter().find(|(_, source)| *source >= track_count) {
            Some((field, index)) => Err(ActivityError::InvalidSourceIndex {
                field: field.to_string(),
                index,
                track_count,
            }),
            None => Ok(()),
        }
    }
}

/// Configuration for track fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Points within this many seconds of a bucket's anchor are treated as the
    /// same instant.
    /// Default: 1.0
    pub bucket_tolerance_secs: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            bucket_tolerance_secs: 1.0,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.bucket_tolerance_secs.is_finite() || self.bucket_tolerance_secs < 0.0 {
            return Err(ActivityError::ConfigError {
                message: format!(
                    "bucket_tolerance_secs must be a non-negative number, got {}",
                    self.bucket_tolerance_secs
                ),
            });
        }
        Ok(())
    }
}

/// A point together with the index of the track it came from.
#[derive(Debug, Clone, Copy)]
struct Tagged<'a> {
    source: usize,
    point: &'a Point,
    /// Running distance within its own track, for tracks that covered any
    distance: Option<f64>,
}

/// Merge `tracks` into one track.
///
/// Fails with `EmptyInput` for no tracks and `InvalidSourceIndex` for a priority
/// pointing outside `tracks`. A single track is returned unchanged.
pub fn fuse(
    tracks: &[ActivityTrack],
    priorities: &FieldPriorities,
    config: &FusionConfig,
) -> Result<ActivityTrack> {
    if tracks.is_empty() {
        return Err(ActivityError::EmptyInput);
    }
    priorities.validate(tracks.len())?;
    config.validate()?;

    if tracks.len() == 1 {
        return Ok(tracks[0].clone());
    }

    let mut tagged: Vec<Tagged> = tracks
        .iter()
        .enumerate()
        .flat_map(|(source, track)| {
            let covers_distance = track.stats().total_distance > 0.0;
            track
                .points()
                .iter()
                .zip(track.cumulative_distances())
                .map(move |(point, distance)| Tagged {
                    source,
                    point,
                    distance: covers_distance.then_some(distance),
                })
        })
        .collect();
    tagged.sort_by(|a, b| a.point.elapsed_time.total_cmp(&b.point.elapsed_time));

    let buckets = bucket_by_time(&tagged, config.bucket_tolerance_secs);
    let mut merged: Vec<Point> = buckets
        .iter()
        .map(|bucket| merge_bucket(bucket, priorities))
        .collect();
    let cumulative: Vec<Option<f64>> = buckets
        .iter()
        .map(|bucket| resolve(bucket, priorities.get(FusedField::Distance), |m| m.distance))
        .collect();
    apply_device_distances(&mut merged, &cumulative);
    derive_kinematics(&mut merged);

    let has_real_time = tracks.iter().any(ActivityTrack::has_real_time);
    let timeline = merged_timeline(tracks);
    let sources = tracks.iter().map(ActivityTrack::sources).sum();

    info!(
        "[Fusion] Merged {} tracks ({} points) into {} points",
        tracks.len(),
        tagged.len(),
        merged.len()
    );
    debug!(
        "[Fusion] Priorities: {:?}, tolerance {}s",
        priorities, config.bucket_tolerance_secs
    );

    ActivityTrack::from_parts(merged, has_real_time, timeline, sources)
}

/// Split a time-sorted list into anchor-based buckets.
fn bucket_by_time<'s, 'a>(sorted: &'s [Tagged<'a>], tolerance: f64) -> Vec<&'s [Tagged<'a>]> {
    let mut buckets = Vec::new();
    let mut start = 0;

    while start < sorted.len() {
        let anchor = sorted[start].point.elapsed_time;
        let mut end = start + 1;
        while end < sorted.len() && sorted[end].point.elapsed_time - anchor <= tolerance {
            end += 1;
        }
        buckets.push(&sorted[start..end]);
        start = end;
    }

    buckets
}

/// First value of a field among the bucket members, preferring `preferred`.
fn resolve<T>(
    members: &[Tagged],
    preferred: Option<usize>,
    get: impl Fn(&Tagged) -> Option<T>,
) -> Option<T> {
    if let Some(source) = preferred {
        let from_preferred = members
            .iter()
            .filter(|m| m.source == source)
            .find_map(&get);
        if from_preferred.is_some() {
            return from_preferred;
        }
    }
    members.iter().find_map(get)
}

fn merge_bucket(members: &[Tagged], priorities: &FieldPriorities) -> Point {
    let elapsed_time =
        members.iter().map(|m| m.point.elapsed_time).sum::<f64>() / members.len() as f64;

    Point {
        position: resolve(members, priorities.get(FusedField::Position), |m| {
            m.point.position.filter(Position::is_valid)
        }),
        timestamp: resolve(members, priorities.get(FusedField::Timestamp), |m| {
            m.point.timestamp
        }),
        speed: resolve(members, priorities.get(FusedField::Speed), |m| m.point.speed),
        elevation: resolve(members, priorities.get(FusedField::Elevation), |m| {
            m.point.elevation
        }),
        heart_rate: resolve(members, priorities.get(FusedField::HeartRate), |m| {
            m.point.heart_rate
        }),
        cadence: resolve(members, priorities.get(FusedField::Cadence), |m| {
            m.point.cadence
        }),
        power: resolve(members, priorities.get(FusedField::Power), |m| m.point.power),
        elapsed_time,
        distance_from_prev: 0.0,
    }
}

/// Most authoritative timeline among the inputs.
///
/// Bucket means of one-second-per-point timelines are no longer one second per
/// point, so those merge into [`TimelineKind::MergedEstimate`].
fn merged_timeline(tracks: &[ActivityTrack]) -> TimelineKind {
    let kinds: Vec<TimelineKind> = tracks.iter().map(ActivityTrack::timeline).collect();
    if kinds.contains(&TimelineKind::Recorded) {
        TimelineKind::Recorded
    } else if kinds.contains(&TimelineKind::DistanceEstimated) {
        TimelineKind::DistanceEstimated
    } else {
        TimelineKind::MergedEstimate
    }
}
