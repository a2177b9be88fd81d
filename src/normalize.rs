//! Source-specific raw records to canonical [`Point`]s.
//!
//! Format decoders (GPX, TCX, FIT libraries) hand over [`RawPoint`]s carrying
//! whatever subset of fields the file had, in the file's own units. Units are
//! converted exactly once, here:
//! - semicircle positions become degrees
//! - speeds become km/h
//! - absolute timestamps become `elapsed_time` seconds since the first timestamp
//!
//! A point with only one coordinate is a no-position point, never 0/0.

use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{ActivityError, Point, Position, Result};

/// Degrees per FIT semicircle (180 / 2^31).
pub const DEGREES_PER_SEMICIRCLE: f64 = 180.0 / 2_147_483_648.0;

/// One decoded record, as the format library produced it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPoint {
    /// Latitude in the source's position unit
    pub latitude: Option<f64>,
    /// Longitude in the source's position unit
    pub longitude: Option<f64>,
    /// Elevation in meters
    pub elevation: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Speed in the source's speed unit
    pub speed: Option<f64>,
    /// Cumulative distance reported by the device, in meters
    pub device_distance: Option<f64>,
    pub heart_rate: Option<u16>,
    pub cadence: Option<u16>,
    pub power: Option<u16>,
}

impl RawPoint {
    /// A record with a position and nothing else.
    pub fn with_position(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Default::default()
        }
    }

    pub fn elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn device_distance(mut self, meters: f64) -> Self {
        self.device_distance = Some(meters);
        self
    }

    pub fn heart_rate(mut self, bpm: u16) -> Self {
        self.heart_rate = Some(bpm);
        self
    }

    pub fn cadence(mut self, rpm: u16) -> Self {
        self.cadence = Some(rpm);
        self
    }

    pub fn power(mut self, watts: u16) -> Self {
        self.power = Some(watts);
        self
    }
}

/// File format a recording was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Gpx,
    Tcx,
    Fit,
    /// Already-decoded points from anywhere else, in degrees and m/s
    Other,
}

impl SourceFormat {
    /// Detect the format from a file extension (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "gpx" => Ok(SourceFormat::Gpx),
            "tcx" => Ok(SourceFormat::Tcx),
            "fit" => Ok(SourceFormat::Fit),
            _ => Err(ActivityError::UnsupportedFormat {
                extension: format!(".{}", ext),
            }),
        }
    }
}

/// Unit the source encodes positions in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionUnit {
    Degrees,
    /// FIT semicircles; a zero coordinate means "no fix"
    Semicircles,
}

/// Unit the source encodes speed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedUnit {
    MetersPerSecond,
    KilometersPerHour,
}

impl SpeedUnit {
    fn to_kmh(self, value: f64) -> f64 {
        match self {
            SpeedUnit::MetersPerSecond => value * 3.6,
            SpeedUnit::KilometersPerHour => value,
        }
    }
}

/// What the normalizer needs to know about a source beyond its points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHints {
    pub format: SourceFormat,
    pub position_unit: PositionUnit,
    pub speed_unit: SpeedUnit,
    /// Keep points without a position (heart-rate straps, indoor trainers).
    /// Default: false
    pub retain_positionless: bool,
    /// Fail with `NoGpsData` when no point carries a position.
    /// Default: false
    pub require_route: bool,
}

impl SourceHints {
    /// Default hints for a decoded format.
    pub fn for_format(format: SourceFormat) -> Self {
        let position_unit = match format {
            SourceFormat::Fit => PositionUnit::Semicircles,
            _ => PositionUnit::Degrees,
        };
        Self {
            format,
            position_unit,
            speed_unit: SpeedUnit::MetersPerSecond,
            retain_positionless: false,
            require_route: false,
        }
    }

    /// Hints for a file path, by extension.
    pub fn for_path(path: impl AsRef<Path>) -> Result<Self> {
        SourceFormat::from_path(path).map(Self::for_format)
    }

    pub fn retain_positionless(mut self, retain: bool) -> Self {
        self.retain_positionless = retain;
        self
    }

    pub fn require_route(mut self, require: bool) -> Self {
        self.require_route = require;
        self
    }
}

impl Default for SourceHints {
    fn default() -> Self {
        Self::for_format(SourceFormat::Other)
    }
}

/// Output of [`normalize_points`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPoints {
    /// Canonical points with `elapsed_time` set from timestamps (0 when untimed)
    pub points: Vec<Point>,
    /// At least one point carried a timestamp
    pub has_timestamps: bool,
    /// At least one point carries a valid position
    pub has_gps: bool,
    /// Records dropped for lacking a position
    pub dropped: usize,
}

/// Convert raw records into canonical points.
///
/// Positionless records are dropped unless `hints.retain_positionless` is set.
/// When the source carries a cumulative device distance, `distance_from_prev`
/// is pre-filled from it; kinematics replaces it with GPS distance whenever the
/// track has positions.
///
/// Fails with `NoPoints` on empty input, with `NoGpsData` if every record was
/// dropped for lacking a position (or if `require_route` is set and none has one).
pub fn normalize_points(raw: &[RawPoint], hints: &SourceHints) -> Result<NormalizedPoints> {
    if raw.is_empty() {
        return Err(ActivityError::NoPoints {
            message: "source contained no records".to_string(),
        });
    }

    let mut points = Vec::with_capacity(raw.len());
    let mut device_distances = Vec::with_capacity(raw.len());
    let mut dropped = 0;

    for record in raw {
        let position = convert_position(record, hints.position_unit);
        if position.is_none() && !hints.retain_positionless {
            dropped += 1;
            continue;
        }

        points.push(Point {
            position,
            elevation: record.elevation.filter(|e| e.is_finite()),
            timestamp: record.timestamp,
            elapsed_time: 0.0,
            distance_from_prev: 0.0,
            speed: record
                .speed
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(|s| hints.speed_unit.to_kmh(s)),
            heart_rate: record.heart_rate,
            cadence: record.cadence,
            power: record.power,
        });
        device_distances.push(record.device_distance.filter(|d| d.is_finite()));
    }

    if points.is_empty() {
        return Err(ActivityError::NoGpsData {
            point_count: raw.len(),
        });
    }

    let has_gps = points.iter().any(Point::has_position);
    if hints.require_route && !has_gps {
        return Err(ActivityError::NoGpsData {
            point_count: points.len(),
        });
    }

    let has_timestamps = assign_elapsed_times(&mut points);
    apply_device_distances(&mut points, &device_distances);

    debug!(
        "[Normalize] {:?}: {} points kept, {} dropped, gps={}, timestamps={}",
        hints.format,
        points.len(),
        dropped,
        has_gps,
        has_timestamps
    );

    Ok(NormalizedPoints {
        points,
        has_timestamps,
        has_gps,
        dropped,
    })
}

fn convert_position(record: &RawPoint, unit: PositionUnit) -> Option<Position> {
    let convert = |v: Option<f64>| -> Option<f64> {
        let v = v.filter(|v| v.is_finite())?;
        match unit {
            PositionUnit::Degrees => Some(v),
            PositionUnit::Semicircles if v == 0.0 => None,
            PositionUnit::Semicircles => Some(v * DEGREES_PER_SEMICIRCLE),
        }
    };

    match (convert(record.latitude), convert(record.longitude)) {
        (Some(lat), Some(lon)) => Some(Position::new(lat, lon)),
        _ => None,
    }
}

/// Set `elapsed_time` from timestamps, keeping the sequence non-decreasing.
///
/// Returns whether any timestamp was seen.
fn assign_elapsed_times(points: &mut [Point]) -> bool {
    let mut t0: Option<DateTime<Utc>> = None;
    let mut previous = 0.0_f64;
    let mut clamped = 0;

    for point in points.iter_mut() {
        if let Some(ts) = point.timestamp {
            let start = *t0.get_or_insert(ts);
            let elapsed = (ts - start).num_milliseconds() as f64 / 1000.0;
            if elapsed < previous {
                clamped += 1;
            }
            previous = previous.max(elapsed);
        }
        point.elapsed_time = previous;
    }

    if clamped > 0 {
        warn!(
            "[Normalize] {} timestamps went backwards and were clamped to the previous time",
            clamped
        );
    }

    t0.is_some()
}

pub(crate) fn apply_device_distances(points: &mut [Point], device_distances: &[Option<f64>]) {
    let mut previous: Option<f64> = None;
    for (point, current) in points.iter_mut().zip(device_distances) {
        if let (Some(prev), Some(curr)) = (previous, current) {
            point.distance_from_prev = (curr - prev).max(0.0);
        }
        if current.is_some() {
            previous = *current;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(SourceFormat::from_path("ride.GPX").unwrap(), SourceFormat::Gpx);
        assert_eq!(SourceFormat::from_path("/tmp/a.tcx").unwrap(), SourceFormat::Tcx);
        assert_eq!(SourceFormat::from_path("run.fit").unwrap(), SourceFormat::Fit);
        assert_eq!(
            SourceFormat::from_path("notes.txt"),
            Err(ActivityError::UnsupportedFormat {
                extension: ".txt".to_string()
            })
        );
    }

    #[test]
    fn test_semicircles_converted_once() {
        // 2^30 semicircles = 90 degrees, 2^29 = 45 degrees
        let raw = vec![RawPoint::with_position(1_073_741_824.0, 536_870_912.0)];
        let hints = SourceHints::for_format(SourceFormat::Fit);
        let out = normalize_points(&raw, &hints).unwrap();

        let pos = out.points[0].position.unwrap();
        assert_eq!(pos.latitude, 90.0);
        assert_eq!(pos.longitude, 45.0);
    }

    #[test]
    fn test_half_position_becomes_no_position() {
        let raw = vec![
            RawPoint::with_position(45.0, 7.0),
            RawPoint {
                latitude: Some(45.1),
                longitude: None,
                heart_rate: Some(140),
                ..Default::default()
            },
        ];

        let dropped = normalize_points(&raw, &SourceHints::default()).unwrap();
        assert_eq!(dropped.points.len(), 1);
        assert_eq!(dropped.dropped, 1);

        let hints = SourceHints::default().retain_positionless(true);
        let kept = normalize_points(&raw, &hints).unwrap();
        assert_eq!(kept.points.len(), 2);
        assert_eq!(kept.points[1].position, None);
        assert_eq!(kept.points[1].heart_rate, Some(140));
    }

    #[test]
    fn test_zero_semicircle_is_no_fix() {
        let raw = vec![
            RawPoint::with_position(0.0, 536_870_912.0).heart_rate(100),
            RawPoint::with_position(536_870_912.0, 536_870_912.0),
        ];
        let hints = SourceHints::for_format(SourceFormat::Fit);
        let out = normalize_points(&raw, &hints).unwrap();
        assert_eq!(out.points.len(), 1);
        assert_eq!(out.dropped, 1);
    }

    #[test]
    fn test_speed_converted_to_kmh() {
        let raw = vec![
            RawPoint::with_position(45.0, 7.0).speed(5.0),
            RawPoint::with_position(45.0, 7.0).speed(-1.0),
        ];
        let out = normalize_points(&raw, &SourceHints::default()).unwrap();
        assert_eq!(out.points[0].speed, Some(18.0));
        assert_eq!(out.points[1].speed, None);

        let mut hints = SourceHints::default();
        hints.speed_unit = SpeedUnit::KilometersPerHour;
        let out = normalize_points(&raw, &hints).unwrap();
        assert_eq!(out.points[0].speed, Some(5.0));
    }

    #[test]
    fn test_elapsed_time_from_first_timestamp() {
        let raw = vec![
            RawPoint::with_position(45.0, 7.0),
            RawPoint::with_position(45.0, 7.0).timestamp(ts(100)),
            RawPoint::with_position(45.0, 7.0),
            RawPoint::with_position(45.0, 7.0).timestamp(ts(130)),
            RawPoint::with_position(45.0, 7.0).timestamp(ts(125)),
        ];
        let out = normalize_points(&raw, &SourceHints::default()).unwrap();
        let elapsed: Vec<f64> = out.points.iter().map(|p| p.elapsed_time).collect();

        assert!(out.has_timestamps);
        assert_eq!(elapsed, vec![0.0, 0.0, 0.0, 30.0, 30.0]);
    }

    #[test]
    fn test_untimed_source() {
        let raw = vec![
            RawPoint::with_position(45.0, 7.0),
            RawPoint::with_position(45.1, 7.0),
        ];
        let out = normalize_points(&raw, &SourceHints::default()).unwrap();
        assert!(!out.has_timestamps);
        assert!(out.has_gps);
        assert!(out.points.iter().all(|p| p.elapsed_time == 0.0));
    }

    #[test]
    fn test_absent_fields_stay_absent() {
        let raw = vec![RawPoint::with_position(45.0, 7.0).elevation(0.0)];
        let out = normalize_points(&raw, &SourceHints::default()).unwrap();
        let p = &out.points[0];

        assert_eq!(p.elevation, Some(0.0));
        assert_eq!(p.heart_rate, None);
        assert_eq!(p.cadence, None);
        assert_eq!(p.power, None);
        assert_eq!(p.speed, None);
    }

    #[test]
    fn test_device_distance_deltas() {
        let raw = vec![
            RawPoint::default().heart_rate(120).device_distance(0.0),
            RawPoint::default().heart_rate(121),
            RawPoint::default().heart_rate(122).device_distance(25.0),
            RawPoint::default().heart_rate(123).device_distance(20.0),
        ];
        let hints = SourceHints::default().retain_positionless(true);
        let out = normalize_points(&raw, &hints).unwrap();
        let deltas: Vec<f64> = out.points.iter().map(|p| p.distance_from_prev).collect();

        assert!(!out.has_gps);
        assert_eq!(deltas, vec![0.0, 0.0, 25.0, 0.0]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            normalize_points(&[], &SourceHints::default()),
            Err(ActivityError::NoPoints { .. })
        ));

        let hr_only = vec![RawPoint::default().heart_rate(120); 3];
        assert_eq!(
            normalize_points(&hr_only, &SourceHints::default()),
            Err(ActivityError::NoGpsData { point_count: 3 })
        );

        let hints = SourceHints::default()
            .retain_positionless(true)
            .require_route(true);
        assert_eq!(
            normalize_points(&hr_only, &hints),
            Err(ActivityError::NoGpsData { point_count: 3 })
        );
    }
}
