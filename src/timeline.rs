//! Synthetic timelines for recordings without usable timestamps.
//!
//! Decision chain, first match wins:
//! 1. Real timestamps spanning more than 0 s: keep them ([`TimelineKind::Recorded`]).
//! 2. Some distance covered: assume a constant pace and spread the duration over
//!    the points in proportion to cumulative distance ([`TimelineKind::DistanceEstimated`]).
//! 3. Nothing to go on: one second per point ([`TimelineKind::PointIndexed`]).
//!
//! A degenerate timeline is therefore never an error.

use log::info;
use serde::{Deserialize, Serialize};

use crate::kinematics::cumulative_distances;
use crate::{ActivityError, Point, Result, TimelineKind};

/// Configuration for timeline synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Pace assumed for untimed recordings, in km/h.
    /// Default: 15.0
    pub assumed_speed_kmh: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            assumed_speed_kmh: 15.0,
        }
    }
}

impl TimelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.assumed_speed_kmh.is_finite() || self.assumed_speed_kmh <= 0.0 {
            return Err(ActivityError::ConfigError {
                message: format!(
                    "assumed_speed_kmh must be a positive number, got {}",
                    self.assumed_speed_kmh
                ),
            });
        }
        Ok(())
    }
}

/// Give `points` a usable timeline and report how it was obtained.
///
/// `has_timestamps` says whether the source supplied any timestamp at all.
/// Distances must already be derived: the estimate reads `distance_from_prev`.
pub fn synthesize_timeline(
    points: &mut [Point],
    has_timestamps: bool,
    config: &TimelineConfig,
) -> TimelineKind {
    let recorded_duration = points.last().map(|p| p.elapsed_time).unwrap_or(0.0);
    if has_timestamps && recorded_duration > 0.0 {
        return TimelineKind::Recorded;
    }

    let cumulative = cumulative_distances(points);
    let total_distance = cumulative.last().copied().unwrap_or(0.0);

    if total_distance > 0.0 {
        let duration = total_distance / (config.assumed_speed_kmh / 3.6);
        for (point, distance) in points.iter_mut().zip(&cumulative) {
            point.elapsed_time = distance / total_distance * duration;
        }
        info!(
            "[Timeline] No usable time data; estimated {:.0}s from {:.0}m at {} km/h",
            duration, total_distance, config.assumed_speed_kmh
        );
        return TimelineKind::DistanceEstimated;
    }

    for (i, point) in points.iter_mut().enumerate() {
        point.elapsed_time = i as f64;
    }
    info!(
        "[Timeline] No time or distance data; using one second per point ({} points)",
        points.len()
    );
    TimelineKind::PointIndexed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute_stats;

    fn with_distances(deltas: &[f64]) -> Vec<Point> {
        deltas
            .iter()
            .map(|&d| {
                let mut p = Point::at(0.0);
                p.distance_from_prev = d;
                p
            })
            .collect()
    }

    #[test]
    fn test_recorded_time_is_kept() {
        let mut points = vec![Point::at(0.0), Point::at(4.0), Point::at(9.0)];
        let kind = synthesize_timeline(&mut points, true, &TimelineConfig::default());

        assert_eq!(kind, TimelineKind::Recorded);
        assert_eq!(points[2].elapsed_time, 9.0);
    }

    #[test]
    fn test_distance_proportional_timeline() {
        // Cumulative distances 0, 1000, 3000
        let mut points = with_distances(&[0.0, 1000.0, 2000.0]);
        let kind = synthesize_timeline(&mut points, false, &TimelineConfig::default());

        assert_eq!(kind, TimelineKind::DistanceEstimated);
        assert_eq!(points[0].elapsed_time, 0.0);
        assert!((points[1].elapsed_time - 240.0).abs() < 1e-9);
        assert!((points[2].elapsed_time - 720.0).abs() < 1e-9);

        let stats = compute_stats(&points, kind);
        assert!((stats.total_duration - 720.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_timestamps_are_degenerate() {
        let mut points = with_distances(&[0.0, 500.0]);
        let kind = synthesize_timeline(&mut points, true, &TimelineConfig::default());
        assert_eq!(kind, TimelineKind::DistanceEstimated);
    }

    #[test]
    fn test_configurable_pace() {
        let mut points = with_distances(&[0.0, 3600.0]);
        let config = TimelineConfig {
            assumed_speed_kmh: 3.6,
        };
        synthesize_timeline(&mut points, false, &config);
        assert!((points[1].elapsed_time - 3600.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_index_fallback() {
        let mut points = with_distances(&[0.0, 0.0, 0.0]);
        let kind = synthesize_timeline(&mut points, false, &TimelineConfig::default());

        assert_eq!(kind, TimelineKind::PointIndexed);
        let elapsed: Vec<f64> = points.iter().map(|p| p.elapsed_time).collect();
        assert_eq!(elapsed, vec![0.0, 1.0, 2.0]);
        assert_eq!(compute_stats(&points, kind).total_duration, 3.0);
    }

    #[test]
    fn test_single_point() {
        let mut points = vec![Point::at(0.0).with_position(45.0, 7.0)];
        let kind = synthesize_timeline(&mut points, false, &TimelineConfig::default());
        assert_eq!(kind, TimelineKind::PointIndexed);
        assert_eq!(compute_stats(&points, kind).total_duration, 1.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(TimelineConfig::default().validate().is_ok());
        let bad = TimelineConfig {
            assumed_speed_kmh: 0.0,
        };
        assert!(matches!(
            bad.validate(),
            Err(ActivityError::ConfigError { .. })
        ));
    }
}
