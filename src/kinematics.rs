//! Per-point distance and speed derivation, and track-level aggregates.
//!
//! Distances pair each positioned point with the previous positioned point, and
//! elevation gain/loss pairs consecutive elevation-bearing points: gaps are
//! skipped over, never read as zero.

use log::debug;

use crate::geo_utils;
use crate::{Point, TimelineKind, TrackStats};

/// Fill in `distance_from_prev` and any speed the source did not supply.
///
/// Tracks with at least one valid position get GPS distances; points without a
/// position then get 0. Tracks with no GPS at all keep the distances the
/// normalizer took from the device.
///
/// Derived speed is `distance / dt` in km/h, only when `dt > 0`. Otherwise the
/// speed stays unmeasured; it is never carried over from an earlier point.
pub fn derive_kinematics(points: &mut [Point]) {
    if points.iter().any(Point::has_position) {
        derive_from_positions(points);
    } else {
        derive_from_device_distance(points);
    }
}

fn derive_from_positions(points: &mut [Point]) {
    let mut anchor: Option<usize> = None;
    let mut rejected = 0;

    for i in 0..points.len() {
        let Some(current) = points[i].position else {
            points[i].distance_from_prev = 0.0;
            continue;
        };

        let Some(prev_idx) = anchor else {
            points[i].distance_from_prev = 0.0;
            if current.is_valid() {
                anchor = Some(i);
            }
            continue;
        };

        let previous = &points[prev_idx];
        let prev_time = previous.elapsed_time;
        let paired = previous
            .position
            .map(|prev| geo_utils::distance(&prev, &current));

        match paired {
            Some(Ok(distance)) => {
                points[i].distance_from_prev = distance;
                let dt = points[i].elapsed_time - prev_time;
                if points[i].speed.is_none() && dt > 0.0 {
                    points[i].speed = Some(distance / dt * 3.6);
                }
                anchor = Some(i);
            }
            _ => {
                // Invalid coordinate on either side: no distance for this pair
                rejected += 1;
                points[i].distance_from_prev = 0.0;
                if current.is_valid() {
                    anchor = Some(i);
                }
            }
        }
    }

    if rejected > 0 {
        debug!(
            "[Kinematics] {} point pairs had invalid coordinates and contribute no distance",
            rejected
        );
    }
}

fn derive_from_device_distance(points: &mut [Point]) {
    for i in 1..points.len() {
        let dt = points[i].elapsed_time - points[i - 1].elapsed_time;
        if points[i].speed.is_none() && dt > 0.0 && points[i].distance_from_prev > 0.0 {
            points[i].speed = Some(points[i].distance_from_prev / dt * 3.6);
        }
    }
}

/// Running distance at each point, in meters.
pub fn cumulative_distances(points: &[Point]) -> Vec<f64> {
    points
        .iter()
        .scan(0.0, |total, p| {
            *total += p.distance_from_prev;
            Some(*total)
        })
        .collect()
}

/// Compute the track aggregates from the points alone.
///
/// - speed aggregates consider only points with `speed > 0`
/// - elevation aggregates consider only points with elevation
/// - `total_duration` is the last `elapsed_time`, or the point count for a
///   point-indexed timeline
pub fn compute_stats(points: &[Point], timeline: TimelineKind) -> TrackStats {
    let total_distance: f64 = points.iter().map(|p| p.distance_from_prev).sum();

    let speeds: Vec<f64> = points
        .iter()
        .filter_map(|p| p.speed)
        .filter(|&s| s > 0.0)
        .collect();
    let max_speed = speeds.iter().copied().fold(0.0, f64::max);
    let avg_speed = if speeds.is_empty() {
        0.0
    } else {
        speeds.iter().sum::<f64>() / speeds.len() as f64
    };

    let elevations: Vec<f64> = points.iter().filter_map(|p| p.elevation).collect();
    let max_elevation = elevations.iter().copied().reduce(f64::max);
    let min_elevation = elevations.iter().copied().reduce(f64::min);

    let mut total_elevation_gain = 0.0;
    let mut total_elevation_loss = 0.0;
    for pair in elevations.windows(2) {
        let diff = pair[1] - pair[0];
        if diff > 0.0 {
            total_elevation_gain += diff;
        } else {
            total_elevation_loss -= diff;
        }
    }

    let total_duration = match timeline {
        TimelineKind::PointIndexed => points.len() as f64,
        _ => points.last().map(|p| p.elapsed_time).unwrap_or(0.0),
    };

    TrackStats {
        total_duration,
        total_distance,
        max_speed,
        avg_speed,
        max_elevation,
        min_elevation,
        total_elevation_gain,
        total_elevation_loss,
    }
}
