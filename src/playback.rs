//! Read-only lookups for rendering and export collaborators.
//!
//! A renderer walks the track at its own frame rate and asks "what does the
//! activity look like at time t?". All lookups binary-search the elapsed times.

use crate::{ActivityTrack, Point};

/// The first point with `elapsed_time >= t`, or the last point when `t` is past
/// the end of the track.
///
/// ```
/// use activity_fusion::{point_at, ActivityTrack, Point, TimelineKind};
///
/// let track = ActivityTrack::from_points(
///     vec![Point::at(0.0), Point::at(2.0).with_heart_rate(140)],
///     true,
///     TimelineKind::Recorded,
/// ).unwrap();
///
/// assert_eq!(point_at(&track, 1.5).heart_rate, Some(140));
/// assert_eq!(point_at(&track, 99.0).elapsed_time, 2.0);
/// ```
pub fn point_at(track: &ActivityTrack, t: f64) -> &Point {
    let points = track.points();
    let idx = points.partition_point(|p| p.elapsed_time < t);
    &points[idx.min(points.len() - 1)]
}

/// Distance covered up to time `t`: the sum over points with `elapsed_time <= t`.
pub fn distance_at(track: &ActivityTrack, t: f64) -> f64 {
    let points = track.points();
    let end = points.partition_point(|p| p.elapsed_time <= t);
    points[..end].iter().map(|p| p.distance_from_prev).sum()
}

/// Sampling instants for rendering at `fps` frames per second.
///
/// Yields `i / fps` for every whole frame that fits in the track's duration.
pub fn frame_times(track: &ActivityTrack, fps: u32) -> Vec<f64> {
    if fps == 0 {
        return Vec::new();
    }
    let total_frames = (track.stats().total_duration * fps as f64).floor() as usize;
    (0..total_frames).map(|i| i as f64 / fps as f64).collect()
}

impl ActivityTrack {
    /// See [`point_at`].
    pub fn point_at(&self, t: f64) -> &Point {
        point_at(self, t)
    }

    /// See [`distance_at`].
    pub fn distance_at(&self, t: f64) -> f64 {
        distance_at(self, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimelineKind;

    fn sample_track() -> ActivityTrack {
        let mut points = vec![
            Point::at(0.0).with_speed(0.0),
            Point::at(1.0).with_speed(10.0),
            Point::at(3.0).with_speed(20.0),
            Point::at(3.0).with_speed(30.0),
            Point::at(6.0).with_speed(40.0),
        ];
        for (i, p) in points.iter_mut().enumerate() {
            p.distance_from_prev = if i == 0 { 0.0 } else { 100.0 };
        }
        ActivityTrack::from_points(points, true, TimelineKind::Recorded).unwrap()
    }

    #[test]
    fn test_point_at_exact_and_between() {
        let track = sample_track();
        assert_eq!(point_at(&track, 0.0).speed, Some(0.0));
        assert_eq!(point_at(&track, 1.0).speed, Some(10.0));
        assert_eq!(point_at(&track, 1.2).speed, Some(20.0));
        // Duplicate times: the first one wins
        assert_eq!(point_at(&track, 3.0).speed, Some(20.0));
    }

    #[test]
    fn test_point_at_clamps() {
        let track = sample_track();
        assert_eq!(track.point_at(-5.0).elapsed_time, 0.0);
        assert_eq!(track.point_at(100.0).speed, Some(40.0));
    }

    #[test]
    fn test_distance_at() {
        let track = sample_track();
        assert_eq!(distance_at(&track, 0.5), 0.0);
        assert_eq!(distance_at(&track, 1.0), 100.0);
        assert_eq!(track.distance_at(3.0), 300.0);
        assert_eq!(track.distance_at(100.0), 400.0);
    }

    #[test]
    fn test_frame_times() {
        let track = sample_track();
        let frames = frame_times(&track, 2);
        assert_eq!(frames.len(), 12);
        assert_eq!(frames[0], 0.0);
        assert_eq!(frames[11], 5.5);

        assert!(frame_times(&track, 0).is_empty());
    }
}
