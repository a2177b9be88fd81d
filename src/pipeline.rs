//! Per-file pipeline and batch entry points.
//!
//! Each input goes through normalize -> derive -> (synthesize) on its own and
//! produces one [`ActivityTrack`]. Inputs share nothing, so with the `parallel`
//! feature they run on the rayon pool. Fusion is the join point: it needs every
//! track finished before it starts.

use log::{info, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::fusion::{fuse, FieldPriorities, FusionConfig};
use crate::kinematics::derive_kinematics;
use crate::normalize::{normalize_points, RawPoint, SourceHints};
use crate::timeline::{synthesize_timeline, TimelineConfig};
use crate::{ActivityError, ActivityTrack, Result, TimelineKind};

/// Engine-wide configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timeline: TimelineConfig,
    pub fusion: FusionConfig,
}

impl EngineConfig {
    /// Parse a JSON config; missing sections and fields take their defaults.
    ///
    /// ```
    /// use activity_fusion::EngineConfig;
    ///
    /// let config = EngineConfig::from_json(r#"{"timeline": {"assumed_speed_kmh": 10.0}}"#).unwrap();
    /// assert_eq!(config.timeline.assumed_speed_kmh, 10.0);
    /// assert_eq!(config.fusion.bucket_tolerance_secs, 1.0);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ActivityError::ConfigError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.timeline.validate()?;
        self.fusion.validate()
    }
}

/// One decoded input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInput {
    pub points: Vec<RawPoint>,
    pub hints: SourceHints,
}

impl SourceInput {
    pub fn new(points: Vec<RawPoint>, hints: SourceHints) -> Self {
        Self { points, hints }
    }
}

/// Turn one decoded file into a track.
///
/// Fails with `NoPoints` for empty input and `NoGpsData` when positions are
/// required (or needed to keep any point) but absent.
pub fn normalize_and_derive(
    raw: &[RawPoint],
    hints: &SourceHints,
    config: &EngineConfig,
) -> Result<ActivityTrack> {
    config.timeline.validate()?;

    let normalized = normalize_points(raw, hints)?;
    let mut points = normalized.points;

    derive_kinematics(&mut points);
    let timeline = synthesize_timeline(&mut points, normalized.has_timestamps, &config.timeline);

    if timeline != TimelineKind::Recorded {
        warn!(
            "[Pipeline] {:?} source has no usable time data; displayed times are estimates",
            hints.format
        );
    }

    let track = ActivityTrack::from_parts(points, timeline == TimelineKind::Recorded, timeline, 1)?;
    info!(
        "[Pipeline] {:?}: {} points, {:.2} km, {:.0}s, max {:.1} km/h",
        hints.format,
        track.len(),
        track.stats().total_distance / 1000.0,
        track.stats().total_duration,
        track.stats().max_speed
    );
    Ok(track)
}

/// Run [`normalize_and_derive`] for every input, in input order.
pub fn normalize_and_derive_all(
    inputs: &[SourceInput],
    config: &EngineConfig,
) -> Vec<Result<ActivityTrack>> {
    #[cfg(feature = "parallel")]
    let results: Vec<Result<ActivityTrack>> = {
        info!("[Pipeline] Processing {} inputs in parallel", inputs.len());
        inputs
            .par_iter()
            .map(|input| normalize_and_derive(&input.points, &input.hints, config))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<Result<ActivityTrack>> = {
        info!("[Pipeline] Processing {} inputs sequentially", inputs.len());
        inputs
            .iter()
            .map(|input| normalize_and_derive(&input.points, &input.hints, config))
            .collect()
    };

    results
}

/// Full run: every input through the pipeline, then fusion.
///
/// The first failing input aborts the run; no partial fusion is attempted.
pub fn process(
    inputs: &[SourceInput],
    priorities: &FieldPriorities,
    config: &EngineConfig,
) -> Result<ActivityTrack> {
    if inputs.is_empty() {
        return Err(ActivityError::EmptyInput);
    }
    config.validate()?;
    priorities.validate(inputs.len())?;

    let tracks = normalize_and_derive_all(inputs, config)
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
    fuse(&tracks, priorities, &config.fusion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::SourceFormat;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn timed_route(n: usize, step_secs: i64) -> Vec<RawPoint> {
        (0..n)
            .map(|i| {
                RawPoint::with_position(45.0 + i as f64 * 0.001, 7.0)
                    .timestamp(ts(i as i64 * step_secs))
                    .elevation(200.0 + i as f64)
            })
            .collect()
    }

    #[test]
    fn test_timed_gpx() {
        let hints = SourceHints::for_format(SourceFormat::Gpx);
        let track =
            normalize_and_derive(&timed_route(5, 10), &hints, &EngineConfig::default()).unwrap();

        assert!(track.has_real_time());
        assert_eq!(track.timeline(), TimelineKind::Recorded);
        assert_eq!(track.stats().total_duration, 40.0);
        assert!((track.stats().total_distance - 444.78).abs() < 0.1);
        assert_eq!(track.stats().total_elevation_gain, 4.0);
        // ~111m per 10s = ~40 km/h everywhere
        assert!((track.stats().avg_speed - 40.03).abs() < 0.1);
    }

    #[test]
    fn test_untimed_gpx_is_estimated() {
        let raw: Vec<RawPoint> = (0..4)
            .map(|i| RawPoint::with_position(45.0 + i as f64 * 0.001, 7.0))
            .collect();
        let track =
            normalize_and_derive(&raw, &SourceHints::default(), &EngineConfig::default()).unwrap();

        assert!(!track.has_real_time());
        assert_eq!(track.timeline(), TimelineKind::DistanceEstimated);
        let expected = track.stats().total_distance / (15.0 / 3.6);
        assert!((track.stats().total_duration - expected).abs() < 1e-9);
        assert_eq!(track.stats().avg_speed, 0.0);
    }

    #[test]
    fn test_require_route() {
        let raw = vec![RawPoint::default().heart_rate(120); 2];
        let hints = SourceHints::default()
            .retain_positionless(true)
            .require_route(true);
        let result = normalize_and_derive(&raw, &hints, &EngineConfig::default());
        assert_eq!(result, Err(ActivityError::NoGpsData { point_count: 2 }));
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let inputs = vec![
            SourceInput::new(timed_route(3, 1), SourceHints::default()),
            SourceInput::new(vec![], SourceHints::default()),
            SourceInput::new(timed_route(6, 1), SourceHints::default()),
        ];
        let results = normalize_and_derive_all(&inputs, &EngineConfig::default());

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().len(), 3);
        assert!(matches!(results[1], Err(ActivityError::NoPoints { .. })));
        assert_eq!(results[2].as_ref().unwrap().len(), 6);
    }

    #[test]
    fn test_process_single_input_is_identity() {
        let inputs = vec![SourceInput::new(timed_route(4, 2), SourceHints::default())];
        let config = EngineConfig::default();

        let direct = normalize_and_derive(&inputs[0].points, &inputs[0].hints, &config).unwrap();
        let processed = process(&inputs, &FieldPriorities::new(), &config).unwrap();
        assert_eq!(processed, direct);
    }

    #[test]
    fn test_process_errors() {
        let config = EngineConfig::default();
        assert_eq!(
            process(&[], &FieldPriorities::new(), &config),
            Err(ActivityError::EmptyInput)
        );

        let inputs = vec![SourceInput::new(timed_route(2, 1), SourceHints::default())];
        let priorities = FieldPriorities::new().with(crate::FusedField::Speed, 1);
        assert!(matches!(
            process(&inputs, &priorities, &config),
            Err(ActivityError::InvalidSourceIndex { .. })
        ));
    }

    #[test]
    fn test_config_from_json() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());

        let bad = EngineConfig::from_json(r#"{"timeline": {"assumed_speed_kmh": -1}}"#);
        assert!(matches!(bad, Err(ActivityError::ConfigError { .. })));

        let garbage = EngineConfig::from_json("not json");
        assert!(matches!(garbage, Err(ActivityError::ConfigError { .. })));
    }
}
