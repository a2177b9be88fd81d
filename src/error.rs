//! Unified error handling for the activity-fusion library.
//!
//! Per-point anomalies never show up here: they are absorbed where they happen
//! (a bad coordinate contributes no distance, a missing field stays absent).
//! Everything in this enum is a track-level or configuration-level failure that
//! the caller has to deal with.

use std::fmt;

/// Unified error type for activity-fusion operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityError {
    /// Latitude outside [-90, 90] or longitude outside [-180, 180]
    InvalidCoordinate { latitude: f64, longitude: f64 },
    /// No point in the track carries a position
    NoGpsData { point_count: usize },
    /// Nothing left to build a track from
    NoPoints { message: String },
    /// Elapsed time goes backwards at `index`
    UnorderedTimeline { index: usize },
    /// A fusion priority refers to a track that was not supplied
    InvalidSourceIndex {
        field: String,
        index: usize,
        track_count: usize,
    },
    /// Fusion was asked to merge zero tracks
    EmptyInput,
    /// Input file type the engine has no hints for
    UnsupportedFormat { extension: String },
    /// Priority configured for a field name the engine does not know
    UnknownField { name: String },
    /// Configuration error
    ConfigError { message: String },
    /// Generic internal error
    Internal { message: String },
}

impl fmt::Display for ActivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityError::InvalidCoordinate {
                latitude,
                longitude,
            } => {
                write!(
                    f,
                    "Invalid coordinate ({}, {}): latitude must be within [-90, 90] and longitude within [-180, 180]",
                    latitude, longitude
                )
            }
            ActivityError::NoGpsData { point_count } => {
                write!(
                    f,
                    "Track has {} points but none carry GPS data",
                    point_count
                )
            }
            ActivityError::NoPoints { message } => {
                write!(f, "No usable points: {}", message)
            }
            ActivityError::UnorderedTimeline { index } => {
                write!(
                    f,
                    "Elapsed time decreases at point {}; points must be time-ascending",
                    index
                )
            }
            ActivityError::InvalidSourceIndex {
                field,
                index,
                track_count,
            } => {
                write!(
                    f,
                    "Priority for '{}' refers to source {}, but only {} tracks were supplied",
                    field, index, track_count
                )
            }
            ActivityError::EmptyInput => write!(f, "Cannot fuse an empty set of tracks"),
            ActivityError::UnsupportedFormat { extension } => {
                write!(
                    f,
                    "Unsupported file type: '{}'. Supported types: .gpx, .tcx, .fit",
                    extension
                )
            }
            ActivityError::UnknownField { name } => {
                write!(f, "Unknown fusion field: '{}'", name)
            }
            ActivityError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            ActivityError::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for ActivityError {}

/// Result type alias for activity-fusion operations.
pub type Result<T> = std::result::Result<T, ActivityError>;
