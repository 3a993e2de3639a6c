// Error types for pitwall

use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum PitwallError {
    // Signal conditioning errors
    #[snafu(display("Channel has {actual} samples, smoothing window needs {required}"))]
    InsufficientSamples { required: usize, actual: usize },
    #[snafu(display("Invalid smoothing window: {reason}"))]
    InvalidSmoothingWindow { reason: String },

    // Lap geometry errors
    #[snafu(display("Invalid lap geometry: {reason}"))]
    InvalidLapGeometry { reason: String },

    // Event detection errors
    #[snafu(display("Event duration {seconds:.3}s outside plausible range [{min}, {max}]"))]
    ImplausibleEventDuration { seconds: f64, min: f64, max: f64 },

    // Telemetry provider errors
    #[snafu(display("Telemetry unavailable for {unit}: {reason}"))]
    ProviderUnavailable { unit: String, reason: String },
    #[snafu(display("Season {season} produced no usable laps for {dataset}"))]
    NoUsableLaps { season: u16, dataset: String },

    // Dataset cache and track storage errors
    #[snafu(display("Cache payload {path} is unreadable: {reason}"))]
    CacheCorruption { path: String, reason: String },
    #[snafu(display("Error reading or writing cache file"))]
    CacheIOError { source: io::Error },
    #[snafu(display("Error serializing cache payload"))]
    CacheSerializeError { source: serde_json::Error },
    #[snafu(display("Reference track validation failed: {reason}"))]
    ReferenceTrackValidationError { reason: String },
    #[snafu(display("Track sections are invalid: {reason}"))]
    TrackSectionError { reason: String },
    #[snafu(display("No reference track available for {track_id}"))]
    TrackUnavailable { track_id: String },

    // Config management errors
    #[snafu(display("Could not find application data directory"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },
    #[snafu(display("Reference tables have no entry for {field} in season {season}"))]
    MissingReference { field: String, season: u16 },

    // User input validation errors
    #[snafu(display("Invalid user input: {field} - {reason}"))]
    InvalidUserInput { field: String, reason: String },
}
