// Library interface for pitwall
// This allows integration tests and benchmarks to access internal modules

pub mod cache;
pub mod config;
pub mod datasets;
pub mod errors;
pub mod events;
pub mod reference;
pub mod telemetry;
pub mod track;

// Re-export commonly used types
pub use datasets::{Dataset, DatasetSummary, SeasonBuilder, SkipDiagnostics, SkipReason};
pub use errors::PitwallError;
pub use reference::{ReferenceTables, SeasonContext};
pub use telemetry::{DistanceResampler, NormalizedLap, RawSample, TelemetryProvider};
