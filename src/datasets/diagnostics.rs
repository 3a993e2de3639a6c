use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::Dataset;
use crate::PitwallError;

/// Why a lap, session or event was left out of a dataset
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    InsufficientSamples,
    InvalidLapGeometry,
    ImplausibleEventDuration,
    ProviderUnavailable,
    TrackUnavailable,
    MissingReference,
}

impl SkipReason {
    /// Reason to skip the unit that raised `error`, `None` when the error has to abort
    /// the whole build (configuration and cache I/O problems)
    pub fn from_error(error: &PitwallError) -> Option<Self> {
        match error {
            PitwallError::InsufficientSamples { .. } => Some(SkipReason::InsufficientSamples),
            PitwallError::InvalidLapGeometry { .. } => Some(SkipReason::InvalidLapGeometry),
            PitwallError::ImplausibleEventDuration { .. } => {
                Some(SkipReason::ImplausibleEventDuration)
            }
            PitwallError::ProviderUnavailable { .. } => Some(SkipReason::ProviderUnavailable),
            PitwallError::TrackUnavailable { .. }
            | PitwallError::ReferenceTrackValidationError { .. } => {
                Some(SkipReason::TrackUnavailable)
            }
            PitwallError::MissingReference { .. } => Some(SkipReason::MissingReference),
            _ => None,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SkipReason::InsufficientSamples => "insufficient samples",
            SkipReason::InvalidLapGeometry => "invalid lap geometry",
            SkipReason::ImplausibleEventDuration => "implausible event duration",
            SkipReason::ProviderUnavailable => "provider unavailable",
            SkipReason::TrackUnavailable => "track unavailable",
            SkipReason::MissingReference => "missing reference data",
        };
        f.write_str(label)
    }
}

/// Skipped units per reason, plus how many laps made it through normalization
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkipDiagnostics {
    pub skipped: BTreeMap<SkipReason, usize>,
    pub usable_laps: usize,
}

impl SkipDiagnostics {
    pub fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_default() += 1;
    }

    pub fn count(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or_default()
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

impl fmt::Display for SkipDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} usable laps", self.usable_laps)?;
        for (reason, count) in &self.skipped {
            write!(f, ", {count} skipped ({reason})")?;
        }
        Ok(())
    }
}

/// Accumulates the rows of one season dataset and the reasons anything was left out
pub struct RecordCollector<R> {
    dataset: Dataset,
    rows: Vec<R>,
    diagnostics: SkipDiagnostics,
}

impl<R> RecordCollector<R> {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            rows: Vec::new(),
            diagnostics: SkipDiagnostics::default(),
        }
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = R>) {
        self.rows.extend(rows);
    }

    pub fn lap_used(&mut self) {
        self.diagnostics.usable_laps += 1;
    }

    /// Count `error` against `unit` and carry on, or hand it back when it is fatal
    pub fn skip(&mut self, error: PitwallError, unit: &str) -> Result<(), PitwallError> {
        match SkipReason::from_error(&error) {
            Some(reason) => {
                debug!("Skipping {}: {}", unit, error);
                self.diagnostics.record_skip(reason);
                Ok(())
            }
            None => Err(error),
        }
    }

    pub fn diagnostics(&self) -> &SkipDiagnostics {
        &self.diagnostics
    }

    /// Hand over the rows, failing when not a single lap of the season was usable
    pub fn finish(self, season: u16) -> Result<(Vec<R>, SkipDiagnostics), PitwallError> {
        info!(
            "{} {}: {} rows, {}",
            season,
            self.dataset.cache_name(),
            self.rows.len(),
            self.diagnostics
        );
        if self.diagnostics.usable_laps == 0 {
            return Err(PitwallError::NoUsableLaps {
                season,
                dataset: self.dataset.cache_name().to_string(),
            });
        }
        Ok((self.rows, self.diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_are_counted_per_reason() {
        let mut collector: RecordCollector<u32> = RecordCollector::new(Dataset::Launches);
        collector
            .skip(
                PitwallError::InsufficientSamples {
                    required: 7,
                    actual: 3,
                },
                "lap 1",
            )
            .unwrap();
        collector
            .skip(
                PitwallError::ProviderUnavailable {
                    unit: "lap 2".to_string(),
                    reason: "timeout".to_string(),
                },
                "lap 2",
            )
            .unwrap();
        collector
            .skip(
                PitwallError::InsufficientSamples {
                    required: 7,
                    actual: 1,
                },
                "lap 3",
            )
            .unwrap();

        let diagnostics = collector.diagnostics();
        assert_eq!(diagnostics.count(SkipReason::InsufficientSamples), 2);
        assert_eq!(diagnostics.count(SkipReason::ProviderUnavailable), 1);
        assert_eq!(diagnostics.count(SkipReason::TrackUnavailable), 0);
        assert_eq!(diagnostics.total_skipped(), 3);
    }

    #[test]
    fn test_configuration_errors_are_fatal() {
        let mut collector: RecordCollector<u32> = RecordCollector::new(Dataset::Upshifts);
        let result = collector.skip(
            PitwallError::InvalidSmoothingWindow {
                reason: "even".to_string(),
            },
            "lap 1",
        );
        assert!(matches!(
            result,
            Err(PitwallError::InvalidSmoothingWindow { .. })
        ));
        assert_eq!(collector.diagnostics().total_skipped(), 0);
    }

    #[test]
    fn test_finish_requires_a_usable_lap() {
        let mut collector: RecordCollector<u32> = RecordCollector::new(Dataset::DrsActivations);
        collector.extend([1, 2]);
        assert!(matches!(
            collector.finish(2021),
            Err(PitwallError::NoUsableLaps { season: 2021, .. })
        ));

        let mut collector: RecordCollector<u32> = RecordCollector::new(Dataset::DrsActivations);
        collector.lap_used();
        // a usable lap without events is an empty dataset, not a failure
        let (rows, diagnostics) = collector.finish(2021).unwrap();
        assert!(rows.is_empty());
        assert_eq!(diagnostics.usable_laps, 1);
    }
}
