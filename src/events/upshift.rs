use itertools::Itertools;

use super::{DrivingEvent, EventDetector};
use crate::PitwallError;
use crate::telemetry::NormalizedLap;

/// Only shifts at full throttle are comparable between drivers
const FULL_THROTTLE_PCT: f64 = 95.;
/// RPM drops the moment the new gear registers, so the peak is taken from the samples
/// leading up to the shift
const RPM_LOOKBACK_SAMPLES: usize = 5;

/// Finds full-throttle upshifts and the RPM they were taken at
#[derive(Default)]
pub struct UpshiftDetector;

impl EventDetector for UpshiftDetector {
    fn detect(&mut self, lap: &NormalizedLap) -> Result<Vec<DrivingEvent>, PitwallError> {
        let full_throttle: Vec<_> = lap
            .samples()
            .iter()
            .enumerate()
            .filter(|(_, sample)| sample.throttle_pct > FULL_THROTTLE_PCT)
            .collect();

        let events = full_throttle
            .iter()
            .enumerate()
            .tuple_windows()
            .filter(|((_, (_, prev)), (_, (_, cur)))| cur.gear > prev.gear)
            .map(|(_, (pos, (index, cur)))| {
                let lookback = index.saturating_sub(RPM_LOOKBACK_SAMPLES);
                // retained indices are strictly increasing, the window ends within the
                // last few retained samples
                let rpm = full_throttle[pos.saturating_sub(RPM_LOOKBACK_SAMPLES)..=pos]
                    .iter()
                    .filter(|(i, _)| *i >= lookback)
                    .map(|(_, sample)| sample.rpm)
                    .fold(f64::NEG_INFINITY, f64::max);
                DrivingEvent::Upshift {
                    to_gear: cur.gear,
                    rpm,
                }
            })
            .collect();
        Ok(events)
    }
}
