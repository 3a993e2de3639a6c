use itertools::Itertools;

use super::{DrivingEvent, EventDetector};
use crate::PitwallError;
use crate::telemetry::NormalizedLap;

/// DRS state code of a fully open flap
pub const DRS_OPEN: f64 = 14.;

/// Counts how often the DRS flap opens during a lap
#[derive(Default)]
pub struct DrsActivationDetector;

impl EventDetector for DrsActivationDetector {
    fn detect(&mut self, lap: &NormalizedLap) -> Result<Vec<DrivingEvent>, PitwallError> {
        let count = lap
            .samples()
            .iter()
            .tuple_windows()
            .filter(|(prev, cur)| {
                (cur.drs - DRS_OPEN).abs() < f64::EPSILON && cur.drs > prev.drs
            })
            .count() as u32;

        if count == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![DrivingEvent::DrsActivations { count }])
    }
}
