use log::debug;

use super::{DrivingEvent, EventDetector};
use crate::PitwallError;
use crate::telemetry::NormalizedLap;

const TARGET_SPEED_KPH: f64 = 200.;
/// Braking above this speed means the driver is already lining up turn 1
const BRAKING_SPEED_KPH: f64 = 150.;
const MIN_PLAUSIBLE_S: f64 = 4.;
const MAX_PLAUSIBLE_S: f64 = 6.5;
/// Median human reaction time to the start lights
const REACTION_TIME_S: f64 = 0.33;

/// Times a standing start from distance 0 to 200 km/h
#[derive(Default)]
pub struct LaunchDetector;

impl EventDetector for LaunchDetector {
    fn detect(&mut self, lap: &NormalizedLap) -> Result<Vec<DrivingEvent>, PitwallError> {
        let samples = lap.samples();
        let Some(start) = samples.first() else {
            return Ok(Vec::new());
        };

        let launch_end = samples.iter().find_map(|sample| {
            if sample.speed_kph >= TARGET_SPEED_KPH {
                Some((sample, false))
            } else if sample.speed_kph > BRAKING_SPEED_KPH && sample.is_braking() {
                Some((sample, true))
            } else {
                None
            }
        });
        let Some((end, is_interpolated)) = launch_end else {
            debug!("Launch never reached {} km/h", TARGET_SPEED_KPH);
            return Ok(Vec::new());
        };

        let mut time_taken = end.time_s - start.time_s;
        if is_interpolated && end.speed_kph > 0. {
            time_taken += (TARGET_SPEED_KPH - end.speed_kph) * (time_taken / end.speed_kph);
        }

        // judged on the time to the sample that ended the launch, before the overshoot
        // correction
        if !(MIN_PLAUSIBLE_S..=MAX_PLAUSIBLE_S).contains(&time_taken) {
            return Err(PitwallError::ImplausibleEventDuration {
                seconds: time_taken,
                min: MIN_PLAUSIBLE_S,
                max: MAX_PLAUSIBLE_S,
            });
        }

        // overshoot between two samples
        if end.speed_kph > TARGET_SPEED_KPH {
            time_taken *= TARGET_SPEED_KPH / end.speed_kph;
        }

        Ok(vec![DrivingEvent::Launch {
            time_s: (time_taken * 1000.).round() / 1000. - REACTION_TIME_S,
            gear: start.gear,
            is_interpolated,
        }])
    }
}
