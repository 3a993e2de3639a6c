// Detectors that turn one normalized lap into discrete driving events

pub mod braking;
pub mod downshift;
pub mod drs;
pub mod gearshift;
pub mod launch;
pub mod upshift;

use serde::{Deserialize, Serialize};

use crate::PitwallError;
use crate::telemetry::NormalizedLap;

pub use braking::BrakingPointDetector;
pub use downshift::DownshiftDetector;
pub use drs::DrsActivationDetector;
pub use gearshift::{GearshiftDetector, ShiftDirection};
pub use launch::LaunchDetector;
pub use upshift::UpshiftDetector;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum DrivingEvent {
    /// Standing start from distance 0 to 200 km/h
    Launch {
        /// Seconds to 200 km/h minus the reaction time
        time_s: f64,
        /// Gear engaged on the grid
        gear: i32,
        /// The car braked before reaching 200 km/h and the rest was extrapolated
        is_interpolated: bool,
    },
    Upshift {
        to_gear: i32,
        /// Peak RPM just before the new gear registered
        rpm: f64,
    },
    Gearshift {
        direction: ShiftDirection,
        to_gear: i32,
        at_speed_kph: f64,
        /// Seconds since the car passed distance 0
        time_s: f64,
        distance: u32,
    },
    DownshiftRate {
        from_gear: i32,
        to_gear: i32,
        /// Average seconds per downshift within one braking zone
        time_taken_s: f64,
    },
    DrsActivations {
        count: u32,
    },
    BrakingPoint {
        location: usize,
        percentage_completed: f64,
        from_speed_kph: f64,
        distance: u32,
        /// Coordinates of the matched reference track point
        x: f64,
        y: f64,
    },
}

/// A single forward scan over a normalized lap.
///
/// Finding nothing is an empty result. Errors are reserved for laps the detector cannot
/// judge, and for events that were found but failed a plausibility check.
pub trait EventDetector {
    fn detect(&mut self, lap: &NormalizedLap) -> Result<Vec<DrivingEvent>, PitwallError>;
}

#[cfg(test)]
pub(crate) mod test_laps {
    use crate::telemetry::{NormalizedLap, NormalizedSample};

    /// Straight lap with one sample per meter, channels filled by the callbacks
    pub(crate) fn lap_from<F>(length: u32, mut fill: F) -> NormalizedLap
    where
        F: FnMut(u32, &mut NormalizedSample),
    {
        NormalizedLap::from_samples(
            (0..length)
                .map(|d| {
                    let mut sample = NormalizedSample {
                        distance: d,
                        time_s: d as f64 * 0.02,
                        speed_kph: 180.,
                        rpm: 10500.,
                        gear: 6,
                        throttle_pct: 100.,
                        x: d as f64,
                        ..Default::default()
                    };
                    fill(d, &mut sample);
                    sample
                })
                .collect(),
        )
    }

    /// Lap built from explicit channel values, one sample per entry
    pub(crate) fn lap_with_channels(
        gears: &[i32],
        rpms: &[f64],
        throttles: &[f64],
    ) -> NormalizedLap {
        lap_from(gears.len() as u32, |d, sample| {
            let i = d as usize;
            sample.gear = gears[i];
            sample.rpm = rpms[i];
            sample.throttle_pct = throttles[i];
        })
    }
}
