use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{DrivingEvent, EventDetector};
use crate::PitwallError;
use crate::telemetry::NormalizedLap;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ShiftDirection {
    Up,
    Down,
}

/// Every gear change of a lap, whatever the throttle
#[derive(Default)]
pub struct GearshiftDetector;

impl EventDetector for GearshiftDetector {
    fn detect(&mut self, lap: &NormalizedLap) -> Result<Vec<DrivingEvent>, PitwallError> {
        let events = lap
            .samples()
            .iter()
            .tuple_windows()
            .filter(|(prev, cur)| cur.gear != prev.gear)
            .map(|(prev, cur)| DrivingEvent::Gearshift {
                direction: if cur.gear > prev.gear {
                    ShiftDirection::Up
                } else {
                    ShiftDirection::Down
                },
                to_gear: cur.gear,
                at_speed_kph: cur.speed_kph,
                time_s: cur.time_s,
                distance: cur.distance,
            })
            .collect();
        Ok(events)
    }
}
