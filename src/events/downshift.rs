use super::{DrivingEvent, EventDetector};
use crate::PitwallError;
use crate::telemetry::NormalizedLap;

/// Measures how quickly a driver works down the gearbox in each braking zone.
///
/// A braking zone starts wherever the throttle begins to close. Zones with fewer than
/// two downshifts are ignored.
#[derive(Default)]
pub struct DownshiftDetector;

impl DownshiftDetector {
    fn window_rate(lap: &NormalizedLap, downshifts: &[usize]) -> Option<DrivingEvent> {
        let samples = lap.samples();
        let (&first, &last) = (downshifts.first()?, downshifts.last()?);
        if downshifts.len() < 2 {
            return None;
        }

        Some(DrivingEvent::DownshiftRate {
            from_gear: samples[first - 1].gear,
            to_gear: samples[last].gear,
            time_taken_s: (samples[last].time_s - samples[first].time_s)
                / downshifts.len() as f64,
        })
    }
}

impl EventDetector for DownshiftDetector {
    fn detect(&mut self, lap: &NormalizedLap) -> Result<Vec<DrivingEvent>, PitwallError> {
        let samples = lap.samples();
        let mut events = Vec::new();
        let mut downshifts: Vec<usize> = Vec::new();

        for i in 1..samples.len() {
            let (prev, cur) = (&samples[i - 1], &samples[i]);
            if cur.throttle_pct < prev.throttle_pct {
                events.extend(Self::window_rate(lap, &downshifts));
                downshifts.clear();
            }
            if cur.gear < prev.gear {
                downshifts.push(i);
            }
        }
        events.extend(Self::window_rate(lap, &downshifts));

        Ok(events)
    }
}
