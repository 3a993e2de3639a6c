use std::ops::Range;

use log::debug;

use super::{DrivingEvent, EventDetector};
use crate::PitwallError;
use crate::config::AnalysisConfig;
use crate::telemetry::{NormalizedLap, SavitzkyGolay, gradient};
use crate::track::TrackLocator;

/// Finds where the driver starts braking, from the deceleration of the car rather than the
/// brake pedal, and places it on the reference track
pub struct BrakingPointDetector<'t> {
    locator: TrackLocator<'t>,
    smoothing: SavitzkyGolay,
    /// Speed change per meter (km/h) below which the car is braking
    threshold: f64,
    /// Only crossings at these distances count, e.g. the approach to one corner
    search_window: Option<Range<u32>>,
}

impl<'t> BrakingPointDetector<'t> {
    pub fn new(locator: TrackLocator<'t>, analysis: &AnalysisConfig) -> Self {
        Self {
            locator,
            smoothing: analysis.braking_smoothing,
            threshold: analysis.braking_threshold,
            search_window: analysis.braking_search_window.clone(),
        }
    }

    /// Smoothed speed change per meter
    pub fn acceleration(&self, lap: &NormalizedLap) -> Result<Vec<f64>, PitwallError> {
        self.smoothing.smooth(&gradient(&lap.speeds())?)
    }
}

impl EventDetector for BrakingPointDetector<'_> {
    fn detect(&mut self, lap: &NormalizedLap) -> Result<Vec<DrivingEvent>, PitwallError> {
        let samples = lap.samples();
        let acceleration = self.acceleration(lap)?;

        let in_window = |distance: u32| {
            self.search_window
                .as_ref()
                .is_none_or(|window| window.contains(&distance))
        };
        let braking_start = (1..samples.len()).find(|&i| {
            acceleration[i - 1] >= self.threshold
                && acceleration[i] < self.threshold
                && in_window(samples[i].distance)
        });
        let Some(index) = braking_start else {
            debug!("No braking point found");
            return Ok(Vec::new());
        };

        let sample = &samples[index];
        let position = self.locator.position(sample.x, sample.y)?;
        let point = self.locator.track().points[position.location];
        Ok(vec![DrivingEvent::BrakingPoint {
            location: position.location,
            percentage_completed: position.percentage_completed,
            from_speed_kph: sample.speed_kph,
            distance: sample.distance,
            x: point.x,
            y: point.y,
        }])
    }
}
