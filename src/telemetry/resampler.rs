use itertools::Itertools;
use log::debug;

use super::{
    NormalizedLap, NormalizedSample, RawSample, interpolation::LinearInterpolator,
    smoothing::SavitzkyGolay,
};
use crate::PitwallError;

/// Laps shorter than this are treated as a stationary car
const MIN_LAP_DISTANCE_M: f64 = 1.;
/// Longer than any circuit, rules out a runaway distance channel
const MAX_LAP_DISTANCE_M: f64 = 100_000.;

/// Converts a lap's time-indexed samples into one sample per meter of distance.
pub struct DistanceResampler {
    smoothing: SavitzkyGolay,
}

impl Default for DistanceResampler {
    fn default() -> Self {
        Self {
            smoothing: SavitzkyGolay {
                window_length: 7,
                poly_order: 1,
            },
        }
    }
}

impl DistanceResampler {
    pub fn new(smoothing: SavitzkyGolay) -> Self {
        Self { smoothing }
    }

    pub fn resample(&self, raw: &[RawSample]) -> Result<NormalizedLap, PitwallError> {
        if raw.len() < self.smoothing.window_length {
            return Err(PitwallError::InsufficientSamples {
                required: self.smoothing.window_length,
                actual: raw.len(),
            });
        }

        if let Some(sample) = raw.iter().find(|s| !s.distance_m.is_finite()) {
            return Err(PitwallError::InvalidLapGeometry {
                reason: format!("distance is {} at {:.3}s", sample.distance_m, sample.time_s),
            });
        }

        if let Some((prev, next)) = raw
            .iter()
            .tuple_windows()
            .find(|(prev, next)| next.distance_m < prev.distance_m)
        {
            return Err(PitwallError::InvalidLapGeometry {
                reason: format!(
                    "distance decreases from {:.2} to {:.2} at {:.3}s",
                    prev.distance_m, next.distance_m, next.time_s
                ),
            });
        }

        let final_distance = raw[raw.len() - 1].distance_m;
        if final_distance - raw[0].distance_m < MIN_LAP_DISTANCE_M {
            return Err(PitwallError::InvalidLapGeometry {
                reason: format!("lap covers only {:.2}m", final_distance - raw[0].distance_m),
            });
        }
        if final_distance > MAX_LAP_DISTANCE_M {
            return Err(PitwallError::InvalidLapGeometry {
                reason: format!("lap ends at {:.0}m", final_distance),
            });
        }

        let channel = |extract: fn(&RawSample) -> f64| raw.iter().map(extract).collect_vec();
        let smoothed = |extract: fn(&RawSample) -> f64| self.smoothing.smooth(&channel(extract));

        let distance = smoothed(|s| s.distance_m)?;
        let interpolant = |values: Vec<f64>| LinearInterpolator::new(&distance, &values);

        let time = interpolant(smoothed(|s| s.time_s)?)?;
        let speed = interpolant(smoothed(|s| s.speed_kph)?)?;
        let throttle = interpolant(smoothed(|s| s.throttle_pct)?)?;
        let x = interpolant(smoothed(|s| s.x)?)?;
        let y = interpolant(smoothed(|s| s.y)?)?;
        let z = interpolant(smoothed(|s| s.z)?)?;
        let rpm = interpolant(channel(|s| s.rpm))?;
        let gear = interpolant(channel(|s| s.gear as f64))?;
        let brake = interpolant(channel(|s| if s.brake { 1. } else { 0. }))?;
        let drs = interpolant(channel(|s| s.drs as f64))?;

        let lap_length = final_distance.floor() as u32;
        let time_offset = time.evaluate(0.);
        debug!(
            "Resampling {} raw samples onto {} meters",
            raw.len(),
            lap_length
        );

        let samples = (0..lap_length)
            .map(|meter| {
                let d = meter as f64;
                NormalizedSample {
                    distance: meter,
                    time_s: if meter == 0 {
                        0.
                    } else {
                        time.evaluate(d) - time_offset
                    },
                    speed_kph: speed.evaluate(d),
                    rpm: rpm.evaluate(d),
                    gear: gear.evaluate(d).round() as i32,
                    throttle_pct: throttle.evaluate(d),
                    brake: brake.evaluate(d),
                    drs: drs.evaluate(d),
                    x: x.evaluate(d),
                    y: y.evaluate(d),
                    z: z.evaluate(d),
                    position: None,
                }
            })
            .collect();

        Ok(NormalizedLap::from_samples(samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_speed_lap(samples: usize, speed_kph: f64, dt: f64) -> Vec<RawSample> {
        (0..samples)
            .map(|i| {
                let t = i as f64 * dt;
                let d = speed_kph / 3.6 * t;
                RawSample {
                    time_s: t,
                    distance_m: d,
                    x: d,
                    y: 0.,
                    speed_kph,
                    throttle_pct: 100.,
                    gear: 7,
                    rpm: 11000.,
                    ..Default::default()
                }
            })
            .collect()
    }

    #[test]
    fn test_uniform_distance_index() {
        let raw = constant_speed_lap(200, 180., 0.1);
        let final_distance = raw.last().unwrap().distance_m;
        let lap = DistanceResampler::default().resample(&raw).unwrap();

        assert_eq!(lap.len(), final_distance.floor() as usize);
        for (i, sample) in lap.samples().iter().enumerate() {
            assert_eq!(sample.distance as usize, i);
        }
    }

    #[test]
    fn test_time_anchored_at_zero() {
        let mut raw = constant_speed_lap(100, 180., 0.1);
        for sample in raw.iter_mut() {
            sample.time_s += 42.;
        }
        let lap = DistanceResampler::default().resample(&raw).unwrap();
        assert_eq!(lap.samples()[0].time_s, 0.);
        // 50 m/s, so 100 m takes two seconds
        assert!((lap.samples()[100].time_s - 2.).abs() < 1e-6);
    }

    #[test]
    fn test_gear_is_rounded() {
        let mut raw = constant_speed_lap(100, 180., 0.1);
        for (i, sample) in raw.iter_mut().enumerate() {
            sample.gear = if i < 50 { 4 } else { 5 };
        }
        let lap = DistanceResampler::default().resample(&raw).unwrap();
        assert!(lap.samples().iter().all(|s| s.gear == 4 || s.gear == 5));
        assert_eq!(lap.samples()[0].gear, 4);
        assert_eq!(lap.samples().last().unwrap().gear, 5);
    }

    #[test]
    fn test_rejects_decreasing_distance() {
        let mut raw = constant_speed_lap(100, 180., 0.1);
        raw[50].distance_m = 0.;
        assert!(matches!(
            DistanceResampler::default().resample(&raw),
            Err(PitwallError::InvalidLapGeometry { .. })
        ));
    }

    #[test]
    fn test_rejects_runaway_distance() {
        let mut raw = constant_speed_lap(100, 180., 0.1);
        raw[99].distance_m = f64::INFINITY;
        assert!(matches!(
            DistanceResampler::default().resample(&raw),
            Err(PitwallError::InvalidLapGeometry { .. })
        ));

        raw[99].distance_m = f64::NAN;
        assert!(matches!(
            DistanceResampler::default().resample(&raw),
            Err(PitwallError::InvalidLapGeometry { .. })
        ));

        raw[99].distance_m = 5e9;
        assert!(matches!(
            DistanceResampler::default().resample(&raw),
            Err(PitwallError::InvalidLapGeometry { .. })
        ));
    }

    #[test]
    fn test_rejects_stationary_lap() {
        let raw = constant_speed_lap(100, 0., 0.1);
        assert!(matches!(
            DistanceResampler::default().resample(&raw),
            Err(PitwallError::InvalidLapGeometry { .. })
        ));
    }

    #[test]
    fn test_rejects_short_lap() {
        let raw = constant_speed_lap(5, 180., 0.1);
        assert!(matches!(
            DistanceResampler::default().resample(&raw),
            Err(PitwallError::InsufficientSamples { .. })
        ));
    }
}
