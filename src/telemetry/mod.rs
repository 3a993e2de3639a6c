pub mod interpolation;
pub mod provider;
pub mod resampler;
pub mod smoothing;

use std::fmt;

use serde::{Deserialize, Serialize};
use uom::si::{
    f64::{Length, Time, Velocity},
    length::meter,
    time::second,
    velocity::kilometer_per_hour,
};

pub use provider::{
    JsonlTelemetryProvider, SessionKey, SessionKind, TelemetryOutput, TelemetryProvider,
};
pub use resampler::DistanceResampler;
pub use smoothing::{SavitzkyGolay, gradient};

/// One timestamped measurement as delivered by the telemetry provider.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RawSample {
    /// Seconds elapsed since the start of the lap
    pub time_s: f64,
    /// Meters traveled from S/F this lap. Providers without a distance channel leave it
    /// out and it is integrated from speed.
    #[serde(default)]
    pub distance_m: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Speed in km/h
    pub speed_kph: f64,
    /// Throttle use, 0 to 100
    pub throttle_pct: f64,
    pub brake: bool,
    pub gear: i32,
    pub rpm: f64,
    /// Raw DRS state code, 14 means fully open
    pub drs: u8,
}

impl Default for RawSample {
    fn default() -> Self {
        Self {
            time_s: 0.,
            distance_m: 0.,
            x: 0.,
            y: 0.,
            z: 0.,
            speed_kph: 0.,
            throttle_pct: 0.,
            brake: false,
            gear: 0,
            rpm: 0.,
            drs: 0,
        }
    }
}

/// Fill the distance channel by integrating speed over time, for providers that only
/// deliver car data without a distance channel.
pub fn integrate_distance(samples: &mut [RawSample]) {
    let mut traveled = Length::new::<meter>(0.);
    let mut prev: Option<(f64, f64)> = None;
    for sample in samples.iter_mut() {
        if let Some((prev_time_s, prev_speed_kph)) = prev {
            let dt = Time::new::<second>(sample.time_s - prev_time_s);
            let speed =
                Velocity::new::<kilometer_per_hour>((prev_speed_kph + sample.speed_kph) / 2.);
            traveled += speed * dt;
        }
        sample.distance_m = traveled.get::<meter>();
        prev = Some((sample.time_s, sample.speed_kph));
    }
}

/// Tire compound as reported by the provider
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Compound {
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Compound::Soft => "SOFT",
            Compound::Medium => "MEDIUM",
            Compound::Hard => "HARD",
            Compound::Intermediate => "INTERMEDIATE",
            Compound::Wet => "WET",
            Compound::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Lap metadata delivered alongside the samples
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LapInfo {
    pub driver: String,
    pub lap_number: u32,
    pub compound: Compound,
    /// Lap time in seconds, missing for in/out laps and deleted laps
    pub lap_time_s: Option<f64>,
    pub is_accurate: bool,
}

impl LapInfo {
    pub fn is_timed(&self) -> bool {
        self.lap_time_s.is_some()
    }
}

/// Where a normalized sample sits on the circuit's reference track
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackPosition {
    /// Index of the closest reference track point
    pub location: usize,
    pub percentage_completed: f64,
    /// Section name, empty before the first section breakpoint
    pub section: String,
}

/// A sample on the uniform distance grid
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedSample {
    /// Integer meters from S/F
    pub distance: u32,
    /// Seconds since the car passed distance 0
    pub time_s: f64,
    pub speed_kph: f64,
    pub rpm: f64,
    pub gear: i32,
    pub throttle_pct: f64,
    /// Interpolated brake flag, 0 to 1
    pub brake: f64,
    pub drs: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub position: Option<TrackPosition>,
}

impl NormalizedSample {
    pub fn is_braking(&self) -> bool {
        self.brake > 0.
    }
}

/// A lap resampled onto integer meters 0..D-1
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedLap {
    samples: Vec<NormalizedSample>,
}

impl NormalizedLap {
    pub fn from_samples(samples: Vec<NormalizedSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[NormalizedSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn speeds(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.speed_kph).collect()
    }

    /// Consume the lap and attach one track position per sample
    pub fn with_positions(self, positions: Vec<TrackPosition>) -> Self {
        let samples = self
            .samples
            .into_iter()
            .zip(positions)
            .map(|(sample, position)| NormalizedSample {
                position: Some(position),
                ..sample
            })
            .collect();
        Self { samples }
    }

    /// Express the lap as raw samples again, e.g. to feed it back through the resampler
    pub fn to_raw_samples(&self) -> Vec<RawSample> {
        self.samples
            .iter()
            .map(|s| RawSample {
                time_s: s.time_s,
                distance_m: s.distance as f64,
                x: s.x,
                y: s.y,
                z: s.z,
                speed_kph: s.speed_kph,
                throttle_pct: s.throttle_pct,
                brake: s.is_braking(),
                gear: s.gear,
                rpm: s.rpm,
                drs: s.drs.round().clamp(0., u8::MAX as f64) as u8,
            })
            .collect()
    }
}
