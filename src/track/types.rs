// Core data structures for circuit reference tracks and their named sections

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::PitwallError;
use crate::telemetry::NormalizedLap;
use crate::telemetry::interpolation::LinearInterpolator;

/// One point of a reference track
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct TrackPoint {
    /// Fraction of the lap completed at this point (0.0-1.0)
    pub fraction: f64,
    pub x: f64,
    pub y: f64,
}

/// Polyline of a circuit sampled at roughly one point per meter, built from one
/// representative lap
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReferenceTrack {
    /// Unique track identifier for storage and lookup, e.g. "BahrainGP_2021"
    pub track_id: String,
    pub season: u16,
    pub meeting: String,
    pub points: Vec<TrackPoint>,
    /// Timestamp when the track was built
    pub created_at: SystemTime,
    /// Version number for format compatibility
    pub version: u32,
}

impl ReferenceTrack {
    /// Identifier of the track driven at a meeting in a season
    pub fn track_id(season: u16, meeting: &str) -> String {
        format!(
            "{}_{}",
            meeting.replace("Grand Prix", "GP").replace(' ', ""),
            season
        )
    }

    /// Build the reference polyline from the x/y trace of a normalized lap.
    ///
    /// The trace is re-parametrised by the fraction of arc length covered and sampled at
    /// one point per normalized sample.
    pub fn from_lap(season: u16, meeting: &str, lap: &NormalizedLap) -> Result<Self, PitwallError> {
        let samples = lap.samples();
        if samples.len() < 2 {
            return Err(PitwallError::InvalidLapGeometry {
                reason: format!("{} samples are not enough for a track", samples.len()),
            });
        }

        let mut arc_length = Vec::with_capacity(samples.len());
        let mut traveled = 0.;
        for (i, sample) in samples.iter().enumerate() {
            if i > 0 {
                let prev = &samples[i - 1];
                traveled += (sample.x - prev.x).hypot(sample.y - prev.y);
            }
            arc_length.push(traveled);
        }
        if !(traveled > 0.) {
            return Err(PitwallError::InvalidLapGeometry {
                reason: "position trace does not move".to_string(),
            });
        }

        let fractions: Vec<f64> = arc_length.iter().map(|d| d / traveled).collect();
        let xs: Vec<f64> = samples.iter().map(|s| s.x).collect();
        let ys: Vec<f64> = samples.iter().map(|s| s.y).collect();
        let fx = LinearInterpolator::new(&fractions, &xs)?;
        let fy = LinearInterpolator::new(&fractions, &ys)?;

        let resolution = samples.len();
        let points = (0..resolution)
            .map(|i| {
                let fraction = i as f64 / (resolution - 1) as f64;
                TrackPoint {
                    fraction,
                    x: fx.evaluate(fraction),
                    y: fy.evaluate(fraction),
                }
            })
            .collect();

        Ok(Self {
            track_id: Self::track_id(season, meeting),
            season,
            meeting: meeting.to_string(),
            points,
            created_at: SystemTime::now(),
            version: 1,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the reference point closest to (x, y)
    pub fn nearest(&self, x: f64, y: f64) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, (p.x - x).powi(2) + (p.y - y).powi(2)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Validate that fractions run strictly upwards from 0 to 1 over finite coordinates
    pub fn validate(&self) -> Result<(), String> {
        if self.points.len() < 2 {
            return Err(format!("Track has only {} points", self.points.len()));
        }
        if self
            .points
            .iter()
            .any(|p| !p.x.is_finite() || !p.y.is_finite() || !p.fraction.is_finite())
        {
            return Err("Track contains non-finite coordinates".to_string());
        }
        if let Some(window) = self
            .points
            .windows(2)
            .find(|w| w[1].fraction <= w[0].fraction)
        {
            return Err(format!(
                "Fraction does not increase from {} to {}",
                window[0].fraction, window[1].fraction
            ));
        }
        let first = self.points[0].fraction;
        let last = self.points[self.points.len() - 1].fraction;
        if first.abs() > 1e-9 || (last - 1.).abs() > 1e-9 {
            return Err(format!("Fractions span [{first}, {last}] instead of [0, 1]"));
        }
        Ok(())
    }
}

/// Step function from percentage of lap completed to section name
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "Vec<(f64, String)>", into = "Vec<(f64, String)>")]
pub struct TrackSectionTable {
    breakpoints: Vec<(f64, String)>,
}

impl TrackSectionTable {
    /// Create a section table, breakpoints must be finite and strictly ascending
    pub fn new(breakpoints: Vec<(f64, String)>) -> Result<Self, PitwallError> {
        if let Some((percentage, name)) = breakpoints.iter().find(|(p, _)| !p.is_finite()) {
            return Err(PitwallError::TrackSectionError {
                reason: format!("section {name} starts at {percentage}"),
            });
        }
        if let Some(window) = breakpoints.windows(2).find(|w| w[1].0 <= w[0].0) {
            return Err(PitwallError::TrackSectionError {
                reason: format!(
                    "section {} at {} does not come after {} at {}",
                    window[1].1, window[1].0, window[0].1, window[0].0
                ),
            });
        }
        Ok(Self { breakpoints })
    }

    /// Name of the section a percentage falls into, empty before the first breakpoint.
    /// A percentage exactly on a breakpoint belongs to the section it introduces.
    pub fn classify(&self, percentage: f64) -> &str {
        let after = self.breakpoints.partition_point(|(p, _)| *p <= percentage);
        match after {
            0 => "",
            _ => &self.breakpoints[after - 1].1,
        }
    }

    pub fn breakpoints(&self) -> &[(f64, String)] {
        &self.breakpoints
    }
}

impl TryFrom<Vec<(f64, String)>> for TrackSectionTable {
    type Error = PitwallError;

    fn try_from(value: Vec<(f64, String)>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TrackSectionTable> for Vec<(f64, String)> {
    fn from(value: TrackSectionTable) -> Self {
        value.breakpoints
    }
}
