use log::trace;

use crate::PitwallError;
use crate::telemetry::{NormalizedLap, NormalizedSample, TrackPosition};
use crate::track::types::{ReferenceTrack, TrackSectionTable};

/// Places samples on a reference track and, when the circuit has named sections, labels
/// them with the section they fall into.
#[derive(Clone, Copy, Debug)]
pub struct TrackLocator<'t> {
    track: &'t ReferenceTrack,
    sections: Option<&'t TrackSectionTable>,
}

impl<'t> TrackLocator<'t> {
    pub fn new(track: &'t ReferenceTrack, sections: Option<&'t TrackSectionTable>) -> Self {
        Self { track, sections }
    }

    pub fn track(&self) -> &ReferenceTrack {
        self.track
    }

    /// Nearest reference point to (x, y) as location and percentage of lap completed
    pub fn position(&self, x: f64, y: f64) -> Result<TrackPosition, PitwallError> {
        let location = self
            .track
            .nearest(x, y)
            .ok_or_else(|| PitwallError::TrackUnavailable {
                track_id: self.track.track_id.clone(),
            })?;
        let percentage_completed = location as f64 / self.track.len() as f64 * 100.;
        let section = self
            .sections
            .map(|sections| sections.classify(percentage_completed).to_string())
            .unwrap_or_default();

        Ok(TrackPosition {
            location,
            percentage_completed,
            section,
        })
    }

    /// Attach a track position to every sample of the lap
    pub fn locate(&self, lap: NormalizedLap) -> Result<NormalizedLap, PitwallError> {
        let positions = lap
            .samples()
            .iter()
            .map(|sample| self.position(sample.x, sample.y))
            .collect::<Result<Vec<_>, _>>()?;
        trace!(
            "Located {} samples on {}",
            positions.len(),
            self.track.track_id
        );
        Ok(lap.with_positions(positions))
    }
}

/// Time spent in each named section of a located lap, in order of first appearance.
///
/// A section entered more than once (e.g. the final straight wrapping over the line)
/// accumulates the time of every visit. Samples that were never located count as the
/// unclassified section.
pub fn section_times(lap: &NormalizedLap) -> Vec<(String, f64)> {
    let samples = lap.samples();
    let mut times: Vec<(String, f64)> = Vec::new();
    let mut start = 0;
    while start < samples.len() {
        let section = section_of(&samples[start]);
        let end = samples[start..]
            .iter()
            .position(|sample| section_of(sample) != section)
            .map_or(samples.len(), |run| start + run);
        let elapsed = samples[end - 1].time_s - samples[start].time_s;
        match times.iter_mut().find(|(name, _)| name == section) {
            Some((_, total)) => *total += elapsed,
            None => times.push((section.to_string(), elapsed)),
        }
        start = end;
    }
    times
}

fn section_of(sample: &NormalizedSample) -> &str {
    sample
        .position
        .as_ref()
        .map(|p| p.section.as_str())
        .unwrap_or_default()
}
