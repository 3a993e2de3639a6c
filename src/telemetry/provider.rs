use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{LapInfo, RawSample, integrate_distance};
use crate::PitwallError;

/// Kind of on-track session within a meeting
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Qualifying,
    Race,
    /// One day of a testing meeting
    Testing { day: u8 },
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Qualifying => f.write_str("Qualifying"),
            SessionKind::Race => f.write_str("Race"),
            SessionKind::Testing { day } => write!(f, "Testing Day {day}"),
        }
    }
}

/// Identifies one session of one meeting of a season
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub season: u16,
    pub meeting: String,
    pub kind: SessionKind,
}

impl SessionKey {
    pub fn new(season: u16, meeting: &str, kind: SessionKind) -> Self {
        Self {
            season,
            meeting: meeting.to_string(),
            kind,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.season, self.meeting, self.kind)
    }
}

/// Source of raw session and lap telemetry. Every call may fail for a single lap or
/// session; callers skip the unit and continue.
pub trait TelemetryProvider {
    /// Meetings of the season in calendar order
    fn meetings(&self, season: u16) -> Result<Vec<String>, PitwallError>;

    /// All laps of a session, for every driver
    fn laps(&self, session: &SessionKey) -> Result<Vec<LapInfo>, PitwallError>;

    /// Raw samples of one lap
    fn lap_telemetry(
        &self,
        session: &SessionKey,
        lap: &LapInfo,
    ) -> Result<Vec<RawSample>, PitwallError>;
}

/// Line format of a recorded session: a `Lap` line followed by that lap's `Sample` lines
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TelemetryOutput {
    Lap(LapInfo),
    Sample(Box<RawSample>),
}

#[derive(Default, Debug)]
struct RecordedLap {
    info: Option<LapInfo>,
    samples: Vec<RawSample>,
}

impl RecordedLap {
    /// Recordings of car data only carry no distance, every sample reads 0 m
    fn fill_missing_distance(mut self) -> Self {
        if self.samples.len() > 1 && self.samples.iter().all(|s| s.distance_m == 0.) {
            debug!("Integrating distance of {} samples", self.samples.len());
            integrate_distance(&mut self.samples);
        }
        self
    }
}

/// Replays sessions recorded as JSON Lines under
/// `<data_dir>/<season>/<meeting>/<session>.jsonl`.
pub struct JsonlTelemetryProvider {
    data_dir: PathBuf,
    loaded: RefCell<HashMap<SessionKey, Rc<Vec<RecordedLap>>>>,
}

impl JsonlTelemetryProvider {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            loaded: RefCell::new(HashMap::new()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn session_path(&self, session: &SessionKey) -> PathBuf {
        self.data_dir
            .join(session.season.to_string())
            .join(&session.meeting)
            .join(format!("{}.jsonl", session.kind))
    }

    fn load_session(&self, session: &SessionKey) -> Result<Rc<Vec<RecordedLap>>, PitwallError> {
        if let Some(laps) = self.loaded.borrow().get(session) {
            return Ok(Rc::clone(laps));
        }

        let path = self.session_path(session);
        let unavailable = |reason: String| PitwallError::ProviderUnavailable {
            unit: session.to_string(),
            reason,
        };
        if !path.exists() {
            return Err(unavailable(format!("{:?} does not exist", path)));
        }

        let lines = serde_jsonlines::json_lines(&path)
            .map_err(|e| unavailable(e.to_string()))?
            .collect::<Result<Vec<TelemetryOutput>, std::io::Error>>()
            .map_err(|e| unavailable(e.to_string()))?;

        let mut laps = Vec::new();
        let mut cur_lap = RecordedLap::default();
        for line in lines {
            match line {
                TelemetryOutput::Lap(info) => {
                    if cur_lap.info.is_some() {
                        laps.push(cur_lap.fill_missing_distance());
                    } else if !cur_lap.samples.is_empty() {
                        warn!(
                            "Dropping {} samples without lap header in {:?}",
                            cur_lap.samples.len(),
                            path
                        );
                    }
                    cur_lap = RecordedLap {
                        info: Some(info),
                        samples: Vec::new(),
                    };
                }
                TelemetryOutput::Sample(sample) => cur_lap.samples.push(*sample),
            }
        }
        if cur_lap.info.is_some() {
            laps.push(cur_lap.fill_missing_distance());
        }
        info!("Loaded {:?}, found {} laps", path, laps.len());

        let laps = Rc::new(laps);
        self.loaded
            .borrow_mut()
            .insert(session.clone(), Rc::clone(&laps));
        Ok(laps)
    }
}

impl TelemetryProvider for JsonlTelemetryProvider {
    fn meetings(&self, season: u16) -> Result<Vec<String>, PitwallError> {
        let season_dir = self.data_dir.join(season.to_string());
        let entries = fs::read_dir(&season_dir).map_err(|e| PitwallError::ProviderUnavailable {
            unit: format!("season {season}"),
            reason: e.to_string(),
        })?;

        let mut meetings = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    meetings.push(name.to_string());
                }
            }
        }

        // meeting folders are expected to carry a round prefix, e.g. "01 Bahrain Grand Prix"
        meetings.sort();
        debug!("Season {} has {} meetings", season, meetings.len());
        Ok(meetings)
    }

    fn laps(&self, session: &SessionKey) -> Result<Vec<LapInfo>, PitwallError> {
        Ok(self
            .load_session(session)?
            .iter()
            .filter_map(|lap| lap.info.clone())
            .collect())
    }

    fn lap_telemetry(
        &self,
        session: &SessionKey,
        lap: &LapInfo,
    ) -> Result<Vec<RawSample>, PitwallError> {
        let laps = self.load_session(session)?;
        laps.iter()
            .find(|recorded| {
                recorded.info.as_ref().is_some_and(|info| {
                    info.driver == lap.driver && info.lap_number == lap.lap_number
                })
            })
            .filter(|recorded| !recorded.samples.is_empty())
            .map(|recorded| recorded.samples.clone())
            .ok_or_else(|| PitwallError::ProviderUnavailable {
                unit: format!("{} {} lap {}", session, lap.driver, lap.lap_number),
                reason: "no telemetry recorded for lap".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Compound;
    use std::io::Write;
    use tempfile::TempDir;

    fn lap_info(driver: &str, lap_number: u32) -> LapInfo {
        LapInfo {
            driver: driver.to_string(),
            lap_number,
            compound: Compound::Soft,
            lap_time_s: Some(90.),
            is_accurate: true,
        }
    }

    fn write_session(dir: &TempDir, session: &SessionKey, lines: &[TelemetryOutput]) {
        let provider = JsonlTelemetryProvider::new(dir.path().to_path_buf());
        let path = provider.session_path(session);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = fs::File::create(path).unwrap();
        for line in lines {
            writeln!(file, "{}", serde_json::to_string(line).unwrap()).unwrap();
        }
    }

    #[test]
    fn test_session_file_is_grouped_into_laps() {
        let dir = TempDir::new().unwrap();
        let session = SessionKey::new(2021, "01 Bahrain Grand Prix", SessionKind::Race);
        write_session(
            &dir,
            &session,
            &[
                TelemetryOutput::Lap(lap_info("VER", 1)),
                TelemetryOutput::Sample(Box::default()),
                TelemetryOutput::Sample(Box::default()),
                TelemetryOutput::Lap(lap_info("HAM", 1)),
                TelemetryOutput::Sample(Box::default()),
                TelemetryOutput::Lap(lap_info("VER", 2)),
            ],
        );

        let provider = JsonlTelemetryProvider::new(dir.path().to_path_buf());
        let laps = provider.laps(&session).unwrap();
        assert_eq!(laps.len(), 3);
        assert_eq!(provider.lap_telemetry(&session, &laps[0]).unwrap().len(), 2);
        assert_eq!(provider.lap_telemetry(&session, &laps[1]).unwrap().len(), 1);
        // a lap without samples is unavailable rather than empty
        assert!(matches!(
            provider.lap_telemetry(&session, &laps[2]),
            Err(PitwallError::ProviderUnavailable { .. })
        ));
        assert_eq!(
            provider.meetings(2021).unwrap(),
            vec!["01 Bahrain Grand Prix".to_string()]
        );
    }

    #[test]
    fn test_missing_distance_channel_is_integrated() {
        let dir = TempDir::new().unwrap();
        let testing = SessionKind::Testing { day: 2 };
        let session = SessionKey::new(2021, "00 Pre-Season Testing", testing);
        let provider = JsonlTelemetryProvider::new(dir.path().to_path_buf());
        let path = provider.session_path(&session);
        assert!(path.ends_with("2021/00 Pre-Season Testing/Testing Day 2.jsonl"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "{}", serde_json::json!({"Lap": lap_info("ALO", 7)})).unwrap();
        for i in 0..11 {
            let sample = serde_json::json!({"Sample": {
                "time_s": i as f64 * 0.1,
                "x": 0.0, "y": 0.0, "z": 0.0,
                "speed_kph": 36.0,
                "throttle_pct": 100.0,
                "brake": false,
                "gear": 3,
                "rpm": 10000.0,
                "drs": 0
            }});
            writeln!(file, "{sample}").unwrap();
        }
        drop(file);

        let laps = provider.laps(&session).unwrap();
        let samples = provider.lap_telemetry(&session, &laps[0]).unwrap();
        assert_eq!(samples[0].distance_m, 0.);
        // 10 m/s for one second
        assert!((samples[10].distance_m - 10.).abs() < 1e-9);
    }

    #[test]
    fn test_missing_session_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let provider = JsonlTelemetryProvider::new(dir.path().to_path_buf());
        let session = SessionKey::new(2021, "Nowhere", SessionKind::Qualifying);
        assert!(matches!(
            provider.laps(&session),
            Err(PitwallError::ProviderUnavailable { .. })
        ));
        assert!(provider.meetings(1950).is_err());
    }
}
