use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::PitwallError;
use crate::telemetry::{Compound, SavitzkyGolay};

const CONFIG_FILE_NAME: &str = "config.json";
const APP_DIR_NAME: &str = "pitwall";

/// Numeric knobs of the normalization and detection pipeline
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Smoothing applied to distance, time, speed, throttle and position before resampling
    pub resample_smoothing: SavitzkyGolay,
    /// Smoothing applied to the speed gradient when looking for braking points
    pub braking_smoothing: SavitzkyGolay,
    /// Speed change per meter (km/h) below which the car counts as braking
    pub braking_threshold: f64,
    /// Only look for the braking point at these lap distances, e.g. the approach to one
    /// corner. The whole lap when unset.
    pub braking_search_window: Option<Range<u32>>,
    /// Compounds considered when comparing launches and upshifts
    pub dry_compounds: Vec<Compound>,
    /// Laps slower than this factor of the driver's fastest lap are not representative
    pub quick_lap_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            resample_smoothing: SavitzkyGolay {
                window_length: 7,
                poly_order: 1,
            },
            braking_smoothing: SavitzkyGolay {
                window_length: 15,
                poly_order: 1,
            },
            braking_threshold: -0.1,
            braking_search_window: None,
            dry_compounds: vec![Compound::Soft, Compound::Medium, Compound::Hard],
            quick_lap_threshold: 1.03,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the recorded session files
    pub data_dir: Option<PathBuf>,
    /// Where season datasets and reference tracks are cached
    pub cache_dir: Option<PathBuf>,
    /// JSON file with the driver, team and circuit reference tables
    pub reference_tables: Option<PathBuf>,
    pub analysis: AnalysisConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            cache_dir: None,
            reference_tables: None,
            analysis: AnalysisConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Result<PathBuf, PitwallError> {
        Ok(dirs::config_dir()
            .ok_or(PitwallError::NoConfigDir)?
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    pub fn from_local_file() -> Result<Option<Self>, PitwallError> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::from_file(&config_path).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, PitwallError> {
        let file =
            std::fs::File::open(path).map_err(|e| PitwallError::ConfigIOError { source: e })?;
        serde_json::from_reader(file).map_err(|e| PitwallError::ConfigSerializeError { source: e })
    }

    pub fn save(&self, config_path: &Path) -> Result<(), PitwallError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PitwallError::ConfigIOError { source: e })?;
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| PitwallError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| PitwallError::ConfigSerializeError { source: e })
    }

    pub fn cache_dir(&self) -> Result<PathBuf, PitwallError> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::cache_dir()
                .ok_or(PitwallError::NoConfigDir)?
                .join(APP_DIR_NAME)),
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf, PitwallError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::data_dir()
                .ok_or(PitwallError::NoConfigDir)?
                .join(APP_DIR_NAME)
                .join("sessions")),
        }
    }
}
