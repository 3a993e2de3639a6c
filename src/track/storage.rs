// Storage implementation for reference track persistence

use crate::errors::PitwallError;
use crate::track::types::ReferenceTrack;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Trait defining the interface for reference track storage operations
pub trait ReferenceTrackStorage {
    /// Save a reference track to persistent storage
    fn save_track(&mut self, track: &ReferenceTrack) -> Result<(), PitwallError>;

    /// Load a reference track by id, `None` when it was never stored
    fn load_track(&self, track_id: &str) -> Result<Option<ReferenceTrack>, PitwallError>;

    /// List all track ids in storage
    fn list_available_tracks(&self) -> Result<Vec<String>, PitwallError>;

    fn delete_track(&mut self, track_id: &str) -> Result<(), PitwallError>;

    fn track_exists(&self, track_id: &str) -> Result<bool, PitwallError>;

    /// Delete every stored track of a season, returning how many were removed
    fn delete_season_tracks(&mut self, season: u16) -> Result<usize, PitwallError> {
        let suffix = format!("_{season}");
        let track_ids: Vec<String> = self
            .list_available_tracks()?
            .into_iter()
            .filter(|track_id| track_id.ends_with(&suffix))
            .collect();
        for track_id in &track_ids {
            info!("Deleting reference track {}", track_id);
            self.delete_track(track_id)?;
        }
        Ok(track_ids.len())
    }

    /// Return the stored track, building and storing it when it is missing or unreadable
    fn load_or_build<F>(
        &mut self,
        track_id: &str,
        build: F,
    ) -> Result<ReferenceTrack, PitwallError>
    where
        F: FnOnce() -> Result<ReferenceTrack, PitwallError>,
        Self: Sized,
    {
        match self.load_track(track_id) {
            Ok(Some(track)) => return Ok(track),
            Ok(None) => debug!("No stored reference track for {}", track_id),
            Err(PitwallError::CacheCorruption { path, reason }) => {
                warn!("Rebuilding reference track, {} is unreadable: {}", path, reason)
            }
            Err(e) => return Err(e),
        }

        let track = build()?;
        self.save_track(&track)?;
        Ok(track)
    }
}

/// File-based storage, one pretty-printed JSON file per track
pub struct FileBasedTrackStorage {
    /// Base directory for track files
    storage_path: PathBuf,
    /// In-memory cache of loaded tracks
    cache: HashMap<String, ReferenceTrack>,
}

impl FileBasedTrackStorage {
    pub fn new(storage_path: PathBuf) -> Result<Self, PitwallError> {
        if !storage_path.exists() {
            fs::create_dir_all(&storage_path)
                .map_err(|e| PitwallError::CacheIOError { source: e })?;
        }

        Ok(Self {
            storage_path,
            cache: HashMap::new(),
        })
    }

    /// Storage under the `tracks` folder of a cache directory
    pub fn in_cache_dir(cache_dir: &Path) -> Result<Self, PitwallError> {
        Self::new(cache_dir.join("tracks"))
    }

    fn file_path_for_track(&self, track_id: &str) -> PathBuf {
        let filename = format!("{}.json", Self::normalize_track_id(track_id));
        self.storage_path.join(filename)
    }

    /// Replace characters that are unsafe in file names
    fn normalize_track_id(track_id: &str) -> String {
        track_id
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Parse and validate a stored track
    fn load_from_file(&self, file_path: &Path) -> Result<ReferenceTrack, PitwallError> {
        let corrupted = |reason: String| PitwallError::CacheCorruption {
            path: file_path.display().to_string(),
            reason,
        };

        let content =
            fs::read_to_string(file_path).map_err(|e| PitwallError::CacheIOError { source: e })?;
        if content.is_empty() {
            return Err(corrupted("file is empty".to_string()));
        }

        let track: ReferenceTrack =
            serde_json::from_str(&content).map_err(|e| corrupted(e.to_string()))?;
        track.validate().map_err(corrupted)?;
        Ok(track)
    }

    /// Write to a temporary file first and move it in place, so readers never see a
    /// partial track
    fn save_to_file(&self, track: &ReferenceTrack) -> Result<(), PitwallError> {
        let file_path = self.file_path_for_track(&track.track_id);
        let temp_path = file_path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(track)
            .map_err(|e| PitwallError::CacheSerializeError { source: e })?;

        {
            let mut temp_file = fs::File::create(&temp_path)
                .map_err(|e| PitwallError::CacheIOError { source: e })?;
            temp_file
                .write_all(content.as_bytes())
                .map_err(|e| PitwallError::CacheIOError { source: e })?;
            temp_file
                .sync_all()
                .map_err(|e| PitwallError::CacheIOError { source: e })?;
        }

        fs::rename(&temp_path, &file_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            PitwallError::CacheIOError { source: e }
        })
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }
}

impl ReferenceTrackStorage for FileBasedTrackStorage {
    fn save_track(&mut self, track: &ReferenceTrack) -> Result<(), PitwallError> {
        if track.track_id.is_empty() {
            return Err(PitwallError::InvalidUserInput {
                field: "track_id".to_string(),
                reason: "Track ID cannot be empty".to_string(),
            });
        }
        track
            .validate()
            .map_err(|reason| PitwallError::ReferenceTrackValidationError { reason })?;

        self.save_to_file(track)?;
        info!(
            "Saved reference track {} with {} points",
            track.track_id,
            track.len()
        );

        self.cache.insert(track.track_id.clone(), track.clone());
        Ok(())
    }

    fn load_track(&self, track_id: &str) -> Result<Option<ReferenceTrack>, PitwallError> {
        if track_id.is_empty() {
            return Err(PitwallError::InvalidUserInput {
                field: "track_id".to_string(),
                reason: "Track ID cannot be empty".to_string(),
            });
        }

        if let Some(track) = self.cache.get(track_id) {
            debug!("Found reference track {} in cache", track_id);
            return Ok(Some(track.clone()));
        }

        let file_path = self.file_path_for_track(track_id);
        if !file_path.exists() {
            return Ok(None);
        }
        self.load_from_file(&file_path).map(Some)
    }

    fn list_available_tracks(&self) -> Result<Vec<String>, PitwallError> {
        let mut tracks = Vec::new();

        let entries = fs::read_dir(&self.storage_path)
            .map_err(|e| PitwallError::CacheIOError { source: e })?;
        for entry in entries {
            let entry = entry.map_err(|e| PitwallError::CacheIOError { source: e })?;
            let path = entry.path();

            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    tracks.push(stem.to_string());
                }
            }
        }

        tracks.sort();
        Ok(tracks)
    }

    fn delete_track(&mut self, track_id: &str) -> Result<(), PitwallError> {
        let file_path = self.file_path_for_track(track_id);
        if file_path.exists() {
            fs::remove_file(&file_path).map_err(|e| PitwallError::CacheIOError { source: e })?;
        }
        self.cache.remove(track_id);
        Ok(())
    }

    fn track_exists(&self, track_id: &str) -> Result<bool, PitwallError> {
        if self.cache.contains_key(track_id) {
            return Ok(true);
        }
        Ok(self.file_path_for_track(track_id).exists())
    }
}
