use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
};

use log::error;
use serde::Serialize;
use serde_jsonlines::JsonLinesWriter;

use crate::PitwallError;

/// Write one JSON object per line to a temporary file next to `path`, then move it over
/// `path`. A failed write leaves the previous file untouched.
pub fn write_rows<R: Serialize>(path: &Path, rows: &[R]) -> Result<(), PitwallError> {
    let temp_path = path.with_extension("jsonl.tmp");
    let result = write_to(&temp_path, rows).and_then(|_| {
        fs::rename(&temp_path, path).map_err(|e| PitwallError::CacheIOError { source: e })
    });

    if let Err(e) = &result {
        error!("Error while writing {:?}: {}", path, e);
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_to<R: Serialize>(path: &Path, rows: &[R]) -> Result<(), PitwallError> {
    let file = File::create(path).map_err(|e| PitwallError::CacheIOError { source: e })?;
    let mut writer = JsonLinesWriter::new(BufWriter::new(file));
    writer
        .write_all(rows)
        .map_err(|e| PitwallError::CacheIOError { source: e })?;
    writer
        .flush()
        .map_err(|e| PitwallError::CacheIOError { source: e })?;
    writer
        .get_ref()
        .get_ref()
        .sync_all()
        .map_err(|e| PitwallError::CacheIOError { source: e })
}

/// Read back rows written by [`write_rows`]; any unparsable line marks the file corrupt
pub fn read_rows<R: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<R>, PitwallError> {
    let lines =
        serde_jsonlines::json_lines(path).map_err(|e| PitwallError::CacheIOError { source: e })?;
    lines
        .collect::<Result<Vec<R>, std::io::Error>>()
        .map_err(|e| PitwallError::CacheCorruption {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}
