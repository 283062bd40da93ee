use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::campus::timetable::error::{Result, TimetableError};
use crate::campus::timetable::model::SubjectRecord;

/// Loads the canonical store, a JSON array of subject records.
pub fn load_store(path: &Path) -> Result<Vec<SubjectRecord>> {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Err(TimetableError::MissingStore(path.to_path_buf()));
        }
        Err(error) => return Err(error.into()),
    };
    let records: Vec<SubjectRecord> =
        serde_json::from_str(&source).map_err(|source| TimetableError::MalformedStore {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(record_count = records.len(), path = %path.display(), "store loaded");
    Ok(records)
}

/// Replaces the canonical store with `records`.
pub fn save_store(path: &Path, records: &[SubjectRecord]) -> Result<()> {
    write_json_atomically(path, records)?;
    debug!(record_count = records.len(), path = %path.display(), "store written");
    Ok(())
}

/// Writes pretty-printed JSON to a temporary file next to `path` and renames
/// it over `path`, so readers never observe a partially written file.
pub fn write_json_atomically<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let json = serde_json::to_string_pretty(value)?;

    let mut file = NamedTempFile::new_in(directory)?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}
