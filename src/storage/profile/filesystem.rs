//! File-backed profile store.
//!
//! The profile lives in one pretty-printed JSON document. Saves write a
//! sibling temp file and rename it over the target, so a crash mid-write
//! leaves the previous document intact.

use crate::models::CharacterProfile;
use crate::storage::traits::ProfileStore;
use crate::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::instrument;

/// Maximum profile document size (16MB).
const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Profile store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct JsonProfileStore {
    path: PathBuf,
}

impl JsonProfileStore {
    /// Creates a store for the given document path. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ProfileStore for JsonProfileStore {
    #[instrument(skip(self), fields(component = "profile_store", operation = "load", path = %self.path.display()))]
    fn load(&self) -> Result<Option<CharacterProfile>> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage("stat_profile", e)),
        };
        if metadata.len() > MAX_FILE_SIZE {
            return Err(Error::storage(
                "read_profile",
                format!("profile exceeds maximum size of {MAX_FILE_SIZE} bytes"),
            ));
        }

        let contents = fs::read(&self.path).map_err(|e| Error::storage("read_profile", e))?;

        match serde_json::from_slice(&contents) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                tracing::warn!(error = %e, "Stored profile does not parse; treating as absent");
                metrics::counter!("profile_load_corrupt_total").increment(1);
                Ok(None)
            },
        }
    }

    #[instrument(skip(self, profile), fields(component = "profile_store", operation = "save", path = %self.path.display()))]
    fn save(&self, profile: &CharacterProfile) -> Result<()> {
        let start = Instant::now();
        let result = (|| {
            let json = serde_json::to_string_pretty(profile)
                .map_err(|e| Error::storage("serialize_profile", e))?;

            if let Some(parent) = self.path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).map_err(|e| Error::storage("create_profile_dir", e))?;
            }

            let tmp = self.temp_path();
            fs::write(&tmp, json).map_err(|e| Error::storage("write_profile", e))?;
            fs::rename(&tmp, &self.path).map_err(|e| {
                let _ = fs::remove_file(&tmp);
                Error::storage("replace_profile", e)
            })
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("profile_saves_total", "status" => status).increment(1);
        metrics::histogram!("profile_save_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        result
    }
}
