//! JSON file persistence for small local collections.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

// Maximum allowed size for state files to prevent DoS attacks (10MB)
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ITEMS: usize = 100_000;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("state file {0} exceeds security limits")]
    TooLarge(PathBuf),
    #[error("state lock poisoned")]
    Poisoned,
}

/// Loads and saves a `Vec<T>` as a pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct StateManager {
    path: PathBuf,
}

impl StateManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load<T>(&self) -> Result<Vec<T>, StoreError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        // Check file size before loading to prevent DoS attacks
        let metadata = std::fs::metadata(&self.path)?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(StoreError::TooLarge(self.path.clone()));
        }
        if metadata.len() == 0 {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let json_value: serde_json::Value = serde_json::from_reader(reader)?;

        if let Some(array) = json_value.as_array() {
            if array.len() > MAX_ITEMS {
                return Err(StoreError::TooLarge(self.path.clone()));
            }
        }

        Ok(serde_json::from_value(json_value)?)
    }

    pub fn save<T: Serialize>(&self, items: &[T]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().write(true).create(true).truncate(true).open(&self.path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, items)?;
        Ok(())
    }
}
