//! Upload batch numbering
//!
//! Every scan is tagged with the current batch id. A batch closes when all of
//! its pending items have been uploaded, which advances the counter.

use crate::errors::CaptureError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const FIRST_BATCH: u32 = 1;

/// `BX` followed by the zero-padded batch number
pub fn format_batch_id(number: u32) -> String {
    format!("BX{:05}", number)
}

pub trait BatchCounter: Send + Sync {
    fn current_id(&self) -> String;

    /// Advance to the next batch and return its id
    fn increment(&self) -> Result<String, CaptureError>;

    fn reset(&self) -> Result<(), CaptureError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CounterFile {
    current: u32,
}

/// Batch counter persisted as a small TOML file
#[derive(Debug)]
pub struct FileBatchCounter {
    path: Option<PathBuf>,
    current: Mutex<u32>,
}

impl FileBatchCounter {
    /// Counter that lives only for the process
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: Mutex::new(FIRST_BATCH),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref().to_path_buf();
        let current = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let file: CounterFile = toml::from_str(&contents).map_err(|e| {
                CaptureError::StorageError(format!("Failed to parse batch counter: {}", e))
            })?;
            file.current.max(FIRST_BATCH)
        } else {
            FIRST_BATCH
        };
        log::info!("Batch counter at {}", format_batch_id(current));

        Ok(Self {
            path: Some(path),
            current: Mutex::new(current),
        })
    }

    fn value(&self) -> Result<std::sync::MutexGuard<'_, u32>, CaptureError> {
        self.current
            .lock()
            .map_err(|_| CaptureError::StorageError("Batch counter lock poisoned".to_string()))
    }

    fn persist(&self, current: u32) -> Result<(), CaptureError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string(&CounterFile { current }).map_err(|e| {
            CaptureError::StorageError(format!("Failed to serialize batch counter: {}", e))
        })?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl BatchCounter for FileBatchCounter {
    fn current_id(&self) -> String {
        let current = self.value().map(|v| *v).unwrap_or(FIRST_BATCH);
        format_batch_id(current)
    }

    fn increment(&self) -> Result<String, CaptureError> {
        let mut current = self.value()?;
        let next = current.saturating_add(1);
        self.persist(next)?;
        *current = next;
        log::info!("Advanced to batch {}", format_batch_id(next));
        Ok(format_batch_id(next))
    }

    fn reset(&self) -> Result<(), CaptureError> {
        let mut current = self.value()?;
        self.persist(FIRST_BATCH)?;
        *current = FIRST_BATCH;
        log::info!("Batch counter reset");
        Ok(())
    }
}
