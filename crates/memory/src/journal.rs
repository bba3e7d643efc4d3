//! JSONL journal — durable append-only storage for memory records.
//!
//! One JSON object per line, appended and flushed per record so readers
//! of the file never see a torn entry and a crash loses at most the
//! record being written. Corrupted lines are skipped with a warning on
//! replay rather than poisoning the whole log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use groundsql_core::error::WriteError;
use groundsql_core::memory::MemoryRecord;
use tracing::{debug, warn};

/// An append-only JSONL journal of memory records.
pub struct Journal {
    path: PathBuf,
    file: Mutex<File>,
}

impl Journal {
    /// Open (or create) the journal at a path.
    pub fn open(path: &Path) -> Result<Self, WriteError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WriteError::Storage(format!("creating journal directory: {e}")))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| WriteError::Storage(format!("opening journal {}: {e}", path.display())))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Append one record as a single line and flush.
    pub fn append(&self, record: &MemoryRecord) -> Result<(), WriteError> {
        let line = serde_json::to_string(record)
            .map_err(|e| WriteError::Serialization(e.to_string()))?;
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(file, "{line}").map_err(|e| WriteError::Storage(format!("appending: {e}")))?;
        file.flush()
            .map_err(|e| WriteError::Storage(format!("flushing: {e}")))?;
        Ok(())
    }

    /// Replay all records from the journal file, in write order.
    pub fn replay(path: &Path) -> Vec<MemoryRecord> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        let records: Vec<MemoryRecord> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<MemoryRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "skipping corrupted journal line");
                    None
                }
            })
            .collect();

        debug!(path = %path.display(), count = records.len(), "journal replayed");
        records
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
