//! Per-run JSONL event log
//!
//! Implements the per-run `events.jsonl` file. Each line is one flattened
//! [`RunEvent`].

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use super::traits::{StorageError, StorageResult};
use crate::model::RunEvent;

fn to_json_line(event: &RunEvent) -> StorageResult<String> {
    serde_json::to_string(event)
        .map_err(|e| StorageError::Serialization(format!("Failed to serialize event: {}", e)))
}

/// Handle on one run's `events.jsonl`
pub struct EventsLog {
    /// Path to events.jsonl file
    path: PathBuf,
}

impl EventsLog {
    /// Create new events log handler for a run directory
    pub fn new(run_path: &Path) -> Self {
        Self {
            path: run_path.join("events.jsonl"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn open_for_append(&self) -> StorageResult<std::fs::File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                StorageError::Backend(format!(
                    "Failed to open events log {}: {}",
                    self.path.display(),
                    e
                ))
            })
    }

    /// Append an event to the log (synchronous for atomicity)
    pub fn append(&self, event: &RunEvent) -> StorageResult<()> {
        let line = to_json_line(event)?;
        let mut file = self.open_for_append()?;
        writeln!(file, "{}", line)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read all events from the log
    pub fn read_all(&self) -> StorageResult<Vec<RunEvent>> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&self.path)?;
        let reader = std::io::BufReader::new(file);
        let mut events = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            let event: RunEvent = serde_json::from_str(&line).map_err(|e| {
                StorageError::Deserialization(format!(
                    "Failed to parse event on line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;
            events.push(event);
        }

        Ok(events)
    }

    /// Read events with filtering by wire type name
    pub fn read_filtered(
        &self,
        event_types: Option<&[&str]>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> StorageResult<Vec<RunEvent>> {
        let filtered = self
            .read_all()?
            .into_iter()
            .filter(|e| {
                event_types
                    .map(|types| types.contains(&e.kind.name()))
                    .unwrap_or(true)
            })
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        Ok(filtered)
    }
}
