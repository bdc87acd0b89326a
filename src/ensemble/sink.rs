//! Incremental trajectory dataset persistence
//!
//! The sink owns the single writable handle to the output dataset. The file
//! is append-only JSON Lines: one record per line, `{"key": K, "value": V}`.
//! A complete dataset holds one shared time-grid entry (key `t`), zero or
//! more metadata entries written before any trajectory, and N trajectory
//! entries (`trajs/1` … `trajs/N`), each written exactly once and never
//! overwritten.
//!
//! The target path must not already exist and its parent directory must; a
//! second run against the same path therefore fails its precondition check
//! before any computation starts. On a fatal mid-run error the sink is
//! dropped without `close()` and the file holds whatever was flushed before
//! the failure (no rollback).

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::EnsembleError;
use crate::physics::Trajectory;

/// Reserved key for the shared time grid.
const TIME_GRID_KEY: &str = "t";

/// Reserved key prefix for trajectory entries.
const TRAJECTORY_PREFIX: &str = "trajs/";

#[derive(Serialize)]
struct RecordRef<'a, T: Serialize> {
    key: &'a str,
    value: &'a T,
}

#[derive(Deserialize)]
struct RecordOwned {
    key: String,
    value: serde_json::Value,
}

// =================================================================================================
// Sink (single writer)
// =================================================================================================

/// Append-only, single-writer handle to one trajectory dataset.
#[derive(Debug)]
pub struct TrajectorySink {
    writer: BufWriter<File>,
    path: PathBuf,
    meta_keys: BTreeSet<String>,
    trajectory_keys: BTreeSet<usize>,
}

impl TrajectorySink {
    /// Create the dataset file.
    ///
    /// Fails with [`EnsembleError::Config`] when the path already exists or
    /// its parent directory is missing. The file is opened with
    /// `create_new`, so two concurrent runs can never share one target. A
    /// `created` metadata record with an RFC 3339 timestamp is written
    /// immediately.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, EnsembleError> {
        let path = path.into();
        if path.exists() {
            return Err(EnsembleError::Config(format!(
                "dataset target '{}' already exists",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(EnsembleError::Config(format!(
                    "parent directory '{}' does not exist",
                    parent.display()
                )));
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        log::debug!("dataset created at {}", path.display());

        let mut sink = Self {
            writer: BufWriter::new(file),
            path,
            meta_keys: BTreeSet::new(),
            trajectory_keys: BTreeSet::new(),
        };
        let created = serde_json::Value::String(chrono::Utc::now().to_rfc3339());
        sink.write_meta("created", &created)?;
        Ok(sink)
    }

    /// Path of the dataset file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a metadata entry. Each key is writable exactly once, and all
    /// metadata must precede the first trajectory entry.
    pub fn write_meta(
        &mut self,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), EnsembleError> {
        if key.starts_with(TRAJECTORY_PREFIX) {
            return Err(EnsembleError::Config(format!(
                "metadata key '{}' collides with the trajectory namespace",
                key
            )));
        }
        if !self.trajectory_keys.is_empty() {
            return Err(EnsembleError::Config(format!(
                "metadata entry '{}' must be written before any trajectory entry",
                key
            )));
        }
        if !self.meta_keys.insert(key.to_string()) {
            return Err(EnsembleError::Config(format!(
                "metadata entry '{}' was already written",
                key
            )));
        }
        self.write_record(key, value)
    }

    /// Write the shared time grid under the reserved key `t`, exactly once.
    pub fn write_time_grid(&mut self, times: &[f64]) -> Result<(), EnsembleError> {
        if !self.meta_keys.insert(TIME_GRID_KEY.to_string()) {
            return Err(EnsembleError::Config(
                "time grid was already written".to_string(),
            ));
        }
        self.write_record(TIME_GRID_KEY, &times)
    }

    /// Write trajectory entry `trajs/{index}` (1-based), exactly once.
    pub fn write_trajectory(
        &mut self,
        index: usize,
        trajectory: &Trajectory,
    ) -> Result<(), EnsembleError> {
        if index == 0 {
            return Err(EnsembleError::Config(
                "trajectory entries are keyed from 1".to_string(),
            ));
        }
        if !self.trajectory_keys.insert(index) {
            return Err(EnsembleError::Config(format!(
                "trajectory entry {} was already written",
                index
            )));
        }
        let key = format!("{}{}", TRAJECTORY_PREFIX, index);
        self.write_record(&key, trajectory)
    }

    /// Flush and close the dataset. Taking `self` by value makes a second
    /// close unrepresentable; the file is complete and readable afterwards.
    pub fn close(mut self) -> Result<(), EnsembleError> {
        self.writer.flush()?;
        log::debug!(
            "dataset closed at {} ({} trajectories)",
            self.path.display(),
            self.trajectory_keys.len()
        );
        Ok(())
    }

    fn write_record<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), EnsembleError> {
        serde_json::to_writer(&mut self.writer, &RecordRef { key, value })?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

// =================================================================================================
// Read-back
// =================================================================================================

/// In-memory view of a persisted dataset, for inspection and tests.
#[derive(Debug, Default)]
pub struct Dataset {
    /// The shared time grid, when the run got far enough to write it.
    pub time_grid: Option<Vec<f64>>,

    /// Metadata entries in key order (includes the automatic `created`
    /// stamp).
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Trajectory entries keyed by their dataset index.
    pub trajectories: BTreeMap<usize, Trajectory>,
}

/// Read a dataset file back into memory.
pub fn read_dataset(path: impl AsRef<Path>) -> Result<Dataset, EnsembleError> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    let mut dataset = Dataset::default();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: RecordOwned = serde_json::from_str(&line)?;
        if record.key == TIME_GRID_KEY {
            dataset.time_grid = Some(serde_json::from_value(record.value)?);
        } else if let Some(rest) = record.key.strip_prefix(TRAJECTORY_PREFIX) {
            let index: usize = rest.parse().map_err(|_| {
                EnsembleError::Config(format!("malformed trajectory key '{}'", record.key))
            })?;
            dataset
                .trajectories
                .insert(index, serde_json::from_value(record.value)?);
        } else {
            dataset.metadata.insert(record.key, record.value);
        }
    }
    Ok(dataset)
}

// =================================================================================================
// Tests
// =================================================================================================
