//! Directory-backed observation source
//!
//! The producer writes one JSON-lines record file per target
//! (`<root>/<target>.jsonl`) and a status log (`<root>/statusupdates.jsonl`)
//! with lines of the form `{"timestamp": "...", "message": "..."}`.
//! A target's count is the number of non-empty lines in its record file.

use super::ObservationSource;
use crate::error::{MonitorError, Result};
use crate::models::{Counts, Cursor, StatusEntry, Target};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// File name of the producer's status log
pub const STATUS_LOG_FILE: &str = "statusupdates.jsonl";

/// Observation source reading the producer's output directory
pub struct FsObservationSource {
    root: PathBuf,
    targets: Vec<Target>,
}

impl FsObservationSource {
    pub fn new(root: impl Into<PathBuf>, targets: Vec<Target>) -> Self {
        Self {
            root: root.into(),
            targets,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record file for `target`
    pub fn target_path(&self, target: &Target) -> PathBuf {
        self.root.join(format!("{}.jsonl", target))
    }

    async fn ensure_root(&self) -> Result<()> {
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(MonitorError::unavailable(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(e) => Err(MonitorError::unavailable(format!(
                "cannot access {}: {}",
                self.root.display(),
                e
            ))),
        }
    }

    /// Count non-blank lines; a missing file counts as zero records.
    ///
    /// Lines are counted as raw bytes so a record holding invalid UTF-8 (or a
    /// torn multi-byte write) still counts as one record.
    async fn count_records(path: &Path) -> Result<u64> {
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(MonitorError::unavailable(format!(
                    "cannot open {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let mut count = 0u64;
        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line).await.map_err(|e| {
                MonitorError::unavailable(format!("cannot read {}: {}", path.display(), e))
            })?;
            if read == 0 {
                break;
            }
            if !is_blank(&line) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Parse status-log content, skipping blank and malformed lines
    pub fn parse_status_log(content: &[u8]) -> Vec<StatusEntry> {
        content
            .split(|b| *b == b'\n')
            .enumerate()
            .filter(|(_, line)| !is_blank(line))
            .filter_map(|(idx, line)| match serde_json::from_slice::<StatusEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(line = idx + 1, error = %e, "Skipping malformed status line");
                    None
                }
            })
            .collect()
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

#[async_trait]
impl ObservationSource for FsObservationSource {
    async fn current_counts(&self) -> Result<Counts> {
        self.ensure_root().await?;

        let mut counts = Counts::new();
        for target in &self.targets {
            let count = Self::count_records(&self.target_path(target)).await?;
            counts.insert(target.clone(), count);
        }
        Ok(counts)
    }

    async fn new_log_entries(&self, since: Cursor) -> Result<Vec<StatusEntry>> {
        self.ensure_root().await?;

        let path = self.root.join(STATUS_LOG_FILE);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MonitorError::unavailable(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut entries: Vec<StatusEntry> = Self::parse_status_log(&content)
            .into_iter()
            .filter(|entry| entry.timestamp > since.last_ts())
            .collect();
        entries.sort_by_key(|entry| entry.timestamp);
        Ok(entries)
    }
}
