//! JSON-lines exporter for offline rendering.
//!
//! Each snapshot the coordinator publishes becomes one line of JSON.

use crate::error::SystemError;
use serde::Serialize;
use skyboard_core::Snapshot;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::info;

/// One exported line.
#[derive(Debug, Clone, Serialize)]
pub struct ExportLine<'a> {
    /// Seconds since the exporter started observing
    pub time_sec: f64,

    #[serde(flatten)]
    pub snapshot: &'a Snapshot,
}

/// Appends snapshots to a file, one JSON object per line.
pub struct SnapshotExporter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl SnapshotExporter {
    /// Creates (or truncates) the export file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SystemError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| SystemError::Export {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    fn io_error(&self, source: std::io::Error) -> SystemError {
        SystemError::Export {
            path: self.path.display().to_string(),
            source,
        }
    }

    /// Writes one line.
    pub fn append(&mut self, time_sec: f64, snapshot: &Snapshot) -> Result<(), SystemError> {
        let line = ExportLine { time_sec, snapshot };
        serde_json::to_writer(&mut self.writer, &line).map_err(|e| self.io_error(e.into()))?;
        self.writer.write_all(b"\n").map_err(|e| self.io_error(e))?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Flushes buffered lines and returns how many were written.
    pub fn finish(mut self) -> Result<usize, SystemError> {
        self.writer.flush().map_err(|e| self.io_error(e))?;
        info!(path = %self.path.display(), lines = self.written, "snapshot export finished");
        Ok(self.written)
    }
}

/// Writes every snapshot observed on `rx` until the coordinator drops its
/// sender. Snapshots published faster than they are written are coalesced.
pub async fn run_exporter(
    mut rx: watch::Receiver<Snapshot>,
    mut exporter: SnapshotExporter,
) -> Result<usize, SystemError> {
    let start = tokio::time::Instant::now();
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        exporter.append(start.elapsed().as_secs_f64(), &snapshot)?;
    }
    exporter.finish()
}
