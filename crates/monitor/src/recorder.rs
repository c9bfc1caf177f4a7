//! Append-only JSONL log of per-frame decisions.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use fallwatch_common::error::FallwatchResult;
use fallwatch_detector_core::FrameDecision;

/// First (`#`-prefixed) line of a decision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLogHeader {
    pub schema_version: String,
    /// Scoring strategy that produced the decisions.
    pub strategy: String,
    /// Local wall-clock time the log was started.
    pub started_at: String,
}

impl DecisionLogHeader {
    pub fn new(strategy: impl Into<String>, started_at: impl Into<String>) -> Self {
        Self {
            schema_version: "1.0".to_string(),
            strategy: strategy.into(),
            started_at: started_at.into(),
        }
    }
}

/// Writes one [`FrameDecision`] per line.
#[derive(Debug)]
pub struct DecisionRecorder {
    writer: BufWriter<File>,
    path: PathBuf,
    written: u64,
}

impl DecisionRecorder {
    /// Create (or truncate) the log and write the header line.
    pub fn create(path: &Path, header: &DecisionLogHeader) -> FallwatchResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);

        let header_json = serde_json::to_string(header)?;
        writeln!(writer, "# {header_json}")?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            written: 0,
        })
    }

    pub fn record(&mut self, decision: &FrameDecision) -> FallwatchResult<()> {
        let json = serde_json::to_string(decision)?;
        writeln!(self.writer, "{json}")?;
        self.written += 1;

        // Alerts are flushed immediately so they survive a crash.
        if decision.alert.is_some() || self.written % 256 == 0 {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> FallwatchResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DecisionRecorder {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
