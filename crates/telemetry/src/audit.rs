//! Audit trail for load runs.
//!
//! Each event is one compact JSON object on its own line, so the file can be
//! tailed, grepped, or streamed into `jq` while a load is still running.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Envelope written for every audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord<T> {
    pub kind: String,
    pub recorded_at: DateTime<Utc>,
    pub payload: T,
}

/// What one indicator contributed to a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSample {
    pub indicator_code: String,
    /// Distinct countries in the downloaded series.
    pub countries: usize,
    /// Rows kept after dropping aggregates and unparseable years.
    pub observations: usize,
    pub non_null: usize,
    /// Rows inserted or updated.
    pub written: u64,
}

impl IndicatorSample {
    /// Share of kept rows that carry a value, in `0.0..=1.0`.
    pub fn coverage(&self) -> f64 {
        if self.observations == 0 {
            0.0
        } else {
            self.non_null as f64 / self.observations as f64
        }
    }
}

/// Append-only JSON-lines audit file. A log without a path drops events.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new<P: Into<PathBuf>>(path: Option<P>) -> Self {
        Self {
            path: path.map(Into::into),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one `kind` event carrying `payload`.
    ///
    /// The line is serialized in full before the file is touched, so a
    /// serialization error never leaves a partial line behind.
    pub fn record<T: Serialize>(&self, kind: &str, payload: &T) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let record = AuditRecord {
            kind: kind.to_string(),
            recorded_at: Utc::now(),
            payload,
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        debug!(kind, "Wrote audit record to {:?}", path);
        Ok(())
    }
}
