//! Per-record results and the run summary

use super::error::ImportErrorKind;
use serde::Serialize;
use std::fmt;

/// Number of failure details kept in an [`ImportSummary`]
pub const DEFAULT_FAILURE_DETAILS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Created,
    Updated,
    Skipped,
    Failed,
    Simulated,
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportStatus::Created => "created",
            ImportStatus::Updated => "updated",
            ImportStatus::Skipped => "skipped",
            ImportStatus::Failed => "failed",
            ImportStatus::Simulated => "simulated",
        };
        f.write_str(name)
    }
}

/// Outcome for one source record (or one image file)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportResult {
    /// 1-based source row
    pub line: usize,
    /// Natural key (item code) or file name
    pub key: Option<String>,
    pub status: ImportStatus,
    pub target_id: Option<String>,
    pub error_kind: Option<ImportErrorKind>,
    pub message: Option<String>,
    /// Non-fatal notes such as conversion errors of single fields
    pub warnings: Vec<String>,
}

impl ImportResult {
    fn new(line: usize, key: Option<String>, status: ImportStatus) -> Self {
        Self {
            line,
            key,
            status,
            target_id: None,
            error_kind: None,
            message: None,
            warnings: Vec::new(),
        }
    }

    pub fn created(line: usize, key: Option<String>, target_id: String) -> Self {
        Self {
            target_id: Some(target_id),
            ..Self::new(line, key, ImportStatus::Created)
        }
    }

    pub fn updated(line: usize, key: Option<String>, target_id: String) -> Self {
        Self {
            target_id: Some(target_id),
            ..Self::new(line, key, ImportStatus::Updated)
        }
    }

    pub fn skipped(line: usize, key: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            message: Some(reason.into()),
            ..Self::new(line, key, ImportStatus::Skipped)
        }
    }

    pub fn simulated(line: usize, key: Option<String>, note: impl Into<String>) -> Self {
        Self {
            message: Some(note.into()),
            ..Self::new(line, key, ImportStatus::Simulated)
        }
    }

    pub fn failed(
        line: usize,
        key: Option<String>,
        kind: ImportErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error_kind: Some(kind),
            message: Some(message.into()),
            ..Self::new(line, key, ImportStatus::Failed)
        }
    }

    pub fn cancelled(line: usize, key: Option<String>) -> Self {
        Self {
            error_kind: Some(ImportErrorKind::Cancelled),
            ..Self::skipped(line, key, "import cancelled")
        }
    }

    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status == ImportStatus::Failed
    }
}

impl fmt::Display for ImportResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}", self.line)?;
        if let Some(key) = &self.key {
            write!(f, " ({})", key)?;
        }
        write!(f, ": {}", self.status)?;
        if let Some(kind) = self.error_kind {
            write!(f, " [{}]", kind)?;
        }
        if let Some(message) = &self.message {
            write!(f, " {}", message)?;
        }
        Ok(())
    }
}

/// Counts of a run plus the first failures
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub simulated: usize,
    pub warnings: usize,
    pub failures: Vec<ImportResult>,
}

impl ImportSummary {
    pub fn from_results(results: &[ImportResult], max_failures: usize) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };

        for result in results {
            match result.status {
                ImportStatus::Created => summary.created += 1,
                ImportStatus::Updated => summary.updated += 1,
                ImportStatus::Skipped => summary.skipped += 1,
                ImportStatus::Simulated => summary.simulated += 1,
                ImportStatus::Failed => {
                    summary.failed += 1;
                    if summary.failures.len() < max_failures {
                        summary.failures.push(result.clone());
                    }
                }
            }
            summary.warnings += result.warnings.len();
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Share of records that were written or simulated, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.created + self.updated + self.simulated) as f64 / self.total as f64 * 100.0
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records: {} created, {} updated, {} skipped, {} failed",
            self.total, self.created, self.updated, self.skipped, self.failed
        )?;
        if self.simulated > 0 {
            write!(f, ", {} simulated", self.simulated)?;
        }
        Ok(())
    }
}
