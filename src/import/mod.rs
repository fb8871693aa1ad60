//! Batched import into the remote catalog
//!
//! The [`RecordPreparer`] turns source rows into [`SourceRecord`]s (transformation,
//! category resolution, required-field checks); the
//! [`BatchImportOrchestrator`] writes them in sequential batches and reports
//! one [`ImportResult`] per record.

pub mod error;
pub mod images;
pub mod orchestrator;
pub mod record;
pub mod result;

pub use error::ImportErrorKind;
pub use images::upload_images;
pub use orchestrator::BatchImportOrchestrator;
pub use record::{ImportPlan, RecordPreparer, Rejection, SourceRecord};
pub use result::{DEFAULT_FAILURE_DETAILS, ImportResult, ImportStatus, ImportSummary};

use crate::api::RemoteError;
use crate::api::resilience::{RetryConfig, Retryable};
use crate::catalog::SourceEntity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How existing records are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ImportMode {
    /// Only create new records; existing ones are skipped
    CreateOnly,
    /// Only update existing records; new ones are skipped
    UpdateOnly,
    /// Create or update as needed
    #[default]
    Upsert,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportMode::CreateOnly => "create-only",
            ImportMode::UpdateOnly => "update-only",
            ImportMode::Upsert => "upsert",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub mode: ImportMode,
    pub dry_run: bool,
    pub entity: SourceEntity,
    pub batch_size: usize,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
    pub default_item_group: String,
    pub fallback_unit: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            mode: ImportMode::Upsert,
            dry_run: false,
            entity: SourceEntity::Item,
            batch_size: 50,
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            default_item_group: "Alle Artikelgruppen".to_string(),
            fallback_unit: "Stk".to_string(),
        }
    }
}

/// Await a remote call, turning an elapsed `limit` into [`RemoteError::Timeout`]
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    call: impl std::future::Future<Output = Result<T, RemoteError>>,
) -> Result<T, RemoteError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Timeout),
    }
}

/// Error kind for a write that failed with `error`
pub(crate) fn write_error_kind(error: &RemoteError) -> ImportErrorKind {
    if error.is_transient() {
        ImportErrorKind::TransientWriteError
    } else {
        ImportErrorKind::PermanentWriteError
    }
}
