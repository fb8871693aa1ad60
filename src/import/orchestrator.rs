//! Sequential batch import
//!
//! Records are written in batches of `batch_size`. Before the items of a
//! batch are written, the categories they depend on are found or created
//! root to leaf. Within a batch a permanent failure only fails its record;
//! records that failed transiently are retried together with backoff. Once
//! the retry budget runs out they fail permanently.

use super::record::{ImportPlan, SourceRecord};
use super::{ImportErrorKind, ImportMode, ImportOptions, ImportResult, with_timeout};
use crate::api::resilience::{Retryable, RetryPolicy};
use crate::api::{RecordFields, RemoteCatalog, RemoteError};
use crate::category::{CategoryTree, RemoteStatus};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct BatchImportOrchestrator {
    remote: Arc<dyn RemoteCatalog>,
    options: ImportOptions,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl BatchImportOrchestrator {
    pub fn new(remote: Arc<dyn RemoteCatalog>, options: ImportOptions) -> Self {
        let retry = RetryPolicy::new(options.retry.clone());
        Self {
            remote,
            options,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token (e.g. cancelled on Ctrl-C)
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Import every record of the plan, returning one result per record in
    /// source order
    pub async fn run(&self, plan: ImportPlan) -> Vec<ImportResult> {
        let ImportPlan {
            records,
            mut categories,
        } = plan;

        info!(
            "Starting import of {} {} records (mode: {}, dry run: {}, batch size: {})",
            records.len(),
            self.options.entity.doctype(),
            self.options.mode,
            self.options.dry_run,
            self.options.batch_size
        );

        if self.options.dry_run {
            return self.simulate(&records, &categories);
        }

        if let Err(e) = with_timeout(self.options.request_timeout, self.remote.check_connection()).await {
            error!("Connection check failed: {}", e);
            return records
                .iter()
                .map(|record| {
                    ImportResult::failed(
                        record.line,
                        record.natural_key.clone(),
                        ImportErrorKind::ConnectionError,
                        e.to_string(),
                    )
                })
                .collect();
        }

        let batch_size = self.options.batch_size.max(1);
        let batch_count = records.len().div_ceil(batch_size);
        let mut results = Vec::with_capacity(records.len());

        for (number, batch) in records.chunks(batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Import cancelled before batch {}/{}", number + 1, batch_count);
                results.extend(
                    records[results.len()..]
                        .iter()
                        .map(|r| ImportResult::cancelled(r.line, r.natural_key.clone())),
                );
                break;
            }

            info!("Processing batch {}/{} ({} records)", number + 1, batch_count, batch.len());
            self.ensure_categories(batch, &mut categories).await;
            results.extend(self.process_batch(batch, &categories).await);
        }

        let failed = results.iter().filter(|r| r.is_failure()).count();
        info!("Import finished: {} records, {} failed", results.len(), failed);
        results
    }

    fn simulate(&self, records: &[SourceRecord], categories: &CategoryTree) -> Vec<ImportResult> {
        records
            .iter()
            .map(|record| {
                if let Some(rejection) = &record.rejection {
                    return rejected(record, rejection.kind, &rejection.message);
                }
                let group = record
                    .category_path
                    .last()
                    .map(|leaf| categories.node(*leaf).label.clone())
                    .or_else(|| {
                        record
                            .get_or_default("item_group")
                            .filter(|v| !v.is_empty())
                            .map(ToString::to_string)
                    });
                let note = match group {
                    Some(group) => format!("dry run ({}), item group '{}'", self.options.mode, group),
                    None => format!("dry run ({})", self.options.mode),
                };
                ImportResult::simulated(record.line, record.natural_key.clone(), note)
                    .with_warnings(record.warnings.clone())
            })
            .collect()
    }

    /// Find or create the categories the writable records of a batch need
    async fn ensure_categories(&self, batch: &[SourceRecord], tree: &mut CategoryTree) {
        for record in batch.iter().filter(|r| r.is_writable()) {
            for &id in &record.category_path {
                if !matches!(tree.remote(id), RemoteStatus::Unresolved) {
                    continue;
                }

                let parent_id = match tree.parent(id).map(|p| tree.remote(p)) {
                    Some(RemoteStatus::Present(parent)) => Some(parent.clone()),
                    _ => None,
                };
                let label = tree.node(id).label.clone();

                match self.ensure_category(parent_id.as_deref(), &label).await {
                    Ok(remote_id) => {
                        debug!("Category '{}' is '{}'", label, remote_id);
                        tree.set_remote(id, RemoteStatus::Present(remote_id));
                    }
                    Err(e) => {
                        error!("Category '{}' could not be created: {}", label, e);
                        tree.fail_subtree(id, &e.to_string());
                        break;
                    }
                }
            }
        }
    }

    async fn ensure_category(&self, parent_id: Option<&str>, label: &str) -> Result<String, RemoteError> {
        let timeout = self.options.request_timeout;
        let remote = self.remote.as_ref();

        let found = self
            .retry
            .execute(&format!("find category '{}'", label), move || {
                with_timeout(timeout, remote.find_category(label))
            })
            .await?;
        if let Some(id) = found {
            return Ok(id);
        }

        info!("Creating category '{}' under {:?}", label, parent_id);
        self.retry
            .execute(&format!("create category '{}'", label), move || {
                with_timeout(timeout, remote.create_category(parent_id, label))
            })
            .await
    }

    async fn process_batch(&self, batch: &[SourceRecord], categories: &CategoryTree) -> Vec<ImportResult> {
        let mut slots: Vec<Option<ImportResult>> = vec![None; batch.len()];
        let mut pending = Vec::new();

        for (index, record) in batch.iter().enumerate() {
            if let Some(rejection) = &record.rejection {
                slots[index] = Some(rejected(record, rejection.kind, &rejection.message));
            } else if let Some((label, reason)) = categories.first_failure(&record.category_path) {
                let message = format!("category '{}' could not be created: {}", label, reason);
                slots[index] = Some(rejected(record, ImportErrorKind::CategoryCreationError, &message));
            } else {
                pending.push(index);
            }
        }

        let max_attempts = self.retry.config().max_attempts.max(1);
        let mut attempt = 1;
        while !pending.is_empty() {
            let mut transient = Vec::new();
            for &index in &pending {
                let record = &batch[index];
                match self.write_record(record, categories).await {
                    Ok(result) => slots[index] = Some(result.with_warnings(record.warnings.clone())),
                    Err(e) if e.is_transient() => transient.push((index, e)),
                    Err(e) => {
                        warn!("Row {}: write rejected: {}", record.line, e);
                        slots[index] = Some(rejected(record, ImportErrorKind::PermanentWriteError, &e.to_string()));
                    }
                }
            }

            if transient.is_empty() {
                break;
            }

            if attempt >= max_attempts {
                // Retry budget spent: the failure is final
                for (index, e) in transient {
                    let message = format!("{} (gave up after {} attempts)", e, attempt);
                    warn!("Row {}: {}", batch[index].line, message);
                    slots[index] = Some(rejected(&batch[index], ImportErrorKind::PermanentWriteError, &message));
                }
                break;
            }

            let delay = self.retry.calculate_delay(attempt);
            warn!(
                "{} record(s) failed transiently on attempt {}/{}, retrying in {:?}",
                transient.len(),
                attempt,
                max_attempts,
                delay
            );

            tokio::time::sleep(delay).await;

            pending = transient.into_iter().map(|(index, _)| index).collect();
            attempt += 1;
        }

        slots
            .into_iter()
            .zip(batch)
            .map(|(slot, record)| {
                slot.unwrap_or_else(|| {
                    rejected(record, ImportErrorKind::TransientWriteError, "write not completed")
                })
            })
            .collect()
    }

    /// One attempt at writing a record according to the import mode
    async fn write_record(
        &self,
        record: &SourceRecord,
        categories: &CategoryTree,
    ) -> Result<ImportResult, RemoteError> {
        let entity = self.options.entity;
        let timeout = self.options.request_timeout;
        let key = record.natural_key.clone();
        let Some(natural_key) = key.as_deref() else {
            return Ok(rejected(
                record,
                ImportErrorKind::ValidationError,
                &format!("missing {}", entity.natural_key_field()),
            ));
        };

        let group = record.category_path.last().and_then(|leaf| match categories.remote(*leaf) {
            RemoteStatus::Present(group) => Some(Value::String(group.clone())),
            _ => None,
        });
        let payload = |mut fields: RecordFields| {
            fields.retain(|_, value| !value.is_null());
            if let Some(group) = &group {
                fields.insert("item_group".to_string(), group.clone());
            }
            fields
        };

        let existing = with_timeout(timeout, self.remote.exists(entity, natural_key)).await?;
        match (self.options.mode, existing) {
            (ImportMode::CreateOnly, Some(id)) => {
                debug!("Row {}: '{}' exists, skipping", record.line, natural_key);
                Ok(ImportResult::skipped(record.line, key, "already exists").with_target(id))
            }
            (ImportMode::UpdateOnly, None) => {
                debug!("Row {}: '{}' not found, skipping", record.line, natural_key);
                Ok(ImportResult::skipped(record.line, key, "not found"))
            }
            (_, Some(id)) => {
                let fields = payload(record.to_remote_fields());
                with_timeout(timeout, self.remote.update(entity, &id, &fields)).await?;
                debug!("Row {}: updated '{}'", record.line, id);
                Ok(ImportResult::updated(record.line, key, id))
            }
            (_, None) => {
                let fields = payload(record.to_create_fields());
                let id = with_timeout(timeout, self.remote.create(entity, &fields)).await?;
                debug!("Row {}: created '{}'", record.line, id);
                Ok(ImportResult::created(record.line, key, id))
            }
        }
    }
}

fn rejected(record: &SourceRecord, kind: ImportErrorKind, message: &str) -> ImportResult {
    ImportResult::failed(record.line, record.natural_key.clone(), kind, message)
        .with_warnings(record.warnings.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDescriptor, SourceEntity};
    use crate::import::ImportStatus;
    use crate::import::record::Rejection;
    use crate::transform::FieldValue;
    use async_trait::async_trait;
    use std::path::Path;

    /// Remote that must never be reached
    struct Unreachable;

    #[async_trait]
    impl RemoteCatalog for Unreachable {
        async fn check_connection(&self) -> Result<String, RemoteError> {
            Err(RemoteError::Connection("connection refused".into()))
        }
        async fn exists(&self, _: SourceEntity, _: &str) -> Result<Option<String>, RemoteError> {
            panic!("exists called")
        }
        async fn create(&self, _: SourceEntity, _: &RecordFields) -> Result<String, RemoteError> {
            panic!("create called")
        }
        async fn update(&self, _: SourceEntity, _: &str, _: &RecordFields) -> Result<(), RemoteError> {
            panic!("update called")
        }
        async fn find_category(&self, _: &str) -> Result<Option<String>, RemoteError> {
            panic!("find_category called")
        }
        async fn create_category(&self, _: Option<&str>, _: &str) -> Result<String, RemoteError> {
            panic!("create_category called")
        }
        async fn upload_image(&self, _: &str, _: &Path, _: bool) -> Result<(), RemoteError> {
            panic!("upload_image called")
        }
        async fn delete_attachments(&self, _: &str) -> Result<usize, RemoteError> {
            panic!("delete_attachments called")
        }
        async fn list_custom_fields(&self, _: SourceEntity) -> Result<Vec<FieldDescriptor>, RemoteError> {
            panic!("list_custom_fields called")
        }
    }

    fn plan() -> ImportPlan {
        let mut categories = CategoryTree::new();
        let root = categories.intern(None, "Regale");
        let leaf = categories.intern(Some(root), "Steckregale");

        let record = |line: usize, key: &str| SourceRecord {
            line,
            natural_key: Some(key.to_string()),
            fields: [("item_code".to_string(), FieldValue::text(key))].into_iter().collect(),
            create_defaults: Default::default(),
            variant_attributes: Vec::new(),
            category_path: vec![root, leaf],
            warnings: Vec::new(),
            rejection: None,
        };
        let mut invalid = record(3, "");
        invalid.natural_key = None;
        invalid.rejection = Some(Rejection {
            kind: ImportErrorKind::ValidationError,
            message: "missing required field(s): item_code".into(),
        });

        ImportPlan {
            records: vec![record(1, "A"), record(2, "B"), invalid],
            categories,
        }
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_remote_calls() {
        let options = ImportOptions {
            dry_run: true,
            ..ImportOptions::default()
        };
        let orchestrator = BatchImportOrchestrator::new(Arc::new(Unreachable), options);

        let results = orchestrator.run(plan()).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, ImportStatus::Simulated);
        assert!(results[0].message.as_deref().unwrap().contains("Steckregale"));
        assert_eq!(results[2].error_kind, Some(ImportErrorKind::ValidationError));
    }

    #[tokio::test]
    async fn test_connection_failure_fails_every_record() {
        let orchestrator = BatchImportOrchestrator::new(Arc::new(Unreachable), ImportOptions::default());

        let results = orchestrator.run(plan()).await;
        assert_eq!(results.len(), 3);
        assert!(
            results
                .iter()
                .all(|r| r.error_kind == Some(ImportErrorKind::ConnectionError))
        );
    }
}
