//! In-memory remote catalog for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use catalog_sync::api::resilience::RetryConfig;
use catalog_sync::api::{RecordFields, RemoteCatalog, RemoteError};
use catalog_sync::catalog::{FieldCatalog, FieldDescriptor, SourceEntity};
use catalog_sync::category::CategoryResolver;
use catalog_sync::import::{ImportOptions, ImportPlan, RecordPreparer};
use catalog_sync::mapping::AutoMapper;
use catalog_sync::source::CsvOptions;
use catalog_sync::source::delimited::read_bytes;
use catalog_sync::transform::{RuleSet, TransformationEngine};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CheckConnection,
    Exists(String),
    Create(String),
    Update(String),
    FindCategory(String),
    CreateCategory(String),
    Upload(String, PathBuf, bool),
    DeleteAttachments(String),
    ListCustomFields,
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Call::Create(_)
                | Call::Update(_)
                | Call::CreateCategory(_)
                | Call::Upload(..)
                | Call::DeleteAttachments(_)
        )
    }
}

#[derive(Default)]
struct State {
    records: BTreeMap<String, RecordFields>,
    categories: BTreeMap<String, Option<String>>,
    calls: Vec<Call>,
    attachments: HashMap<String, usize>,
    write_failures: HashMap<String, VecDeque<RemoteError>>,
    stalled_writes: HashMap<String, (usize, Duration)>,
    category_failures: HashMap<String, RemoteError>,
    flaky_categories: HashMap<String, VecDeque<RemoteError>>,
    connection_failure: Option<RemoteError>,
    cancel_on_create: Option<CancellationToken>,
}

/// Remote catalog keeping records in memory, ids equal natural keys
#[derive(Default)]
pub struct MockCatalog {
    state: Mutex<State>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, key: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .records
            .insert(key.to_string(), RecordFields::new());
        self
    }

    pub fn with_category(self, label: &str) -> Self {
        self.state.lock().unwrap().categories.insert(label.to_string(), None);
        self
    }

    /// Fail the next writes (create, update or attachment removal) of `key`
    /// with these errors
    pub fn fail_writes(self, key: &str, errors: Vec<RemoteError>) -> Self {
        self.state
            .lock()
            .unwrap()
            .write_failures
            .insert(key.to_string(), errors.into());
        self
    }

    /// Let the next `count` writes of `key` hang for `delay` before answering
    pub fn stall_writes(self, key: &str, count: usize, delay: Duration) -> Self {
        self.state
            .lock()
            .unwrap()
            .stalled_writes
            .insert(key.to_string(), (count, delay));
        self
    }

    /// Files already attached to `key`
    pub fn with_attachments(self, key: &str, count: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .attachments
            .insert(key.to_string(), count);
        self
    }

    pub fn attachment_count(&self, key: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .attachments
            .get(key)
            .copied()
            .unwrap_or_default()
    }

    /// Fail every attempt to create category `label`
    pub fn fail_category(self, label: &str, error: RemoteError) -> Self {
        self.state
            .lock()
            .unwrap()
            .category_failures
            .insert(label.to_string(), error);
        self
    }

    /// Fail the next attempts to create category `label` with these errors
    pub fn flaky_category(self, label: &str, errors: Vec<RemoteError>) -> Self {
        self.state
            .lock()
            .unwrap()
            .flaky_categories
            .insert(label.to_string(), errors.into());
        self
    }

    pub fn refuse_connection(self, error: RemoteError) -> Self {
        self.state.lock().unwrap().connection_failure = Some(error);
        self
    }

    /// Cancel `token` as soon as the first record is created
    pub fn cancel_on_create(self, token: CancellationToken) -> Self {
        self.state.lock().unwrap().cancel_on_create = Some(token);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn record(&self, key: &str) -> Option<RecordFields> {
        self.state.lock().unwrap().records.get(key).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    /// Parent label of a created or known category
    pub fn category_parent(&self, label: &str) -> Option<Option<String>> {
        self.state.lock().unwrap().categories.get(label).cloned()
    }

    fn log(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn scripted_failure(&self, key: &str) -> Option<RemoteError> {
        self.state
            .lock()
            .unwrap()
            .write_failures
            .get_mut(key)
            .and_then(VecDeque::pop_front)
    }

    /// Sleep if a stall is scripted for `key`; the lock is released first
    async fn stall(&self, key: &str) {
        let delay = {
            let mut state = self.state.lock().unwrap();
            match state.stalled_writes.get_mut(key) {
                Some((count, delay)) if *count > 0 => {
                    *count -= 1;
                    Some(*delay)
                }
                _ => None,
            }
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn natural_key(entity: SourceEntity, fields: &RecordFields) -> String {
    fields
        .get(entity.natural_key_field())
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl RemoteCatalog for MockCatalog {
    async fn check_connection(&self) -> Result<String, RemoteError> {
        self.log(Call::CheckConnection);
        match self.state.lock().unwrap().connection_failure.clone() {
            Some(error) => Err(error),
            None => Ok("importer@example.com".to_string()),
        }
    }

    async fn exists(&self, _entity: SourceEntity, key: &str) -> Result<Option<String>, RemoteError> {
        self.log(Call::Exists(key.to_string()));
        let state = self.state.lock().unwrap();
        Ok(state.records.contains_key(key).then(|| key.to_string()))
    }

    async fn create(&self, entity: SourceEntity, fields: &RecordFields) -> Result<String, RemoteError> {
        let key = natural_key(entity, fields);
        self.log(Call::Create(key.clone()));
        self.stall(&key).await;
        if let Some(error) = self.scripted_failure(&key) {
            return Err(error);
        }
        let mut state = self.state.lock().unwrap();
        state.records.insert(key.clone(), fields.clone());
        if let Some(token) = &state.cancel_on_create {
            token.cancel();
        }
        Ok(key)
    }

    async fn update(&self, _entity: SourceEntity, id: &str, fields: &RecordFields) -> Result<(), RemoteError> {
        self.log(Call::Update(id.to_string()));
        self.stall(id).await;
        if let Some(error) = self.scripted_failure(id) {
            return Err(error);
        }
        let mut state = self.state.lock().unwrap();
        let record = state.records.entry(id.to_string()).or_default();
        for (name, value) in fields {
            record.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    async fn find_category(&self, label: &str) -> Result<Option<String>, RemoteError> {
        self.log(Call::FindCategory(label.to_string()));
        let state = self.state.lock().unwrap();
        Ok(state.categories.contains_key(label).then(|| label.to_string()))
    }

    async fn create_category(&self, parent_id: Option<&str>, label: &str) -> Result<String, RemoteError> {
        self.log(Call::CreateCategory(label.to_string()));
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.category_failures.get(label) {
            return Err(error.clone());
        }
        if let Some(error) = state.flaky_categories.get_mut(label).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        state
            .categories
            .insert(label.to_string(), parent_id.map(str::to_string));
        Ok(label.to_string())
    }

    async fn upload_image(&self, target_id: &str, file: &Path, is_primary: bool) -> Result<(), RemoteError> {
        self.log(Call::Upload(target_id.to_string(), file.to_path_buf(), is_primary));
        *self
            .state
            .lock()
            .unwrap()
            .attachments
            .entry(target_id.to_string())
            .or_default() += 1;
        Ok(())
    }

    async fn delete_attachments(&self, target_id: &str) -> Result<usize, RemoteError> {
        self.log(Call::DeleteAttachments(target_id.to_string()));
        if let Some(error) = self.scripted_failure(target_id) {
            return Err(error);
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .attachments
            .remove(target_id)
            .unwrap_or_default())
    }

    async fn list_custom_fields(&self, _entity: SourceEntity) -> Result<Vec<FieldDescriptor>, RemoteError> {
        self.log(Call::ListCustomFields);
        Ok(Vec::new())
    }
}

/// Options with an immediate retry policy so tests do not sleep
pub fn options() -> ImportOptions {
    ImportOptions {
        retry: RetryConfig::immediate(3),
        request_timeout: Duration::from_secs(5),
        ..ImportOptions::default()
    }
}

/// Parse a `;` separated item file, map it heuristically and prepare it
pub fn plan_from_csv(csv: &str, options: &ImportOptions) -> ImportPlan {
    let table = read_bytes(csv.as_bytes(), &CsvOptions::default()).unwrap();
    let catalog = FieldCatalog::builtin(options.entity);
    let mapping = AutoMapper::new().suggest(&table.columns, &catalog);
    let rules = RuleSet::defaults_for(mapping.mapping(), &catalog);
    let engine = TransformationEngine::default();
    RecordPreparer::new(&catalog, &engine, options).prepare(
        &table.rows,
        &mapping,
        &rules,
        CategoryResolver::default(),
    )
}
