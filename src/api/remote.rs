//! The remote catalog the import pipeline writes to

use super::error::RemoteError;
use crate::catalog::{FieldDescriptor, SourceEntity};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;

/// Field values of a record as sent to the remote system
pub type RecordFields = Map<String, Value>;

/// Write access to a remote catalog.
///
/// Every call may fail with a [`RemoteError`]; whether the failure is
/// transient is decided by its retry classification.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Verify connectivity and credentials, returning the logged-in user
    async fn check_connection(&self) -> Result<String, RemoteError>;

    /// Remote id of the record with this natural key, if it exists
    async fn exists(&self, entity: SourceEntity, natural_key: &str)
    -> Result<Option<String>, RemoteError>;

    /// Create a record, returning its remote id
    async fn create(&self, entity: SourceEntity, fields: &RecordFields)
    -> Result<String, RemoteError>;

    async fn update(
        &self,
        entity: SourceEntity,
        id: &str,
        fields: &RecordFields,
    ) -> Result<(), RemoteError>;

    /// Remote id of an existing category with this label
    async fn find_category(&self, label: &str) -> Result<Option<String>, RemoteError>;

    /// Create a category below `parent_id` (or the root group)
    async fn create_category(
        &self,
        parent_id: Option<&str>,
        label: &str,
    ) -> Result<String, RemoteError>;

    async fn upload_image(
        &self,
        target_id: &str,
        file: &Path,
        is_primary: bool,
    ) -> Result<(), RemoteError>;

    /// Remove all files attached to a record and clear its main image,
    /// returning how many attachments were deleted
    async fn delete_attachments(&self, target_id: &str) -> Result<usize, RemoteError>;

    async fn list_custom_fields(
        &self,
        entity: SourceEntity,
    ) -> Result<Vec<FieldDescriptor>, RemoteError>;
}
