//! Target field catalog
//!
//! Describes the fields of the remote entities an import can write to: a fixed
//! set of built-in fields per entity merged with the custom fields discovered
//! on the remote system at runtime.

pub mod builtin;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value kind of a target field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    Date,
}

impl FieldKind {
    /// Map a remote (Frappe) fieldtype onto a field kind
    pub fn from_remote_type(fieldtype: &str) -> Self {
        match fieldtype {
            "Int" | "Float" | "Currency" | "Percent" => FieldKind::Number,
            "Check" => FieldKind::Boolean,
            "Date" | "Datetime" => FieldKind::Date,
            _ => FieldKind::Text,
        }
    }
}

/// Remote entity a field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceEntity {
    Item,
    ItemGroup,
    /// Item created from a template item with attribute values
    ItemVariant,
    ItemAttribute,
}

impl SourceEntity {
    /// Remote doctype name for this entity
    pub fn doctype(&self) -> &'static str {
        match self {
            SourceEntity::Item | SourceEntity::ItemVariant => "Item",
            SourceEntity::ItemGroup => "Item Group",
            SourceEntity::ItemAttribute => "Item Attribute",
        }
    }

    /// Field holding the natural key of a record of this entity
    pub fn natural_key_field(&self) -> &'static str {
        match self {
            SourceEntity::Item | SourceEntity::ItemVariant => "item_code",
            SourceEntity::ItemGroup => "item_group_name",
            SourceEntity::ItemAttribute => "attribute_name",
        }
    }
}

impl std::fmt::Display for SourceEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceEntity::Item => f.write_str("item"),
            SourceEntity::ItemGroup => f.write_str("item-group"),
            SourceEntity::ItemVariant => f.write_str("item-variant"),
            SourceEntity::ItemAttribute => f.write_str("item-attribute"),
        }
    }
}

/// Description of a single target field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub is_custom: bool,
    pub source_entity: SourceEntity,
}

impl FieldDescriptor {
    /// Create a built-in, optional field
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        kind: FieldKind,
        source_entity: SourceEntity,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            required: false,
            is_custom: false,
            source_entity,
        }
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the field as a custom field
    pub fn custom(mut self) -> Self {
        self.is_custom = true;
        self
    }
}

/// Immutable set of target fields for one import run.
///
/// Refreshing the catalog means building a new one with [`FieldCatalog::load`].
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
    warnings: Vec<String>,
}

impl FieldCatalog {
    /// Merge built-in fields with remotely discovered custom fields.
    ///
    /// Custom fields are tagged `is_custom`. A custom field whose name collides
    /// with a built-in (or an earlier custom field) is dropped with a warning.
    pub fn load(builtin: Vec<FieldDescriptor>, custom: Vec<FieldDescriptor>) -> Self {
        let mut catalog = Self::default();

        for field in builtin {
            if catalog.by_name.contains_key(&field.name) {
                warn!("Duplicate built-in field '{}' ignored", field.name);
                continue;
            }
            catalog.push(field);
        }

        for mut field in custom {
            field.is_custom = true;
            if field.name.trim().is_empty() {
                catalog.warnings.push("Custom field without a name dropped".to_string());
                continue;
            }
            if catalog.by_name.contains_key(&field.name) {
                let message = format!(
                    "Custom field '{}' collides with an existing field and was dropped",
                    field.name
                );
                warn!("{}", message);
                catalog.warnings.push(message);
                continue;
            }
            catalog.push(field);
        }

        debug!(
            "Field catalog loaded: {} fields ({} custom, {} warnings)",
            catalog.fields.len(),
            catalog.fields.iter().filter(|f| f.is_custom).count(),
            catalog.warnings.len()
        );
        catalog
    }

    /// Catalog containing only the built-in fields of an entity
    pub fn builtin(entity: SourceEntity) -> Self {
        Self::load(builtin::fields_for(entity), Vec::new())
    }

    fn push(&mut self, field: FieldDescriptor) {
        self.by_name.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All fields in load order (built-ins first)
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn custom_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_custom)
    }

    /// Warnings produced while merging (dropped custom fields)
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
