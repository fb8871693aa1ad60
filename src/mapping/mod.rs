//! Column-to-field mappings
//!
//! A [`FieldMapping`] is the editable, persistable association of source
//! columns to target field names. Whatever produced it (the heuristic
//! [`AutoMapper`], an AI suggestion, a saved template or manual edits), it
//! has to pass [`validate`] before the transformation engine will use it; the
//! result of that gate is a [`ValidatedMapping`].

pub mod ai;
pub mod auto;
pub mod template;

pub use ai::{AiMappingAdapter, GeminiSuggester, MappingSuggester};
pub use auto::AutoMapper;
pub use template::{MappingTemplate, TemplateStore};

use crate::catalog::FieldCatalog;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Single `source column -> target field` association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub source_column: String,
    pub target_field: String,
}

/// Ordered mapping of source columns to target fields.
///
/// Each source column appears at most once, and each target field receives at
/// most one column: inserting a second column for an already mapped target
/// replaces the earlier column (last write wins) and reports a warning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    entries: Vec<MappingEntry>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `source_column` to `target_field`.
    ///
    /// Re-mapping a column keeps its position. Returns a warning when another
    /// column previously fed the same target and was displaced.
    pub fn insert(
        &mut self,
        source_column: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Option<MappingWarning> {
        let source_column = source_column.into();
        let target_field = target_field.into();

        let displaced = self
            .entries
            .iter()
            .position(|e| e.target_field == target_field && e.source_column != source_column)
            .map(|i| self.entries.remove(i));

        match self.entries.iter_mut().find(|e| e.source_column == source_column) {
            Some(entry) => entry.target_field = target_field.clone(),
            None => self.entries.push(MappingEntry {
                source_column: source_column.clone(),
                target_field: target_field.clone(),
            }),
        }

        displaced.map(|old| MappingWarning::DuplicateTarget {
            target_field,
            dropped_column: old.source_column,
            kept_column: source_column,
        })
    }

    /// Remove the mapping of a source column, returning its target
    pub fn remove(&mut self, source_column: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|e| e.source_column == source_column)?;
        Some(self.entries.remove(index).target_field)
    }

    pub fn target_for(&self, source_column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.source_column == source_column)
            .map(|e| e.target_field.as_str())
    }

    pub fn source_for(&self, target_field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.target_field == target_field)
            .map(|e| e.source_column.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.iter()
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.target_field.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>, T: Into<String>> FromIterator<(S, T)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        let mut mapping = FieldMapping::new();
        for (source, target) in iter {
            mapping.insert(source, target);
        }
        mapping
    }
}

/// Where a mapping proposal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingOrigin {
    Heuristic,
    Ai,
    Template,
    Manual,
}

/// Problems found while validating a mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingWarning {
    /// Two columns targeted the same field; the later one was kept
    DuplicateTarget {
        target_field: String,
        dropped_column: String,
        kept_column: String,
    },
    /// The proposal referenced a field the catalog does not know
    UnknownTarget {
        source_column: String,
        target_field: String,
    },
    /// The proposal referenced a column the source does not have
    UnknownColumn { source_column: String },
    /// A required field has no source column
    MissingRequired { target_field: String },
}

impl fmt::Display for MappingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingWarning::DuplicateTarget {
                target_field,
                dropped_column,
                kept_column,
            } => write!(
                f,
                "field '{}' mapped twice: '{}' replaces '{}'",
                target_field, kept_column, dropped_column
            ),
            MappingWarning::UnknownTarget {
                source_column,
                target_field,
            } => write!(
                f,
                "column '{}' rejected: unknown target field '{}'",
                source_column, target_field
            ),
            MappingWarning::UnknownColumn { source_column } => {
                write!(f, "column '{}' does not exist in the source", source_column)
            }
            MappingWarning::MissingRequired { target_field } => {
                write!(f, "required field '{}' is not mapped", target_field)
            }
        }
    }
}

/// A mapping that passed the validation gate
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMapping {
    mapping: FieldMapping,
    origin: MappingOrigin,
    warnings: Vec<MappingWarning>,
}

impl ValidatedMapping {
    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    pub fn origin(&self) -> MappingOrigin {
        self.origin
    }

    pub fn warnings(&self) -> &[MappingWarning] {
        &self.warnings
    }

    /// Required fields left without a source column
    pub fn missing_required(&self) -> Vec<&str> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                MappingWarning::MissingRequired { target_field } => Some(target_field.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn into_mapping(self) -> FieldMapping {
        self.mapping
    }
}

/// The single validation gate every mapping passes before use.
///
/// Each proposed pair is checked on its own: pairs naming a column absent from
/// `source_columns` or a field absent from `catalog` are rejected, the rest
/// are inserted in order so duplicate targets resolve last-write-wins with a
/// warning. Unmapped required fields are reported but do not fail the gate;
/// records missing them fail individually later.
pub fn validate<'a>(
    proposal: impl IntoIterator<Item = (&'a str, &'a str)>,
    origin: MappingOrigin,
    source_columns: &[String],
    catalog: &FieldCatalog,
) -> ValidatedMapping {
    let known_columns: HashSet<&str> = source_columns.iter().map(String::as_str).collect();
    let mut mapping = FieldMapping::new();
    let mut warnings = Vec::new();

    for (source_column, target_field) in proposal {
        if !known_columns.contains(source_column) {
            warnings.push(MappingWarning::UnknownColumn {
                source_column: source_column.to_string(),
            });
            continue;
        }
        if !catalog.contains(target_field) {
            warnings.push(MappingWarning::UnknownTarget {
                source_column: source_column.to_string(),
                target_field: target_field.to_string(),
            });
            continue;
        }
        if let Some(warning) = mapping.insert(source_column, target_field) {
            warnings.push(warning);
        }
    }

    for field in catalog.required_fields() {
        if mapping.source_for(&field.name).is_none() {
            warnings.push(MappingWarning::MissingRequired {
                target_field: field.name.clone(),
            });
        }
    }

    for warning in &warnings {
        warn!("Mapping ({:?}): {}", origin, warning);
    }
    debug!("Validated {:?} mapping with {} entries", origin, mapping.len());

    ValidatedMapping {
        mapping,
        origin,
        warnings,
    }
}

/// Validate an existing [`FieldMapping`] (template or manual edits)
pub fn validate_mapping(
    mapping: &FieldMapping,
    origin: MappingOrigin,
    source_columns: &[String],
    catalog: &FieldCatalog,
) -> ValidatedMapping {
    validate(
        mapping
            .iter()
            .map(|e| (e.source_column.as_str(), e.target_field.as_str())),
        origin,
        source_columns,
        catalog,
    )
}
