//! Record preparation
//!
//! Runs the transformation engine and the category resolver over every
//! source row and applies the entity-specific finishing rules (gross price,
//! barcode, active flag, defaults, variant attributes) before required fields
//! are checked.

use super::{ImportErrorKind, ImportOptions};
use crate::api::RecordFields;
use crate::catalog::builtin::{VARIANT_ATTRIBUTE_FIELDS, VARIANT_FREE_ATTRIBUTE_FIELDS};
use crate::catalog::{FieldCatalog, SourceEntity};
use crate::category::{CategoryId, CategoryInput, CategoryResolver, CategoryTree};
use crate::mapping::ValidatedMapping;
use crate::source::SourceRow;
use crate::transform::barcode::is_valid_barcode;
use crate::transform::{FieldValue, RuleSet, TransformationEngine};
use log::{debug, info, warn};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Why a record cannot be written
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub kind: ImportErrorKind,
    pub message: String,
}

/// One source row ready for the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub line: usize,
    pub natural_key: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
    /// Fallbacks sent only when the record is created, never on update
    pub create_defaults: BTreeMap<String, FieldValue>,
    /// `(attribute, value)` pairs of a variant; only sent on create
    pub variant_attributes: Vec<(String, String)>,
    /// Root-to-leaf category chain in the plan's [`CategoryTree`]
    pub category_path: Vec<CategoryId>,
    pub warnings: Vec<String>,
    pub rejection: Option<Rejection>,
}

impl SourceRecord {
    pub fn is_writable(&self) -> bool {
        self.rejection.is_none()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Value of `field`, falling back to its create default
    pub fn get_or_default(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .get(field)
            .filter(|v| !v.is_empty())
            .or_else(|| self.create_defaults.get(field))
    }

    /// Fields sent when updating an existing record
    pub fn to_remote_fields(&self) -> RecordFields {
        self.fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }

    /// Fields sent when creating the record: the mapped fields with the
    /// create defaults filling the blanks
    pub fn to_create_fields(&self) -> RecordFields {
        let mut fields = self.to_remote_fields();
        for (name, value) in &self.create_defaults {
            let blank = fields
                .get(name)
                .is_none_or(|v| v.is_null() || v.as_str().is_some_and(|s| s.trim().is_empty()));
            if blank {
                fields.insert(name.clone(), value.to_json());
            }
        }
        if !self.variant_attributes.is_empty() {
            let attributes = self
                .variant_attributes
                .iter()
                .map(|(attribute, value)| json!({ "attribute": attribute, "attribute_value": value }))
                .collect();
            fields.insert("attributes".to_string(), Value::Array(attributes));
        }
        fields
    }
}

/// Prepared records plus the category tree they point into
#[derive(Debug, Clone, Default)]
pub struct ImportPlan {
    pub records: Vec<SourceRecord>,
    pub categories: CategoryTree,
}

impl ImportPlan {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct RecordPreparer<'a> {
    catalog: &'a FieldCatalog,
    engine: &'a TransformationEngine,
    options: &'a ImportOptions,
}

impl<'a> RecordPreparer<'a> {
    pub fn new(
        catalog: &'a FieldCatalog,
        engine: &'a TransformationEngine,
        options: &'a ImportOptions,
    ) -> Self {
        Self {
            catalog,
            engine,
            options,
        }
    }

    /// Prepare all rows; every row yields exactly one record
    pub fn prepare(
        &self,
        rows: &[SourceRow],
        mapping: &ValidatedMapping,
        rules: &RuleSet,
        mut resolver: CategoryResolver,
    ) -> ImportPlan {
        let records: Vec<SourceRecord> = rows
            .iter()
            .map(|row| self.prepare_row(row, mapping, rules, &mut resolver))
            .collect();

        let rejected = records.iter().filter(|r| !r.is_writable()).count();
        info!(
            "Prepared {} records ({} rejected, {} categories)",
            records.len(),
            rejected,
            resolver.tree().len()
        );

        ImportPlan {
            records,
            categories: resolver.tree().clone(),
        }
    }

    fn prepare_row(
        &self,
        row: &SourceRow,
        mapping: &ValidatedMapping,
        rules: &RuleSet,
        resolver: &mut CategoryResolver,
    ) -> SourceRecord {
        let output = self.engine.apply(row, mapping, rules);
        let mut fields = output.values;
        let mut create_defaults = BTreeMap::new();
        let mut variant_attributes = Vec::new();
        let mut warnings: Vec<String> = output.errors.iter().map(ToString::to_string).collect();
        warnings.extend(output.warnings.iter().map(ToString::to_string));

        let category_path = match self.options.entity {
            SourceEntity::Item => {
                let chain = resolver.resolve(&CategoryInput::from_row(row, mapping.mapping()));
                self.finish_item(&mut fields, &mut create_defaults, !chain.is_empty(), &mut warnings);
                chain
            }
            SourceEntity::ItemVariant => {
                finish_sales_fields(&mut fields, &mut warnings);
                variant_attributes = take_variant_attributes(&mut fields, &mut warnings);
                Vec::new()
            }
            SourceEntity::ItemGroup | SourceEntity::ItemAttribute => Vec::new(),
        };

        let natural_key = fields
            .get(self.options.entity.natural_key_field())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string().trim().to_string());

        let missing: Vec<&str> = self
            .catalog
            .required_fields()
            .map(|f| f.name.as_str())
            .filter(|name| {
                fields.get(*name).is_none_or(FieldValue::is_empty)
                    && create_defaults.get(*name).is_none_or(FieldValue::is_empty)
            })
            .collect();

        let rejection = if missing.is_empty() {
            (self.options.entity == SourceEntity::ItemVariant && variant_attributes.is_empty()).then(|| {
                let rejection = Rejection {
                    kind: ImportErrorKind::ValidationError,
                    message: "variant has no attribute values".to_string(),
                };
                warn!("Row {}: {}", row.line, rejection.message);
                rejection
            })
        } else {
            let failed_conversion = output
                .errors
                .iter()
                .any(|e| missing.contains(&e.field.as_str()));
            let rejection = Rejection {
                kind: if failed_conversion {
                    ImportErrorKind::ConversionError
                } else {
                    ImportErrorKind::ValidationError
                },
                message: format!("missing required field(s): {}", missing.join(", ")),
            };
            warn!("Row {}: {}", row.line, rejection.message);
            Some(rejection)
        };

        debug!("Row {} prepared ({} fields)", row.line, fields.len());
        SourceRecord {
            line: row.line,
            natural_key,
            fields,
            create_defaults,
            variant_attributes,
            category_path,
            warnings,
            rejection,
        }
    }

    /// Item rules applied after transformation.
    ///
    /// Fallbacks for name, unit and group go to `create_defaults` so an
    /// update never overwrites what the existing item already has.
    fn finish_item(
        &self,
        fields: &mut BTreeMap<String, FieldValue>,
        create_defaults: &mut BTreeMap<String, FieldValue>,
        has_category: bool,
        warnings: &mut Vec<String>,
    ) {
        finish_sales_fields(fields, warnings);

        if let Some(html) = fields.remove("description_html") {
            if !html.is_empty() && is_blank(fields, "description") {
                fields.insert("description".to_string(), html);
            }
        }

        if is_blank(fields, "item_name") {
            if let Some(code) = fields.get("item_code").filter(|v| !v.is_empty()).cloned() {
                create_defaults.insert("item_name".to_string(), code);
            }
        }

        if is_blank(fields, "stock_uom") {
            create_defaults.insert(
                "stock_uom".to_string(),
                FieldValue::text(&self.options.fallback_unit),
            );
        }

        // With a category path the orchestrator sets the group once the
        // category exists remotely.
        if !has_category && is_blank(fields, "item_group") {
            create_defaults.insert(
                "item_group".to_string(),
                FieldValue::text(&self.options.default_item_group),
            );
        }
    }
}

fn is_blank(fields: &BTreeMap<String, FieldValue>, name: &str) -> bool {
    fields.get(name).is_none_or(FieldValue::is_empty)
}

/// Rules shared by items and variants: gross price, barcode and the
/// inverted active flag
fn finish_sales_fields(fields: &mut BTreeMap<String, FieldValue>, warnings: &mut Vec<String>) {
    if let Some(gross) = fields.remove("standard_rate_brutto") {
        if !gross.is_null() && is_blank(fields, "standard_rate") {
            fields.insert("standard_rate".to_string(), gross);
        }
    }

    if let Some(FieldValue::Text(code)) = fields.remove("barcode") {
        let code = code.trim().to_string();
        if is_valid_barcode(&code) {
            if is_blank(fields, "gtin") {
                fields.insert("gtin".to_string(), FieldValue::Text(code));
            }
        } else if !code.is_empty() {
            warnings.push(format!("barcode '{}' ignored: not a valid GTIN", code));
        }
    }

    // Active is the inverse of the remote `disabled` flag; an explicit
    // disabled column takes precedence
    match fields.remove("is_active") {
        Some(FieldValue::Bool(active)) => {
            if is_blank(fields, "disabled") {
                fields.insert("disabled".to_string(), FieldValue::Bool(!active));
            } else {
                warnings.push("active flag ignored: disabled is mapped as well".to_string());
            }
        }
        Some(FieldValue::Null) | None => {}
        Some(other) => warnings.push(format!("active flag '{}' ignored: not a yes/no value", other)),
    }
}

/// Move the attribute columns of a variant into `(attribute, value)` pairs.
///
/// Fixed columns name their attribute; free columns carry `Name:Value`.
fn take_variant_attributes(
    fields: &mut BTreeMap<String, FieldValue>,
    warnings: &mut Vec<String>,
) -> Vec<(String, String)> {
    let mut attributes = Vec::new();

    for (field, attribute) in VARIANT_ATTRIBUTE_FIELDS {
        if let Some(value) = fields.remove(field).filter(|v| !v.is_empty()) {
            attributes.push((attribute.to_string(), value.to_string().trim().to_string()));
        }
    }

    for field in VARIANT_FREE_ATTRIBUTE_FIELDS {
        let Some(value) = fields.remove(field).filter(|v| !v.is_empty()) else {
            continue;
        };
        let text = value.to_string();
        match text.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() && !value.trim().is_empty() => {
                attributes.push((name.trim().to_string(), value.trim().to_string()));
            }
            _ => warnings.push(format!("{} '{}' ignored: expected Name:Value", field, text.trim())),
        }
    }

    attributes
}
