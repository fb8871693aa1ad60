//! Field transformation engine
//!
//! Turns a source row into target field values by running each mapped
//! field's [`TransformRule`] steps left to right. Failures are isolated per
//! field: a failing step nulls that field and records a [`ConversionError`],
//! every other field is still produced.

pub mod barcode;
pub mod convert;
pub mod rules;
pub mod value;

pub use rules::{RuleSet, TransformRule, TransformStep};
pub use value::FieldValue;

use crate::catalog::builtin::is_category_slot;
use crate::mapping::ValidatedMapping;
use crate::source::SourceRow;
use log::{debug, warn};
use std::collections::BTreeMap;
use thiserror::Error;

/// Parameters the steps depend on
#[derive(Debug, Clone, PartialEq)]
pub struct TransformContext {
    /// VAT rate in percent used by `taxConvert`
    pub tax_rate: f64,
    /// Unit code used when `unitConvert` does not recognise a token
    pub fallback_unit: String,
}

impl Default for TransformContext {
    fn default() -> Self {
        Self {
            tax_rate: 19.0,
            fallback_unit: "Stk".to_string(),
        }
    }
}

/// A transform step could not convert a field value
#[derive(Debug, Clone, PartialEq, Error)]
#[error("field '{field}': {step} failed for '{value}': {reason}")]
pub struct ConversionError {
    pub field: String,
    pub step: TransformStep,
    pub value: String,
    pub reason: String,
}

/// Non-fatal notes produced while transforming
#[derive(Debug, Clone, PartialEq)]
pub enum TransformWarning {
    /// `unitConvert` did not know the token and used the fallback unit
    UnknownUnit {
        field: String,
        value: String,
        fallback: String,
    },
}

impl std::fmt::Display for TransformWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformWarning::UnknownUnit {
                field,
                value,
                fallback,
            } => write!(
                f,
                "field '{}': unknown unit '{}', using '{}'",
                field, value, fallback
            ),
        }
    }
}

/// Result of transforming one row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutput {
    /// One entry per mapped target field (category slots excluded)
    pub values: BTreeMap<String, FieldValue>,
    pub errors: Vec<ConversionError>,
    pub warnings: Vec<TransformWarning>,
}

impl TransformOutput {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransformationEngine {
    context: TransformContext,
}

impl TransformationEngine {
    pub fn new(context: TransformContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &TransformContext {
        &self.context
    }

    /// Transform a row through a validated mapping.
    ///
    /// Empty or missing source values take the rule's default value (or
    /// null) without running any step. Fields without a rule pass through
    /// unchanged.
    pub fn apply(
        &self,
        row: &SourceRow,
        mapping: &ValidatedMapping,
        rules: &RuleSet,
    ) -> TransformOutput {
        let mut output = TransformOutput::default();

        for entry in mapping.mapping().iter() {
            let target = entry.target_field.as_str();
            if is_category_slot(target) {
                continue;
            }

            let raw = row.get(&entry.source_column).unwrap_or_default();
            let rule = rules.rule_for(target);

            let value = if raw.trim().is_empty() {
                rule.and_then(|r| r.default_value.clone())
                    .map(FieldValue::Text)
                    .unwrap_or(FieldValue::Null)
            } else {
                let steps = rule.map(|r| r.steps.as_slice()).unwrap_or_default();
                self.run_steps(target, raw, steps, &mut output)
            };

            output.values.insert(target.to_string(), value);
        }

        if !output.errors.is_empty() {
            debug!(
                "Row {}: {} conversion error(s)",
                row.line,
                output.errors.len()
            );
        }
        output
    }

    fn run_steps(
        &self,
        field: &str,
        raw: &str,
        steps: &[TransformStep],
        output: &mut TransformOutput,
    ) -> FieldValue {
        let mut value = FieldValue::text(raw);

        for &step in steps {
            match self.apply_step(field, step, value, output) {
                Ok(next) => value = next,
                Err(reason) => {
                    let error = ConversionError {
                        field: field.to_string(),
                        step,
                        value: raw.to_string(),
                        reason,
                    };
                    warn!("{}", error);
                    output.errors.push(error);
                    return FieldValue::Null;
                }
            }
        }
        value
    }

    fn apply_step(
        &self,
        field: &str,
        step: TransformStep,
        value: FieldValue,
        output: &mut TransformOutput,
    ) -> Result<FieldValue, String> {
        let result = match (step, value) {
            (TransformStep::Trim, FieldValue::Text(s)) => FieldValue::Text(s.trim().to_string()),
            (TransformStep::Upper, FieldValue::Text(s)) => FieldValue::Text(s.to_uppercase()),
            (TransformStep::Lower, FieldValue::Text(s)) => FieldValue::Text(s.to_lowercase()),
            (TransformStep::StripHtml, FieldValue::Text(s)) => {
                FieldValue::Text(convert::strip_html(&s))
            }

            (TransformStep::ToNumber, FieldValue::Text(s)) => convert::parse_number(&s)
                .map(FieldValue::Number)
                .ok_or_else(|| "not a number".to_string())?,
            (TransformStep::ToNumber, FieldValue::Bool(b)) => {
                FieldValue::Number(if b { 1.0 } else { 0.0 })
            }

            (TransformStep::ToBoolean, FieldValue::Text(s)) => convert::parse_bool(&s)
                .map(FieldValue::Bool)
                .ok_or_else(|| "not a boolean".to_string())?,
            (TransformStep::ToBoolean, FieldValue::Number(n)) => FieldValue::Bool(n != 0.0),

            (TransformStep::UnitConvert, FieldValue::Text(s)) => {
                match convert::canonical_unit(&s) {
                    Some(code) => FieldValue::text(code),
                    None => {
                        let fallback = self.context.fallback_unit.clone();
                        output.warnings.push(TransformWarning::UnknownUnit {
                            field: field.to_string(),
                            value: s,
                            fallback: fallback.clone(),
                        });
                        FieldValue::Text(fallback)
                    }
                }
            }

            (TransformStep::TaxConvert, FieldValue::Number(n)) => {
                FieldValue::Number(convert::net_from_gross(n, self.context.tax_rate))
            }
            (TransformStep::TaxConvert, FieldValue::Text(s)) => convert::parse_number(&s)
                .map(|n| FieldValue::Number(convert::net_from_gross(n, self.context.tax_rate)))
                .ok_or_else(|| "gross price is not a number".to_string())?,

            (TransformStep::Trim | TransformStep::Upper | TransformStep::Lower, other)
            | (TransformStep::StripHtml, other)
            | (TransformStep::ToNumber, other @ FieldValue::Number(_))
            | (TransformStep::ToBoolean, other @ FieldValue::Bool(_))
            | (_, other @ FieldValue::Null) => other,

            (step, other) => {
                return Err(format!("cannot apply {} to {:?}", step, other));
            }
        };
        Ok(result)
    }
}
