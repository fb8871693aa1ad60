//! Transform rules and rule sets

use crate::catalog::builtin::is_category_slot;
use crate::catalog::{FieldCatalog, FieldKind};
use crate::mapping::FieldMapping;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a field's transform pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformStep {
    Trim,
    Upper,
    Lower,
    ToNumber,
    ToBoolean,
    StripHtml,
    UnitConvert,
    TaxConvert,
}

impl fmt::Display for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransformStep::Trim => "trim",
            TransformStep::Upper => "upper",
            TransformStep::Lower => "lower",
            TransformStep::ToNumber => "toNumber",
            TransformStep::ToBoolean => "toBoolean",
            TransformStep::StripHtml => "stripHtml",
            TransformStep::UnitConvert => "unitConvert",
            TransformStep::TaxConvert => "taxConvert",
        };
        f.write_str(name)
    }
}

/// Steps and default value for a single target field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRule {
    pub target_field: String,
    #[serde(default)]
    pub steps: Vec<TransformStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl TransformRule {
    pub fn new(target_field: impl Into<String>, steps: Vec<TransformStep>) -> Self {
        Self {
            target_field: target_field.into(),
            steps,
            default_value: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Rules keyed by target field; at most one rule per field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<TransformRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, replacing any existing rule for the same field
    pub fn insert(&mut self, rule: TransformRule) {
        match self
            .rules
            .iter_mut()
            .find(|r| r.target_field == rule.target_field)
        {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn rule_for(&self, target_field: &str) -> Option<&TransformRule> {
        self.rules.iter().find(|r| r.target_field == target_field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Default rules for every mapped field, derived from field kind and name.
    ///
    /// Category slots get no rule; they are read by the category resolver.
    pub fn defaults_for(mapping: &FieldMapping, catalog: &FieldCatalog) -> Self {
        let mut rules = RuleSet::new();
        for target in mapping.targets() {
            if is_category_slot(target) {
                continue;
            }
            let kind = catalog
                .get(target)
                .map(|f| f.kind)
                .unwrap_or(FieldKind::Text);
            rules.insert(TransformRule::new(target, default_steps(target, kind)));
        }
        rules
    }

    /// Fill in default rules for mapped fields that have none yet
    pub fn with_defaults(mut self, mapping: &FieldMapping, catalog: &FieldCatalog) -> Self {
        for rule in RuleSet::defaults_for(mapping, catalog).rules {
            if self.rule_for(&rule.target_field).is_none() {
                self.rules.push(rule);
            }
        }
        self
    }
}

fn default_steps(target: &str, kind: FieldKind) -> Vec<TransformStep> {
    use TransformStep::*;
    match target {
        "standard_rate_brutto" => vec![Trim, ToNumber, TaxConvert],
        "stock_uom" => vec![Trim, UnitConvert],
        "description_html" => vec![StripHtml],
        _ => match kind {
            FieldKind::Number => vec![Trim, ToNumber],
            FieldKind::Boolean => vec![Trim, ToBoolean],
            FieldKind::Text | FieldKind::Date => vec![Trim],
        },
    }
}
