//! Named mapping templates
//!
//! A template stores a [`FieldMapping`] together with its transform rules and
//! the source file options, so recurring supplier files can be imported
//! without remapping.

use super::FieldMapping;
use crate::catalog::SourceEntity;
use crate::config::config_dir;
use crate::source::CsvOptions;
use crate::transform::RuleSet;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingTemplate {
    pub name: String,
    #[serde(default = "default_entity")]
    pub entity: SourceEntity,
    pub mapping: FieldMapping,
    #[serde(default)]
    pub rules: RuleSet,
    #[serde(default = "default_delimiter")]
    pub csv_delimiter: char,
    #[serde(default = "default_encoding")]
    pub csv_encoding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_entity() -> SourceEntity {
    SourceEntity::Item
}

fn default_delimiter() -> char {
    ';'
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

impl MappingTemplate {
    pub fn new(name: impl Into<String>, mapping: FieldMapping, rules: RuleSet) -> Self {
        Self {
            name: name.into(),
            entity: SourceEntity::Item,
            mapping,
            rules,
            csv_delimiter: default_delimiter(),
            csv_encoding: default_encoding(),
            created_at: Some(Utc::now()),
        }
    }

    pub fn with_csv_options(mut self, options: &CsvOptions) -> Self {
        self.csv_delimiter = options.delimiter;
        self.csv_encoding = options.encoding.clone();
        self
    }

    pub fn csv_options(&self) -> CsvOptions {
        CsvOptions {
            delimiter: self.csv_delimiter,
            encoding: self.csv_encoding.clone(),
        }
    }
}

/// File name stem for a template name: lowercase alphanumerics and `_`
pub fn slug(name: &str) -> String {
    let mut slug = String::new();
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

/// Directory of saved templates
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under `<config_dir>/catalog-sync/templates`
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(config_dir()?.join("templates")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        let slug = slug(name);
        if slug.is_empty() {
            bail!("Template name '{}' has no usable characters", name);
        }
        Ok(self.dir.join(format!("template_{}.json", slug)))
    }

    pub fn save(&self, template: &MappingTemplate) -> Result<PathBuf> {
        let path = self.path_for(&template.name)?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create template directory: {:?}", self.dir))?;

        let content = serde_json::to_string_pretty(template)
            .context("Failed to serialize template to JSON")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write template file: {:?}", path))?;

        info!("Template '{}' saved to {:?}", template.name, path);
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<MappingTemplate> {
        let path = self.path_for(name)?;
        Self::load_file(&path).with_context(|| format!("Template '{}' not found", name))
    }

    pub fn load_file(path: &Path) -> Result<MappingTemplate> {
        debug!("Loading template from {:?}", path);
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read template file: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse template file: {:?}", path))
    }

    /// Names of all saved templates, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read template directory: {:?}", self.dir))?
        {
            let path = entry?.path();
            let is_template = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("template_") && n.ends_with(".json"));
            if !is_template {
                continue;
            }
            match Self::load_file(&path) {
                Ok(template) => names.push(template.name),
                Err(e) => log::warn!("Skipping unreadable template {:?}: {:#}", path, e),
            }
        }
        names.sort();
        Ok(names)
    }
}
