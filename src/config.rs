use crate::api::resilience::RetryConfig;
use crate::import::{ImportMode, ImportOptions};
use crate::transform::TransformContext;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR: &str = "catalog-sync";
const PLACEHOLDER_URL: &str = "https://erp.example.com";

/// Connection and import settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub company: String,
    pub default_warehouse: String,
    pub default_price_list: String,
    pub default_item_group: String,
    pub default_tax_rate: f64,
    pub batch_size: usize,
    /// Per-request timeout in seconds
    pub request_timeout: u64,
    pub max_retries: u32,
    #[serde(alias = "gemini_api_key", skip_serializing_if = "Option::is_none")]
    pub ai_api_key: Option<String>,
    pub fallback_unit: String,
    pub category_delimiter: String,
    pub currency: String,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            base_url: PLACEHOLDER_URL.to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            company: String::new(),
            default_warehouse: String::new(),
            default_price_list: "Standard-Verkauf".to_string(),
            default_item_group: "Alle Artikelgruppen".to_string(),
            default_tax_rate: 19.0,
            batch_size: 50,
            request_timeout: 30,
            max_retries: 3,
            ai_api_key: None,
            fallback_unit: "Stk".to_string(),
            category_delimiter: ">".to_string(),
            currency: "EUR".to_string(),
        }
    }
}

impl ImporterConfig {
    /// Default config file location, `<config_dir>/catalog-sync/config.json`
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.json"))
    }

    /// Load from `path`, or defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", path);

        if !path.exists() {
            info!("Config file {:?} doesn't exist, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: ImporterConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        debug!("Loaded config for {}", config.base_url);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        info!("Config saved to {:?}", path);
        Ok(())
    }

    /// Problems that prevent talking to the remote system
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let url = self.base_url.trim();
        if url.is_empty() || url == PLACEHOLDER_URL {
            errors.push("ERPNext URL must be configured".to_string());
        } else if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push("ERPNext URL must start with http:// or https://".to_string());
        }
        if self.api_key.trim().is_empty() {
            errors.push("API key is missing".to_string());
        }
        if self.api_secret.trim().is_empty() {
            errors.push("API secret is missing".to_string());
        }
        if !(0.0..=100.0).contains(&self.default_tax_rate) {
            errors.push("Tax rate must be between 0 and 100".to_string());
        }
        if self.batch_size == 0 {
            errors.push("Batch size must be at least 1".to_string());
        }

        errors
    }

    /// `Authorization` header value for the Frappe token scheme
    pub fn auth_header(&self) -> String {
        format!("token {}:{}", self.api_key, self.api_secret)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_max_attempts(self.max_retries)
    }

    pub fn transform_context(&self) -> TransformContext {
        TransformContext {
            tax_rate: self.default_tax_rate,
            fallback_unit: self.fallback_unit.clone(),
        }
    }

    pub fn import_options(&self, mode: ImportMode, dry_run: bool) -> ImportOptions {
        ImportOptions {
            mode,
            dry_run,
            batch_size: self.batch_size.max(1),
            request_timeout: self.request_timeout(),
            retry: self.retry_config(),
            default_item_group: self.default_item_group.clone(),
            fallback_unit: self.fallback_unit.clone(),
            ..ImportOptions::default()
        }
    }
}

/// Application config directory, `<config_dir>/catalog-sync`
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(dirs::home_dir)
        .context("Failed to get config directory")?;
    Ok(base.join(APP_DIR))
}
