//! Command handlers

pub mod config;
pub mod fields;
pub mod images;
pub mod import;
pub mod map;

pub use config::{check_command, init_command, path_command};
pub use fields::fields_command;
pub use images::images_command;
pub use import::import_command;
pub use map::map_command;

use crate::api::RemoteCatalog;
use crate::catalog::{FieldCatalog, SourceEntity, builtin};
use crate::config::ImporterConfig;
use crate::import::{DEFAULT_FAILURE_DETAILS, ImportResult, ImportSummary};
use crate::mapping::ValidatedMapping;
use crate::source::CsvOptions;
use anyhow::{Result, bail};
use colored::*;
use log::warn;
use std::path::{Path, PathBuf};

/// Load the config from `path` or the default location
pub fn load_config(path: Option<&Path>) -> Result<(ImporterConfig, PathBuf)> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => ImporterConfig::default_path()?,
    };
    let config = ImporterConfig::load(&path)?;
    Ok((config, path))
}

/// Fail early when the config cannot reach the remote system
pub(crate) fn ensure_valid(config: &ImporterConfig, config_path: &Path) -> Result<()> {
    let problems = config.validate();
    if problems.is_empty() {
        return Ok(());
    }
    for problem in &problems {
        println!("  {} {}", "✗".red(), problem);
    }
    bail!(
        "Configuration in {} is incomplete. Run 'catalog-sync config check' for details.",
        config_path.display()
    )
}

/// Built-in fields merged with the custom fields of the remote system.
///
/// A failed lookup only costs the custom fields.
pub(crate) async fn load_catalog(remote: &dyn RemoteCatalog, entity: SourceEntity) -> FieldCatalog {
    let custom = match remote.list_custom_fields(entity).await {
        Ok(fields) => fields,
        Err(e) => {
            warn!("Custom fields unavailable: {}", e);
            println!("  {} custom fields unavailable ({}), using built-in fields", "!".yellow(), e);
            Vec::new()
        }
    };
    FieldCatalog::load(builtin::fields_for(entity), custom)
}

pub(crate) fn csv_options(base: CsvOptions, delimiter: Option<char>, encoding: Option<String>) -> CsvOptions {
    CsvOptions {
        delimiter: delimiter.unwrap_or(base.delimiter),
        encoding: encoding.unwrap_or(base.encoding),
    }
}

pub(crate) fn print_mapping(mapping: &ValidatedMapping) {
    println!("🔗 Mapping ({:?}):", mapping.origin());
    if mapping.mapping().is_empty() {
        println!("  {}", "no columns mapped".dimmed());
    }
    for entry in mapping.mapping().iter() {
        println!("  {:<30} → {}", entry.source_column, entry.target_field.bright_green());
    }
    for warning in mapping.warnings() {
        println!("  {} {}", "!".yellow(), warning);
    }
}

pub(crate) fn print_summary(summary: &ImportSummary, results: &[ImportResult]) {
    println!();
    println!("📊 {}", summary.to_string().bold());
    if summary.warnings > 0 {
        println!("   {} warning(s), see log for details", summary.warnings.to_string().yellow());
    }
    for failure in &summary.failures {
        println!("   {} {}", "✗".red(), failure);
    }
    if summary.failed > summary.failures.len() {
        println!("   ... and {} more failures", summary.failed - summary.failures.len());
    }
    if results.is_empty() {
        println!("   {}", "nothing to do".dimmed());
    } else {
        let rate = format!("{:.1}%", summary.success_rate());
        let rate = if summary.has_failures() { rate.yellow() } else { rate.green() };
        println!("   success rate: {}", rate);
    }
}

pub(crate) fn summarize(results: &[ImportResult]) -> ImportSummary {
    ImportSummary::from_results(results, DEFAULT_FAILURE_DETAILS)
}
