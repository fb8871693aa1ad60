use super::import::{propose_mapping, source_options};
use super::{load_catalog, print_mapping};
use crate::api::ErpNextClient;
use crate::catalog::FieldCatalog;
use crate::cli::app::MapArgs;
use crate::config::ImporterConfig;
use crate::mapping::{MappingTemplate, TemplateStore};
use crate::source::read_source;
use crate::transform::RuleSet;
use anyhow::Result;
use colored::*;
use log::info;

/// Print the proposed mapping for a file and optionally save it as template
pub async fn map_command(config: &ImporterConfig, args: MapArgs) -> Result<()> {
    info!("Proposing mapping for {}", args.file.display());

    let options = source_options(args.delimiter, args.encoding.clone());
    let table = read_source(&args.file, &options)?;
    println!(
        "📥 {} columns, {} rows in {}",
        table.columns.len(),
        table.len(),
        args.file.display().to_string().cyan()
    );

    let catalog = if config.validate().is_empty() {
        let client = ErpNextClient::new(config)?;
        load_catalog(&client, args.entity).await
    } else {
        println!("  {} no usable connection configured, using built-in fields", "!".yellow());
        FieldCatalog::builtin(args.entity)
    };

    let mapping = propose_mapping(config, &table, &catalog, args.ai).await?;
    print_mapping(&mapping);

    let unmapped: Vec<&str> = table
        .columns
        .iter()
        .map(String::as_str)
        .filter(|c| mapping.mapping().target_for(c).is_none())
        .collect();
    if !unmapped.is_empty() {
        println!("  {} {}", "unmapped:".dimmed(), unmapped.join(", ").dimmed());
    }

    if let Some(name) = args.save_template {
        let rules = RuleSet::defaults_for(mapping.mapping(), &catalog);
        let mut template =
            MappingTemplate::new(name, mapping.into_mapping(), rules).with_csv_options(&options);
        template.entity = args.entity;
        let path = TemplateStore::default_location()?.save(&template)?;
        println!("💾 Template saved to: {}", path.display().to_string().bright_green());
    }

    Ok(())
}
