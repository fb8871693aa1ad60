use super::{csv_options, ensure_valid, load_catalog, print_mapping, print_summary, summarize};
use crate::api::{ErpNextClient, RemoteCatalog};
use crate::catalog::{FieldCatalog, SourceEntity};
use crate::category::CategoryResolver;
use crate::cli::app::ImportArgs;
use crate::config::ImporterConfig;
use crate::import::{BatchImportOrchestrator, ImportSummary, RecordPreparer};
use crate::mapping::{
    AiMappingAdapter, AutoMapper, GeminiSuggester, MappingOrigin, TemplateStore, ValidatedMapping,
    validate_mapping,
};
use crate::source::{CsvOptions, SourceTable, read_source};
use crate::transform::{RuleSet, TransformationEngine};
use anyhow::{Context, Result, bail};
use colored::*;
use log::info;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Import a source file, returning the run summary
pub async fn import_command(
    config: &ImporterConfig,
    config_path: &Path,
    args: ImportArgs,
    cancel: CancellationToken,
) -> Result<ImportSummary> {
    info!("Import of {} requested ({} mode)", args.file.display(), args.mode);
    if !args.dry_run {
        ensure_valid(config, config_path)?;
    }

    let template = match &args.template {
        Some(name) => {
            let template = TemplateStore::default_location()?.load(name)?;
            println!("📄 Using template: {}", template.name.cyan());
            Some(template)
        }
        None => None,
    };

    let base_options = template
        .as_ref()
        .map(|t| t.csv_options())
        .unwrap_or_default();
    let source_options = csv_options(base_options, args.delimiter, args.encoding.clone());
    let table = read_source(&args.file, &source_options)?;
    println!(
        "📥 Read {} rows with {} columns from {}",
        table.len(),
        table.columns.len(),
        args.file.display().to_string().cyan()
    );

    let entity = match (args.entity, template.as_ref().map(|t| t.entity)) {
        (Some(requested), Some(saved)) if requested != saved => {
            bail!("Template maps {} records, not {}", saved, requested)
        }
        (requested, saved) => requested.or(saved).unwrap_or(SourceEntity::Item),
    };
    let client = Arc::new(ErpNextClient::new(config)?);

    // Custom fields are a remote read, so dry runs stick to the built-ins.
    let catalog = if args.dry_run {
        FieldCatalog::builtin(entity)
    } else {
        load_catalog(client.as_ref(), entity).await
    };

    let (mapping, rules) = match &template {
        Some(template) => {
            let mapping = validate_mapping(&template.mapping, MappingOrigin::Template, &table.columns, &catalog);
            let rules = template
                .rules
                .clone()
                .with_defaults(mapping.mapping(), &catalog);
            (mapping, rules)
        }
        None => {
            let mapping = propose_mapping(config, &table, &catalog, args.ai).await?;
            let rules = RuleSet::defaults_for(mapping.mapping(), &catalog);
            (mapping, rules)
        }
    };
    print_mapping(&mapping);

    let mut options = config.import_options(args.mode, args.dry_run);
    options.entity = entity;
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size.max(1);
    }

    let engine = TransformationEngine::new(config.transform_context());
    let plan = RecordPreparer::new(&catalog, &engine, &options).prepare(
        &table.rows,
        &mapping,
        &rules,
        CategoryResolver::new(config.category_delimiter.clone()),
    );

    if args.dry_run {
        println!("🔍 {}", "Dry run: nothing will be written".yellow());
    } else {
        println!("🚀 {}", format!("Importing into {}...", client.base_url()).dimmed());
    }

    let started = Instant::now();
    let remote: Arc<dyn RemoteCatalog> = client;
    let results = BatchImportOrchestrator::new(remote, options)
        .with_cancellation(cancel)
        .run(plan)
        .await;

    let summary = summarize(&results);
    print_summary(&summary, &results);
    println!("   took {:.1}s", started.elapsed().as_secs_f64());
    Ok(summary)
}

/// AI mapping when requested and configured, heuristic mapping otherwise
pub(crate) async fn propose_mapping(
    config: &ImporterConfig,
    table: &SourceTable,
    catalog: &FieldCatalog,
    use_ai: bool,
) -> Result<ValidatedMapping> {
    let heuristic = AutoMapper::new();
    if !use_ai {
        return Ok(heuristic.suggest(&table.columns, catalog));
    }

    let Some(api_key) = config.ai_api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
        println!("  {} no AI API key configured, using heuristic mapping", "!".yellow());
        return Ok(heuristic.suggest(&table.columns, catalog));
    };

    println!("🤖 {}", "Asking the AI service for a mapping...".dimmed());
    let suggester = GeminiSuggester::new(api_key).context("Failed to set up AI mapping")?;
    Ok(AiMappingAdapter::new(suggester)
        .suggest_or_fallback(&table.columns, table.sample(3), catalog, &heuristic)
        .await)
}

/// Source options as given on the command line
pub(crate) fn source_options(delimiter: Option<char>, encoding: Option<String>) -> CsvOptions {
    csv_options(CsvOptions::default(), delimiter, encoding)
}
