use super::{ensure_valid, print_summary, summarize};
use crate::api::ErpNextClient;
use crate::cli::app::ImagesArgs;
use crate::config::ImporterConfig;
use crate::images::{ImageAssociationEngine, scan_directory};
use crate::import::{ImportMode, ImportSummary, upload_images};
use anyhow::Result;
use colored::*;
use log::info;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Associate the images of a directory with items and upload them
pub async fn images_command(
    config: &ImporterConfig,
    config_path: &Path,
    args: ImagesArgs,
    cancel: CancellationToken,
) -> Result<ImportSummary> {
    info!(
        "Images from {} (matching {}, {} mode)",
        args.dir.display(),
        args.match_mode,
        args.mode
    );
    if !args.dry_run {
        ensure_valid(config, config_path)?;
    }

    let files = scan_directory(&args.dir)?;
    let report = ImageAssociationEngine::new().associate(&files, args.match_mode);
    let groups = report.by_item();
    println!(
        "🖼  {} files: {} images for {} items, {} unmatched",
        files.len(),
        report.associations.len(),
        groups.len(),
        report.unmatched.len()
    );
    for unmatched in &report.unmatched {
        println!(
            "  {} {} ({})",
            "!".yellow(),
            unmatched.file_path.display(),
            unmatched.reason
        );
    }

    let client = ErpNextClient::new(config)?;
    let options = config.import_options(ImportMode::UpdateOnly, args.dry_run);
    let results = upload_images(&client, &report.associations, &options, args.mode, &cancel).await;

    let summary = summarize(&results);
    print_summary(&summary, &results);
    Ok(summary)
}
