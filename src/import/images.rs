//! Attaching associated image files to existing items

use super::{ImportErrorKind, ImportOptions, ImportResult, with_timeout, write_error_kind};
use crate::api::RemoteCatalog;
use crate::api::resilience::RetryPolicy;
use crate::images::{ImageAssociation, ImageMode};
use log::{info, warn};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Files of one item code with their 1-based position in the input
struct ItemImages<'a> {
    code: &'a str,
    files: Vec<(usize, &'a ImageAssociation)>,
}

impl ItemImages<'_> {
    fn first_line(&self) -> usize {
        self.files.first().map(|(line, _)| *line).unwrap_or(1)
    }
}

fn file_key(association: &ImageAssociation) -> Option<String> {
    Some(
        association
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| association.file_path.display().to_string()),
    )
}

fn group_by_item(associations: &[ImageAssociation]) -> Vec<ItemImages<'_>> {
    let mut groups: Vec<ItemImages> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (index, association) in associations.iter().enumerate() {
        let code = association.item_code.as_str();
        let position = *positions.entry(code).or_insert_with(|| {
            groups.push(ItemImages {
                code,
                files: Vec::new(),
            });
            groups.len() - 1
        });
        groups[position].files.push((index + 1, association));
    }
    groups
}

/// One result per file, or one per item when only attachments are removed
fn per_item_or_file(
    mode: ImageMode,
    item: &ItemImages,
    make: impl Fn(usize, Option<String>) -> ImportResult,
) -> Vec<ImportResult> {
    match mode {
        ImageMode::Delete => vec![make(item.first_line(), Some(item.code.to_string()))],
        ImageMode::Add | ImageMode::Replace => item
            .files
            .iter()
            .map(|(line, association)| make(*line, file_key(association)))
            .collect(),
    }
}

/// Upload every associated file to its item.
///
/// Items are looked up once per code; files of unknown items fail with a
/// validation error. The primary flag of the association is passed on so the
/// remote system can set the item's main image. In `Replace` mode the item's
/// existing attachments are removed before its first upload; in `Delete`
/// mode they are only removed, with one result per item. Cancellation is
/// checked between items.
pub async fn upload_images(
    remote: &dyn RemoteCatalog,
    associations: &[ImageAssociation],
    options: &ImportOptions,
    mode: ImageMode,
    cancel: &CancellationToken,
) -> Vec<ImportResult> {
    let retry = RetryPolicy::new(options.retry.clone());
    let timeout = options.request_timeout;
    let entity = options.entity;
    let mut results = Vec::with_capacity(associations.len());

    info!(
        "Processing {} images in {} mode (dry run: {})",
        associations.len(),
        mode,
        options.dry_run
    );

    for item in group_by_item(associations) {
        let code = item.code;

        if cancel.is_cancelled() {
            results.extend(per_item_or_file(mode, &item, ImportResult::cancelled));
            continue;
        }

        if options.dry_run {
            match mode {
                ImageMode::Delete => results.push(ImportResult::simulated(
                    item.first_line(),
                    Some(code.to_string()),
                    format!("dry run, remove attachments of '{}'", code),
                )),
                ImageMode::Add | ImageMode::Replace => {
                    for (line, association) in &item.files {
                        let role = if association.is_primary { "primary" } else { "additional" };
                        results.push(ImportResult::simulated(
                            *line,
                            file_key(association),
                            format!("dry run ({}), {} image of '{}'", mode, role, code),
                        ));
                    }
                }
            }
            continue;
        }

        let lookup = retry
            .execute(&format!("look up item '{}'", code), move || {
                with_timeout(timeout, remote.exists(entity, code))
            })
            .await;
        let target = match lookup {
            Ok(Some(id)) => id,
            Ok(None) => {
                warn!("Item '{}' not found, {} image(s) skipped", code, item.files.len());
                results.extend(per_item_or_file(mode, &item, |line, key| {
                    ImportResult::failed(
                        line,
                        key,
                        ImportErrorKind::ValidationError,
                        format!("item '{}' not found", code),
                    )
                }));
                continue;
            }
            Err(e) => {
                results.extend(per_item_or_file(mode, &item, |line, key| {
                    ImportResult::failed(line, key, write_error_kind(&e), e.to_string())
                }));
                continue;
            }
        };
        let target_ref = target.as_str();

        if mode != ImageMode::Add {
            let removed = retry
                .execute(&format!("remove attachments of '{}'", code), move || {
                    with_timeout(timeout, remote.delete_attachments(target_ref))
                })
                .await;
            match removed {
                Ok(count) => {
                    info!("Removed {} attachment(s) of '{}'", count, code);
                    if mode == ImageMode::Delete {
                        results.push(
                            ImportResult::updated(item.first_line(), Some(code.to_string()), target.clone())
                                .with_message(format!("{} attachment(s) removed", count)),
                        );
                        continue;
                    }
                }
                Err(e) => {
                    warn!("Removing attachments of '{}' failed: {}", code, e);
                    let message = format!("removing old attachments failed: {}", e);
                    results.extend(per_item_or_file(mode, &item, |line, key| {
                        ImportResult::failed(line, key, write_error_kind(&e), message.clone())
                    }));
                    continue;
                }
            }
        }

        for (line, association) in &item.files {
            let file = association.file_path.as_path();
            let primary = association.is_primary;
            let upload = retry
                .execute(&format!("upload {}", file.display()), move || {
                    with_timeout(timeout, remote.upload_image(target_ref, file, primary))
                })
                .await;

            let key = file_key(association);
            match upload {
                Ok(()) => results.push(ImportResult::created(*line, key, target.clone())),
                Err(e) => {
                    warn!("Upload of {} failed: {}", file.display(), e);
                    results.push(ImportResult::failed(*line, key, write_error_kind(&e), e.to_string()));
                }
            }
        }
    }

    results.sort_by_key(|r| r.line);
    results
}
