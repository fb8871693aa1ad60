use super::load_catalog;
use crate::api::ErpNextClient;
use crate::catalog::FieldCatalog;
use crate::cli::app::FieldsArgs;
use crate::config::ImporterConfig;
use anyhow::Result;
use colored::*;
use log::info;

/// List the target fields of an entity, custom fields included when the
/// remote system is reachable
pub async fn fields_command(config: &ImporterConfig, args: FieldsArgs) -> Result<()> {
    info!("Listing fields of {}", args.entity.doctype());

    let catalog = if config.validate().is_empty() {
        let client = ErpNextClient::new(config)?;
        load_catalog(&client, args.entity).await
    } else {
        FieldCatalog::builtin(args.entity)
    };

    println!("{} fields:", args.entity.doctype().bold());
    println!("{:<32} {:<8} Label", "Field", "Kind");
    println!("{}", "-".repeat(72));

    for field in catalog.fields() {
        let kind = format!("{:?}", field.kind).to_lowercase();
        let mut line = format!("{:<32} {:<8} {}", field.name, kind, field.label);
        if field.required {
            line = format!("{} {}", line, "(required)".red());
        }
        if field.is_custom {
            println!("{} {}", line, "(custom)".cyan());
        } else {
            println!("{}", line);
        }
    }

    for warning in catalog.warnings() {
        println!("  {} {}", "!".yellow(), warning);
    }
    println!(
        "\nTotal fields: {} ({} custom)",
        catalog.len(),
        catalog.custom_fields().count()
    );
    Ok(())
}
