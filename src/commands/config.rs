use crate::api::{ErpNextClient, RemoteCatalog};
use crate::config::ImporterConfig;
use anyhow::{Result, bail};
use colored::*;
use log::{error, info};
use std::path::Path;

/// Validate the configuration and test the connection
pub async fn check_command(config: &ImporterConfig, config_path: &Path) -> Result<()> {
    info!("Checking configuration {}", config_path.display());

    println!("Catalog Sync Configuration");
    println!("==========================");
    println!("  File:        {}", config_path.display());
    if !config_path.exists() {
        println!("  {}", "(file missing, defaults in use)".yellow());
    }
    println!("  ERPNext:     {}", config.base_url);
    println!("  Company:     {}", display_or_unset(&config.company));
    println!("  Price list:  {}", config.default_price_list);
    println!("  Item group:  {}", config.default_item_group);
    println!("  Tax rate:    {}%", config.default_tax_rate);
    println!("  Batch size:  {}", config.batch_size);
    println!("  Timeout:     {}s", config.request_timeout);
    println!(
        "  AI mapping:  {}",
        if config.ai_api_key.is_some() { "configured" } else { "not configured" }
    );

    let problems = config.validate();
    if !problems.is_empty() {
        println!();
        for problem in &problems {
            println!("  {} {}", "✗".red(), problem);
        }
        bail!("Configuration has {} problem(s)", problems.len());
    }

    println!("\nTesting connection...");
    let client = ErpNextClient::new(config)?;
    match client.check_connection().await {
        Ok(user) => {
            info!("Connection check succeeded as {}", user);
            println!("{} Connected as {}", "✓".green(), user.bright_green());
            Ok(())
        }
        Err(e) => {
            error!("Connection check failed: {}", e);
            println!("{} Connection failed: {}", "✗".red(), e);
            bail!("Connection check failed")
        }
    }
}

pub fn path_command(config_path: &Path) -> Result<()> {
    println!("{}", config_path.display());
    Ok(())
}

/// Write a config file with default values
pub fn init_command(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "Config file {} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    ImporterConfig::default().save(config_path)?;
    println!(
        "💾 Config written to: {}",
        config_path.display().to_string().bright_green()
    );
    println!("Fill in base_url, api_key and api_secret, then run 'catalog-sync config check'.");
    Ok(())
}

fn display_or_unset(value: &str) -> &str {
    if value.trim().is_empty() { "(unset)" } else { value }
}
