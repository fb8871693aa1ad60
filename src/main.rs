use anyhow::Result;
use catalog_sync::cli::{Cli, Commands, ConfigSubcommands};
use catalog_sync::commands::{
    check_command, fields_command, images_command, import_command, init_command, load_config,
    map_command, path_command,
};
use clap::Parser;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("catalog-sync.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let cli = Cli::parse();
    info!("Starting catalog-sync");

    let (config, config_path) = load_config(cli.config.as_deref())?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, cancelling after the current batch");
            eprintln!("Cancelling after the current batch...");
            ctrl_c.cancel();
        }
    });

    let failed = match cli.command {
        Commands::Import(args) => {
            import_command(&config, &config_path, args, cancel)
                .await?
                .has_failures()
        }
        Commands::Images(args) => {
            images_command(&config, &config_path, args, cancel)
                .await?
                .has_failures()
        }
        Commands::Map(args) => {
            map_command(&config, args).await?;
            false
        }
        Commands::Fields(args) => {
            fields_command(&config, args).await?;
            false
        }
        Commands::Config(cmd) => {
            match cmd.command {
                ConfigSubcommands::Check => check_command(&config, &config_path).await?,
                ConfigSubcommands::Path => path_command(&config_path)?,
                ConfigSubcommands::Init { force } => init_command(&config_path, force)?,
            }
            false
        }
    };

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
