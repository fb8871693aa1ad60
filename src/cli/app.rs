use crate::catalog::SourceEntity;
use crate::images::{ImageMode, MatchMode};
use crate::import::ImportMode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(about = "Map, transform and import product catalog files into ERPNext")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to <config dir>/catalog-sync/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a CSV or BMEcat file
    Import(ImportArgs),
    /// Propose a column mapping for a source file
    Map(MapArgs),
    /// Attach image files to existing items
    Images(ImagesArgs),
    /// List the target fields of an entity
    Fields(FieldsArgs),
    /// Configuration management
    Config(ConfigCommands),
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Source file (.csv, .tsv, .txt or BMEcat .xml)
    pub file: PathBuf,

    /// Use a saved mapping template
    #[arg(short, long)]
    pub template: Option<String>,

    /// How existing records are treated
    #[arg(short, long, value_enum, default_value_t = ImportMode::Upsert)]
    pub mode: ImportMode,

    /// What the rows describe (defaults to the template's entity, else item)
    #[arg(long, value_enum)]
    pub entity: Option<SourceEntity>,

    /// Prepare and report without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Ask the AI service for the mapping (falls back to heuristics)
    #[arg(long, conflicts_with = "template")]
    pub ai: bool,

    /// Column delimiter of delimited files
    #[arg(short, long)]
    pub delimiter: Option<char>,

    /// Encoding of delimited files (e.g. utf-8, windows-1252)
    #[arg(short, long)]
    pub encoding: Option<String>,

    /// Records per batch (overrides config)
    #[arg(short, long)]
    pub batch_size: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct MapArgs {
    /// Source file (.csv, .tsv, .txt or BMEcat .xml)
    pub file: PathBuf,

    /// Ask the AI service for the mapping (falls back to heuristics)
    #[arg(long)]
    pub ai: bool,

    /// Save the proposed mapping as a template with this name
    #[arg(long)]
    pub save_template: Option<String>,

    #[arg(short, long)]
    pub delimiter: Option<char>,

    #[arg(short, long)]
    pub encoding: Option<String>,

    /// Target entity
    #[arg(long, value_enum, default_value_t = SourceEntity::Item)]
    pub entity: SourceEntity,
}

#[derive(Args, Debug, Clone)]
pub struct ImagesArgs {
    /// Directory containing the image files
    pub dir: PathBuf,

    /// How file names encode the item code
    #[arg(long = "match", value_enum, default_value_t = MatchMode::SuffixDash)]
    pub match_mode: MatchMode,

    /// Add to, replace or only delete the items' existing images
    #[arg(short, long, value_enum, default_value_t = ImageMode::Add)]
    pub mode: ImageMode,

    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FieldsArgs {
    #[arg(long, value_enum, default_value_t = SourceEntity::Item)]
    pub entity: SourceEntity,
}

#[derive(Args)]
pub struct ConfigCommands {
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Validate the configuration and test the connection
    Check,
    /// Print the config file location
    Path,
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import() {
        let cli = Cli::try_parse_from([
            "catalog-sync",
            "--config",
            "/tmp/c.json",
            "import",
            "artikel.csv",
            "--mode",
            "create-only",
            "--dry-run",
            "-d",
            "\t",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));
        let Commands::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.mode, ImportMode::CreateOnly);
        assert!(args.dry_run);
        assert_eq!(args.delimiter, Some('\t'));
        assert_eq!(args.template, None);
        assert_eq!(args.entity, None);

        let cli = Cli::try_parse_from(["catalog-sync", "import", "varianten.csv", "--entity", "item-variant"])
            .unwrap();
        let Commands::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.entity, Some(SourceEntity::ItemVariant));
    }

    #[test]
    fn test_parse_images_and_fields() {
        let cli = Cli::try_parse_from(["catalog-sync", "images", "bilder", "--match", "prefix"]).unwrap();
        let Commands::Images(args) = cli.command else {
            panic!("expected images");
        };
        assert_eq!(args.match_mode, MatchMode::Prefix);
        assert_eq!(args.mode, ImageMode::Add);

        let cli = Cli::try_parse_from(["catalog-sync", "images", "bilder", "--mode", "replace"]).unwrap();
        let Commands::Images(args) = cli.command else {
            panic!("expected images");
        };
        assert_eq!(args.mode, ImageMode::Replace);

        let cli = Cli::try_parse_from(["catalog-sync", "fields", "--entity", "item-group"]).unwrap();
        let Commands::Fields(args) = cli.command else {
            panic!("expected fields");
        };
        assert_eq!(args.entity, SourceEntity::ItemGroup);
    }

    #[test]
    fn test_template_conflicts_with_ai() {
        assert!(
            Cli::try_parse_from(["catalog-sync", "import", "a.csv", "--ai", "--template", "x"]).is_err()
        );
    }
}
