//! Command line definitions

pub mod app;

pub use app::{Cli, Commands, ConfigSubcommands};
