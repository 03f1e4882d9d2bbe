pub mod lint;
pub mod rules;
pub mod settings;

use clap::{Parser, Subcommand};
use pslint::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pslint")]
#[command(author, version, about = "Lint PowerShell scripts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Scripts or directories to lint ("-" reads from stdin)
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    pub format: Format,

    /// Automatically apply corrections
    #[arg(long)]
    pub fix: bool,

    /// Settings file, preset name, or an inline @{ ... } hashtable
    #[arg(short, long, value_name = "SETTINGS")]
    pub settings: Option<String>,

    /// Force colored output
    #[arg(long, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Do not exit with non-zero code on warnings (only fail on errors)
    #[arg(long)]
    pub no_fail_on_warnings: bool,

    /// Show profiling information (time spent per rule)
    #[arg(long)]
    pub profile: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Settings file management
    Settings {
        #[command(subcommand)]
        command: settings::SettingsCommands,
    },
    /// List the builtin rules
    Rules,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Text => OutputFormat::ErrorFormat,
            Format::Json => OutputFormat::Json,
        }
    }
}
