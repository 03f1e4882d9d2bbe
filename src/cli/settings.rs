use clap::Subcommand;
use pslint::settings::{DEFAULT_SETTINGS_TEMPLATE, PresetStore, SETTINGS_FILE_NAME};
use pslint::{
    Configuration, ResolvedSettings, RuleRegistry, SettingsError, SettingsInput, SettingsMode,
    resolve_settings,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print the settings that apply in the current directory
    Show {
        /// Settings file, preset name, or an inline @{ ... } hashtable
        #[arg(short, long, value_name = "SETTINGS")]
        settings: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a default settings file
    Init {
        /// Output path for the settings file
        #[arg(short, long, default_value = SETTINGS_FILE_NAME)]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
    /// Check a settings file for errors and unknown rules or arguments
    Validate {
        /// Path to the settings file to validate
        #[arg(default_value = SETTINGS_FILE_NAME)]
        path: PathBuf,
    },
    /// List the available presets
    Presets,
}

pub fn run_settings(command: &SettingsCommands) -> ExitCode {
    match command {
        SettingsCommands::Show { settings, json } => run_show(settings.as_deref(), *json),
        SettingsCommands::Init { output, force } => run_init(output, *force),
        SettingsCommands::Validate { path } => run_validate(path),
        SettingsCommands::Presets => run_presets(),
    }
}

/// Resolve `--settings` against the current directory.
///
/// Text starting with `@{` is read as an inline hashtable.
pub fn resolve(text: Option<&str>) -> Result<ResolvedSettings, SettingsError> {
    if let Some(inline) = text.filter(|t| t.trim_start().starts_with("@{")) {
        return Ok(ResolvedSettings {
            mode: SettingsMode::Hashtable,
            source: None,
            configuration: Configuration::from_source(inline, None)?,
        });
    }
    let working_directory = std::env::current_dir().ok();
    resolve_settings(text.map(SettingsInput::from), working_directory.as_deref())
}

fn run_show(settings: Option<&str>, json: bool) -> ExitCode {
    let resolved = match resolve(settings) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    if json {
        match serde_json::to_string_pretty(&resolved) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(2);
            }
        }
        return ExitCode::SUCCESS;
    }

    match &resolved.source {
        Some(source) => println!("# mode: {} ({})", resolved.mode, source.display()),
        None => println!("# mode: {}", resolved.mode),
    }
    print!("{}", resolved.configuration.to_settings_text());
    ExitCode::SUCCESS
}

fn run_init(output: &Path, force: bool) -> ExitCode {
    if output.exists() && !force {
        eprintln!(
            "Error: {} already exists. Use --force to overwrite.",
            output.display()
        );
        return ExitCode::from(1);
    }

    match fs::write(output, DEFAULT_SETTINGS_TEMPLATE) {
        Ok(()) => {
            eprintln!("Created {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error writing {}: {}", output.display(), e);
            ExitCode::from(2)
        }
    }
}

fn run_validate(path: &Path) -> ExitCode {
    if !path.exists() {
        eprintln!("Error: {} not found", path.display());
        return ExitCode::from(2);
    }

    let configuration = match Configuration::from_file(path) {
        Ok(configuration) => configuration,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let warnings = RuleRegistry::with_builtin_rules()
        .select(&configuration)
        .warnings;
    if warnings.is_empty() {
        eprintln!("{}: OK", path.display());
        ExitCode::SUCCESS
    } else {
        eprintln!("{}:", path.display());
        for warning in &warnings {
            eprintln!("  - {}", warning);
        }
        eprintln!("\nFound {} problem(s)", warnings.len());
        ExitCode::from(1)
    }
}

fn run_presets() -> ExitCode {
    let store = PresetStore::default();
    let names = store.names();
    if names.is_empty() {
        eprintln!("No presets found in {}", store.dir().display());
        return ExitCode::SUCCESS;
    }
    for name in names {
        println!("{}", name);
    }
    ExitCode::SUCCESS
}
