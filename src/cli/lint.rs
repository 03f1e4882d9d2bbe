use super::Cli;
use clap::CommandFactory;
use colored::control;
use pslint::fix::{apply_corrections, fix_file};
use pslint::plugin::ModuleRuleLoader;
use pslint::{
    AnalysisError, AnalysisOutcome, AnalysisWarning, Analyzer, Reporter, RuleProfile,
    RuleRegistry, Severity,
};
use rayon::prelude::*;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Extensions picked up when a directory is given
const SCRIPT_EXTENSIONS: [&str; 2] = ["ps1", "psm1"];

/// Result of linting a single file
struct FileResult {
    path: PathBuf,
    outcome: Result<AnalysisOutcome, AnalysisError>,
    profiles: Option<Vec<RuleProfile>>,
}

/// Display profiling results
fn display_profile(profiles: &[RuleProfile]) {
    use colored::Colorize;
    use std::time::Duration;

    // Aggregate profiles by rule name (sum durations across files)
    let mut aggregated: HashMap<String, (Duration, String, usize)> = HashMap::new();
    for p in profiles {
        let entry = aggregated.entry(p.name.clone()).or_insert((
            Duration::ZERO,
            format!("{:?}", p.source_type),
            0,
        ));
        entry.0 += p.duration;
        entry.2 += p.diagnostic_count;
    }

    let mut sorted: Vec<_> = aggregated.into_iter().collect();
    sorted.sort_by(|a, b| b.1.0.cmp(&a.1.0));

    let total_time: Duration = sorted.iter().map(|(_, (d, _, _))| *d).sum();

    eprintln!();
    eprintln!("{}", "Profile Results".bold().underline());
    eprintln!();

    eprintln!(
        "{:>10}  {:>6}  {:>6}  {:<45}  {}",
        "Time".bold(),
        "%".bold(),
        "Found".bold(),
        "Rule".bold(),
        "Source".bold()
    );
    eprintln!("{}", "-".repeat(85));

    for (name, (duration, source, count)) in &sorted {
        let percentage = if total_time.as_nanos() > 0 {
            (duration.as_nanos() as f64 / total_time.as_nanos() as f64) * 100.0
        } else {
            0.0
        };

        let time_str = format_duration(*duration);
        let pct_str = format!("{:.1}%", percentage);

        // Highlight slow rules (>10% of total time)
        let time_display = if percentage > 10.0 {
            time_str.red().to_string()
        } else if percentage > 5.0 {
            time_str.yellow().to_string()
        } else {
            time_str
        };

        eprintln!(
            "{:>10}  {:>6}  {:>6}  {:<45}  {}",
            time_display,
            pct_str,
            count,
            name,
            source.dimmed()
        );
    }

    eprintln!("{}", "-".repeat(85));
    eprintln!(
        "{:>10}  {:>6}  {:>6}  {}",
        format_duration(total_time).bold(),
        "100%".bold(),
        sorted.iter().map(|(_, (_, _, c))| c).sum::<usize>(),
        "Total".bold()
    );
    eprintln!();
}

/// Format a duration for display
fn format_duration(d: std::time::Duration) -> String {
    let micros = d.as_micros();
    if micros < 1000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{:.2}ms", micros as f64 / 1000.0)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}

/// Expand directories into the scripts they contain, sorted by path.
fn collect_scripts(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
    let mut paths = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            paths.push(input.clone());
            continue;
        }
        let mut found = Vec::new();
        for extension in SCRIPT_EXTENSIONS {
            let pattern = input.join("**").join(format!("*.{}", extension));
            let entries = glob::glob(&pattern.to_string_lossy()).map_err(|e| e.to_string())?;
            found.extend(entries.filter_map(Result::ok));
        }
        found.sort();
        if found.is_empty() {
            return Err(format!("no PowerShell scripts found in {}", input.display()));
        }
        paths.extend(found);
    }

    let mut seen = std::collections::HashSet::new();
    paths.retain(|p| seen.insert(p.canonicalize().unwrap_or_else(|_| p.clone())));
    Ok(paths)
}

fn lint_file(path: &Path, analyzer: &Analyzer, profile: bool) -> FileResult {
    if !profile {
        return FileResult {
            path: path.to_path_buf(),
            outcome: analyzer.analyze_file(path),
            profiles: None,
        };
    }

    let result = std::fs::read_to_string(path)
        .map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|content| analyzer.analyze_source_with_profile(&content, Some(path)));
    match result {
        Ok((outcome, profiles)) => FileResult {
            path: path.to_path_buf(),
            outcome: Ok(outcome),
            profiles: Some(profiles),
        },
        Err(e) => FileResult {
            path: path.to_path_buf(),
            outcome: Err(e),
            profiles: None,
        },
    }
}

fn has_issues(outcome: &AnalysisOutcome, no_fail_on_warnings: bool) -> bool {
    if no_fail_on_warnings {
        outcome
            .diagnostics
            .iter()
            .any(|d| matches!(d.severity, Severity::Error | Severity::ParseError))
    } else {
        outcome.has_diagnostics()
    }
}

fn print_warnings(warnings: &[AnalysisWarning]) {
    for warning in warnings {
        eprintln!("warning[{}]: {}", warning.kind, warning);
    }
}

pub fn run_lint(cli: Cli) -> ExitCode {
    // 1. Detect stdin mode and read content if applicable
    let stdin_mode = cli.files.len() == 1 && cli.files[0].as_os_str() == "-";
    let stdin_content = if stdin_mode {
        let mut content = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut content) {
            eprintln!("Error reading from stdin: {}", e);
            return ExitCode::from(2);
        }
        Some(content)
    } else {
        None
    };

    // 2. Validate files and expand directories (file mode only)
    let file_paths = if stdin_content.is_none() {
        if cli.files.is_empty() {
            let _ = Cli::command().print_help();
            eprintln!();
            return ExitCode::from(2);
        }
        match collect_scripts(&cli.files) {
            Ok(paths) => paths,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(2);
            }
        }
    } else {
        Vec::new()
    };

    // 3. Resolve settings
    let resolved = match super::settings::resolve(cli.settings.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };
    if cli.verbose {
        match &resolved.source {
            Some(source) => eprintln!("Using settings: {} ({})", source.display(), resolved.mode),
            None => eprintln!("Using settings: {}", resolved.mode),
        }
    }
    let configuration = &resolved.configuration;

    // 4. Configure color output
    if cli.color {
        control::set_override(true);
    } else if cli.no_color {
        control::set_override(false);
    }
    let reporter = Reporter::new(cli.format.into());

    // 5. Build the registry and select rules
    let mut registry = RuleRegistry::with_builtin_rules();
    let load_warnings = registry.load_custom_rules(configuration, &ModuleRuleLoader::new());
    let analyzer = Analyzer::new(&registry, configuration);
    print_warnings(&load_warnings);
    print_warnings(analyzer.setup_warnings());

    if cli.verbose {
        eprintln!("Running {} rule(s)", analyzer.linter().rules().len());
        for rule in analyzer.linter().rules() {
            eprintln!("  - {}", rule.descriptor().full_name());
        }
    }

    // 6. Branch: stdin mode vs file mode
    if let Some(ref content) = stdin_content {
        let stdin_path = Path::new("<stdin>");
        let outcome = match analyzer.analyze_source(content, None) {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(2);
            }
        };

        if cli.fix {
            let corrected = apply_corrections(content, &outcome.diagnostics, None);
            print!("{}", corrected.text);
        } else {
            reporter.report(&outcome, stdin_path);
        }

        return if has_issues(&outcome, cli.no_fail_on_warnings) {
            ExitCode::from(1)
        } else {
            ExitCode::SUCCESS
        };
    }

    if cli.verbose {
        eprintln!("Linting {} file(s)", file_paths.len());
        for path in &file_paths {
            eprintln!("  - {}", path.display());
        }
    }

    // Lint files (parallel when not profiling, sequential otherwise)
    let results: Vec<FileResult> = if cli.profile {
        file_paths
            .iter()
            .map(|path| lint_file(path, &analyzer, true))
            .collect()
    } else {
        file_paths
            .par_iter()
            .map(|path| lint_file(path, &analyzer, false))
            .collect()
    };

    // Process results sequentially (for consistent output ordering)
    let mut found_issues = false;
    let mut has_fatal_error = false;
    let mut all_profiles: Vec<RuleProfile> = Vec::new();

    for result in results {
        let outcome = match result.outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("Error: {}", e);
                has_fatal_error = true;
                continue;
            }
        };

        if cli.fix {
            match fix_file(&result.path, &outcome.diagnostics) {
                Ok(corrected) => {
                    if corrected.applied > 0 {
                        eprintln!(
                            "Applied {} fix(es) to {}",
                            corrected.applied,
                            result.path.display()
                        );
                    }
                    for skipped in &corrected.skipped {
                        eprintln!(
                            "Skipped fix from {} at {}:{}: {}",
                            skipped.rule_name,
                            result.path.display(),
                            skipped.correction.extent.start.line,
                            skipped.reason
                        );
                    }
                }
                Err(e) => {
                    eprintln!("Error applying fixes to {}: {}", result.path.display(), e);
                }
            }
            print_warnings(&outcome.warnings);
        } else {
            reporter.report(&outcome, &result.path);
        }

        found_issues |= has_issues(&outcome, cli.no_fail_on_warnings);
        if let Some(profiles) = result.profiles {
            all_profiles.extend(profiles);
        }
    }

    if cli.profile && !all_profiles.is_empty() {
        display_profile(&all_profiles);
    }

    if has_fatal_error {
        ExitCode::from(2)
    } else if found_issues {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
