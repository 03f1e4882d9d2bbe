use colored::Colorize;
use pslint::RuleRegistry;
use std::process::ExitCode;

pub fn run_rules() -> ExitCode {
    let registry = RuleRegistry::with_builtin_rules();

    eprintln!("{}", "Available rules:".bold());
    eprintln!();
    for descriptor in registry.descriptors() {
        let arguments = if descriptor.argument_schema.is_empty() {
            String::new()
        } else {
            format!(" (arguments: {})", descriptor.argument_schema.join(", "))
        };
        eprintln!(
            "  {} {} [{}] - {}{}",
            "▸".cyan(),
            descriptor.name.yellow(),
            descriptor.default_severity,
            descriptor.common_name,
            arguments.dimmed()
        );
    }
    eprintln!();
    eprintln!(
        "Configure rules in {} under the {} key.",
        pslint::settings::SETTINGS_FILE_NAME.cyan(),
        "Rules".cyan()
    );
    ExitCode::SUCCESS
}
