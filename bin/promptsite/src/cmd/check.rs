//! Check command - validate configuration and environment

use std::path::Path;

use color_eyre::eyre::{Result, bail};
use promptsite_core::Config;

/// Validation result.
#[derive(Debug, Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Run the check command.
///
/// Validates the configuration file, the API key and the output directory.
pub fn run(config_path: &Path, strict: bool) -> Result<()> {
    tracing::info!(?config_path, strict, "Checking configuration");

    let result = validate(config_path);

    // Print summary
    println!();
    println!("Summary:");
    println!("  Errors:   {}", result.errors.len());
    println!("  Warnings: {}", result.warnings.len());

    if result.has_errors() {
        println!();
        println!("Errors:");
        for err in &result.errors {
            println!("  ✗ {err}");
        }
    }

    if result.has_warnings() {
        println!();
        println!("Warnings:");
        for warn in &result.warnings {
            println!("  ⚠ {warn}");
        }
    }

    if result.has_errors() {
        bail!("Validation failed with {} error(s)", result.errors.len());
    }

    if strict && result.has_warnings() {
        bail!(
            "Validation failed with {} warning(s) (strict mode)",
            result.warnings.len()
        );
    }

    println!();
    println!("✓ All checks passed");

    Ok(())
}

fn validate(config_path: &Path) -> ValidationResult {
    let mut result = ValidationResult::default();

    println!("Checking configuration...");
    if !config_path.exists() {
        result.add_warning(format!(
            "{} not found, using defaults and environment",
            config_path.display()
        ));
    }

    // Layered like `generate` and `serve`.
    let config = match Config::load_with_env(config_path) {
        Ok(c) => {
            println!("  ✓ Configuration valid");
            c
        }
        Err(e) => {
            result.add_error(format!("Configuration error: {e}"));
            println!("  ✗ Configuration invalid: {e}");
            return result;
        }
    };

    println!("\nChecking backend...");
    check_backend(&config, &mut result);

    println!("\nChecking output directory...");
    check_output(&config, &mut result);

    result
}

fn check_backend(config: &Config, result: &mut ValidationResult) {
    if config.backend.resolve_api_key().is_some() {
        println!("  ✓ API key present");
    } else {
        result.add_error(format!(
            "No API key: set {} or backend.api_key",
            config.backend.api_key_env
        ));
    }

    if !config.images.enabled {
        result.add_warning("Image localization is disabled; pages will hotlink remote images");
    }

    if config.retry.max_attempts == 1 {
        println!("  - Backend calls are not retried");
    }
}

fn check_output(config: &Config, result: &mut ValidationResult) {
    let dir = config.output_dir();
    if dir.exists() && !dir.is_dir() {
        result.add_error(format!("{} exists but is not a directory", dir.display()));
    } else if dir.exists() {
        println!("  ✓ {} exists", dir.display());
    } else {
        println!("  - {} will be created on first generation", dir.display());
    }
}
