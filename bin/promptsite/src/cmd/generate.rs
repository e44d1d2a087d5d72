//! Generate command - produce a single bundle from the command line

use std::{
    io::{self, BufRead, Write},
    path::Path,
};

use color_eyre::eyre::{Result, WrapErr, bail};
use promptsite_core::{ArtifactKind, Config, GenerationRequest, OutputBundle};
use promptsite_generator::{SiteGenerator, zip_bundle};

/// Run the generate command.
///
/// Reads the topic from stdin when `topic` is `None`.
pub async fn run(
    config_path: &Path,
    topic: Option<&str>,
    output: Option<&Path>,
    zip: Option<&Path>,
) -> Result<()> {
    tracing::info!(?config_path, "Starting generation");

    let mut config = Config::load_with_env(config_path).wrap_err("Failed to load configuration")?;
    if let Some(dir) = output {
        config.output.dir = dir.to_string_lossy().into_owned();
    }

    let topic = match topic {
        Some(topic) => topic.to_string(),
        None => read_topic()?,
    };
    let request = GenerationRequest::new(topic).wrap_err("Invalid topic")?;

    let generator = SiteGenerator::from_config(&config).wrap_err("Failed to set up generator")?;

    println!();
    println!("  Generating website for \"{}\"...", request.topic());

    let bundle = generator
        .generate_site(&request)
        .await
        .wrap_err("Generation failed")?;

    print_bundle(&bundle);

    if let Some(zip_path) = zip {
        let bytes = zip_bundle(&bundle.root).wrap_err("Failed to archive bundle")?;
        std::fs::write(zip_path, bytes)
            .wrap_err_with(|| format!("Failed to write {}", zip_path.display()))?;
        println!("  Archive:      {}", zip_path.display());
        println!();
    }

    Ok(())
}

/// Prompt for a topic on stdin.
fn read_topic() -> Result<String> {
    print!("Describe the website you want: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    if line.trim().is_empty() {
        bail!("No topic given");
    }
    Ok(line)
}

/// Print a summary of the generated bundle.
fn print_bundle(bundle: &OutputBundle) {
    println!();
    println!("  Generated Bundle:");
    println!("  ─────────────────────────────────");
    println!("  Id:           {}", bundle.id);
    for kind in ArtifactKind::ALL {
        println!("  {:<13} {}", format!("{kind}:"), bundle.path_of(kind).display());
    }
    println!("  Images:       {:>6}", bundle.images.len());
    println!("  ─────────────────────────────────");
    println!();
}
