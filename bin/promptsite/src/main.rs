//! promptsite CLI
//!
//! Generates a three-file website (HTML, CSS, JS) from a one-line description
//! and serves it for preview and download.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for promptsite.
#[derive(Parser)]
#[command(
    name = "promptsite",
    version,
    about = "Generate complete websites from a one-line description"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: std::path::PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Generate a website once
    Generate {
        /// Description of the website (read from stdin when omitted)
        topic: Option<String>,
        /// Override the output directory
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
        /// Also write the bundle as a zip archive to this path
        #[arg(long)]
        zip: Option<std::path::PathBuf>,
    },
    /// Start the generation and preview server
    Serve {
        /// Port to listen on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
        /// Open browser automatically
        #[arg(long)]
        open: bool,
    },
    /// Validate configuration and environment
    Check {
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    promptsite::init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate { topic, output, zip } => {
            promptsite::cmd::generate::run(
                &cli.config,
                topic.as_deref(),
                output.as_deref(),
                zip.as_deref(),
            )
            .await?;
        }
        Commands::Serve { port, open } => {
            promptsite::cmd::serve::run(&cli.config, port, open).await?;
        }
        Commands::Check { strict } => {
            promptsite::cmd::check::run(&cli.config, strict)?;
        }
    }

    Ok(())
}
