//! promptsite CLI Library
//!
//! This library provides the core functionality for the promptsite CLI.
//! It is designed to be used by the binary entry point while also exposing
//! public APIs for documentation and integration purposes.
//!
//! # Modules
//!
//! - [`cmd`] - Command implementations (generate, serve, check)
//! - [`server`] - Delivery server: generation endpoint, preview, zip download
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use promptsite::cmd;
//!
//! # async fn run() -> color_eyre::eyre::Result<()> {
//! // Generate a site once
//! cmd::generate::run(Path::new("config.toml"), Some("coffee shop"), None, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod cmd;
pub mod server;

// Re-export core types for convenience
pub use promptsite_core::{ArtifactKind, Config, GenerationRequest, OutputBundle};
pub use promptsite_generator::{GenerationError, SiteGenerator};

/// Initialize tracing with the specified verbosity level.
///
/// # Arguments
///
/// * `verbose` - Verbosity level (0 = WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE)
///
/// # Example
///
/// ```no_run
/// promptsite::init_tracing(2); // Enable DEBUG level logging
/// ```
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
