//! Serve command - generation and preview server

use std::{path::Path, sync::Arc};

use color_eyre::eyre::{Result, WrapErr};
use promptsite_core::Config;
use promptsite_generator::SiteGenerator;
use tokio::net::TcpListener;

use crate::server::{ServerState, create_router};

/// Run the serve command.
///
/// `port` overrides `server.port` from the configuration.
pub async fn run(config_path: &Path, port: Option<u16>, open_browser: bool) -> Result<()> {
    tracing::info!(?config_path, ?port, "Starting server");

    let config = Config::load_with_env(config_path).wrap_err("Failed to load configuration")?;

    let generator = SiteGenerator::from_config(&config).wrap_err("Failed to set up generator")?;
    std::fs::create_dir_all(generator.output_dir())
        .wrap_err("Failed to create output directory")?;

    let state = Arc::new(ServerState::new(generator));
    let app = create_router(state);

    let addr = format!(
        "{}:{}",
        config.server.host,
        port.unwrap_or(config.server.port)
    );
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind to {addr}"))?;

    println!();
    println!("  Server running at http://{addr}");
    println!("  Bundles are written to {}", config.output.dir);
    println!("  Press Ctrl+C to stop");
    println!();

    if open_browser {
        let _ = open::that(format!("http://{addr}"));
    }

    axum::serve(listener, app).await.wrap_err("Server error")?;

    Ok(())
}
