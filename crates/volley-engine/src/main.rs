//! # Volley
//!
//! Host binary for the Volley audio engine.
//!
//! Loads `volley.toml` (or the path given as the first argument), builds an
//! engine over the configured catalog and drives it through a scripted
//! session, logging what the engine reports.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod config;
mod timing;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::EngineConfig;

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("volley=info".parse()?))
        .init();

    info!("Volley starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load_or_init(),
    };
    config.validate();

    app::run(&config)?;

    info!("Volley shutdown complete");
    Ok(())
}
