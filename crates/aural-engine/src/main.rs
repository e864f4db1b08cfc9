//! # Aural
//!
//! Demo driver: plays two emitters from a generated asset module while the
//! listener follows a moving player, polling assets for hot reload.
//!
//! Usage: `aural [config.toml]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;

use anyhow::Result;
use aural_engine::AuralConfig;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => AuralConfig::load_from(path),
        None => AuralConfig::load(),
    };

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(&config.log_filter),
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("Aural starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    app::run(&config)?;

    info!("Aural shutdown complete");
    Ok(())
}
