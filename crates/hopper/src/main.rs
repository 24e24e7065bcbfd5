//! Hopper - a self-updating application
//!
//! Every start first resumes any update chain named by the argument tokens,
//! then checks for a newer release and finally runs the application itself.

mod cli;
mod output;
mod update;

use anyhow::{Context, Result};
use clap::Parser;
use hopper_core::config::HierarchicalConfigLoader;
use hopper_core::types::UpdaterConfig;
use hopper_update::session_log::SessionLog;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    // This must be done before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let session = match SessionLog::open(&config.update.working_dir, &cli.tokens) {
        Ok(log) => Some(Arc::new(log)),
        Err(e) => {
            output::warning(&format!("Session log unavailable: {}", e));
            None
        }
    };

    init_tracing(cli.verbose, cli.quiet, session.as_deref());

    let result = update::run(&cli, config, session.clone()).await;

    if let Some(log) = &session {
        log.close();
    }
    result
}

/// Defaults, then `hopper.yaml`, then `HOPPER_*` variables, then flags
fn load_config(cli: &Cli) -> Result<UpdaterConfig> {
    let loader = match &cli.config {
        Some(dir) => HierarchicalConfigLoader::with_existing_dir(dir.clone())
            .with_context(|| format!("Invalid --config directory {}", dir))?,
        None => HierarchicalConfigLoader::new().context("Failed to create config loader")?,
    };

    let mut config = loader
        .load()
        .with_context(|| format!("Failed to load config from {}", loader.config_dir()))?;

    if cli.prerelease {
        config.update.include_prerelease = true;
    }
    if cli.no_update {
        config.update.enabled = false;
    }
    Ok(config)
}

/// Initialize tracing with appropriate verbosity
///
/// The terminal follows `-v`/`--quiet`; the session log always records
/// debug output so a failed update can be diagnosed afterwards.
fn init_tracing(verbose: u8, quiet: bool, session: Option<&SessionLog>) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let session_layer = session.map(|log| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(log.make_writer())
            .with_filter(EnvFilter::new("debug"))
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .with(session_layer)
        .init();
}
