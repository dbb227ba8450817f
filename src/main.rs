//! Books API server.
//!
//! ```text
//!     Client Request
//!     ──▶ request id ─▶ trace ─▶ metrics ─▶ timeout ─▶ security headers
//!         ─▶ CORS ─▶ compression ─▶ global limiter ─▶ body limit
//!         ─▶ GET  /books ──────────────────────────────────────────▶ SELECT
//!         ─▶ POST /books ─▶ decode body ─▶ write limiter ─▶ validation ─▶ INSERT
//! ```

use std::path::PathBuf;

use clap::Parser;

use books_api::config::resolve_config;
use books_api::lifecycle::startup;
use books_api::observability::logging;

#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP API for listing and adding books")]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on; overrides the file and the PORT variable.
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (mut config, env_warnings) = resolve_config(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.listener.port = port;
    }

    logging::init_logging(&config.observability, config.environment);
    for warning in &env_warnings {
        warning.log();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.listener.port,
        environment = ?config.environment,
        "books-api starting"
    );

    startup::run(config).await?;
    Ok(())
}
