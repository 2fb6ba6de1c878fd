//! # kgorm - Knowledge Graph ORM
//!
//! Command-line access to the EBRAINS Knowledge Graph through the kgorm
//! object model.
//!
//! ## Usage
//!
//! ```bash
//! export KG_AUTH_TOKEN=...
//!
//! # Offline: inspect types and generated queries
//! kgorm types
//! kgorm describe DatasetVersion
//! kgorm query Person -f family_name --follow affiliations.member_of
//!
//! # Against the KG
//! kgorm list Person -f family_name=Lovelace --scope any
//! kgorm get 9d2c9f3e-4a4d-4b9e-8a0b-2f0c7b1e6a11 --resolve 1
//! kgorm create Organization -f org.json
//! ```

use clap::Parser;
use kgorm::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize tracing - KGORM_LOG_FORMAT=json enables machine-parseable output.
    // Logs go to stderr; stdout carries command output.
    let log_format = std::env::var("KGORM_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = match (cli.verbose, cli.quiet) {
        (true, _) => "kgorm=debug",
        (false, true) => "kgorm=warn",
        (false, false) => "kgorm=info",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        if e.is_auth_failure() {
            tracing::error!("Authentication failed; check KG_AUTH_TOKEN");
        }
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
