//! # kgorm CLI Module
//!
//! ## Available Commands
//!
//! Offline (schema only):
//! - `types` - List the registered metadata types
//! - `describe` - Show the properties of a type
//! - `query` - Print the query document generated for a type
//!
//! Against the KG:
//! - `list` / `count` - Search instances of a type
//! - `get` - Fetch one instance
//! - `create` - Create (or update the matching) instance from a JSON file
//! - `delete` / `release` / `unrelease` / `release-status`
//! - `whoami` / `spaces`

mod commands;

use crate::client::KgClient;
use crate::config::KgConfig;
use crate::error::OrmError;
use crate::store::Store;
use clap::{Parser, Subcommand};
use kgorm_core::Scope;
use std::path::PathBuf;
use std::sync::Arc;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// kgorm - Knowledge Graph ORM
///
/// Search, fetch and write openMINDS metadata in the EBRAINS Knowledge Graph.
#[derive(Parser, Debug)]
#[command(name = "kgorm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to a TOML configuration file (default: ./kgorm.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// kg-core host name or API URL (overrides config and KG_HOST)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Read scope: released, "in progress" or any
    #[arg(short, long, global = true)]
    pub scope: Option<Scope>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the registered metadata types
    Types,

    /// Show the properties of a metadata type
    Describe {
        /// Class name, e.g. Person
        class: String,
    },

    /// Print the query document for a type
    Query {
        class: String,

        /// Property to filter on (repeatable); `name=value` is accepted
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Link path to follow, e.g. affiliations.member_of (repeatable)
        #[arg(long = "follow")]
        follow: Vec<String>,

        /// Restrict to one space
        #[arg(long)]
        space: Option<String>,

        /// Query label
        #[arg(long)]
        label: Option<String>,
    },

    /// Search instances of a type
    List {
        class: String,

        /// Filter as name=value (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Link path to follow (repeatable)
        #[arg(long = "follow")]
        follow: Vec<String>,

        #[arg(long)]
        space: Option<String>,

        /// Index of the first result
        #[arg(long, default_value = "0")]
        from: usize,

        /// Maximum number of results
        #[arg(long, default_value = "20", conflicts_with = "all")]
        size: usize,

        /// Page through every result
        #[arg(long)]
        all: bool,
    },

    /// Count instances of a type
    Count {
        class: String,

        /// Filter as name=value (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        #[arg(long)]
        space: Option<String>,
    },

    /// Fetch one instance by UUID or URI
    Get {
        id: String,

        /// Expected class; required for --follow
        #[arg(long)]
        class: Option<String>,

        /// Link path to follow (repeatable)
        #[arg(long = "follow")]
        follow: Vec<String>,

        /// Resolve linked instances this many levels deep
        #[arg(long, default_value = "0")]
        resolve: usize,
    },

    /// Create an instance from a JSON file of property values
    Create {
        class: String,

        /// JSON object mapping property names to values
        #[arg(short, long)]
        file: PathBuf,

        /// Target space (default: the type's default space)
        #[arg(long)]
        space: Option<String>,
    },

    /// Delete an instance
    Delete { id: String },

    /// Release an instance
    Release { id: String },

    /// Withdraw an instance from the released stage
    Unrelease { id: String },

    /// Show the release status of an instance
    ReleaseStatus { id: String },

    /// Show the profile of the token's owner
    Whoami,

    /// List the spaces visible to the token's owner
    Spaces,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Output settings shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), OrmError> {
    let mut config = KgConfig::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(scope) = cli.scope {
        config.scope = scope;
    }
    tracing::debug!(?config, "configuration loaded");

    let registry = Arc::new(config.registry()?);
    let out = Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Types => cmd_types(&registry, out),
        Commands::Describe { class } => cmd_describe(&registry, out, &class),
        Commands::Query {
            class,
            filters,
            follow,
            space,
            label,
        } => cmd_query(
            &registry,
            &class,
            &filters,
            &follow,
            space.as_deref(),
            label.as_deref(),
        ),
        remote => {
            let store = connect(&config, registry)?;
            run_remote(&store, out, remote).await
        }
    }
}

/// Build a store for the configured KG.
pub fn connect(
    config: &KgConfig,
    registry: Arc<kgorm_core::SchemaRegistry>,
) -> Result<Store<KgClient>, OrmError> {
    if config.token.is_none() {
        return Err(OrmError::Config(
            "no token configured: set KG_AUTH_TOKEN or `token` in the config file".to_string(),
        ));
    }
    let client = KgClient::new(&config.host, config.token.clone(), config.timeout())?;
    tracing::info!(url = client.base_url(), scope = %config.scope, "connecting to the KG");
    Ok(Store::new(client, registry)
        .with_scope(config.scope)
        .with_page_size(config.page_size))
}

async fn run_remote(
    store: &Store<KgClient>,
    out: Output,
    command: Commands,
) -> Result<(), OrmError> {
    match command {
        Commands::List {
            class,
            filters,
            follow,
            space,
            from,
            size,
            all,
        } => {
            let size = (!all).then_some(size);
            cmd_list(store, out, &class, &filters, &follow, space, from, size).await
        }
        Commands::Count {
            class,
            filters,
            space,
        } => cmd_count(store, out, &class, &filters, space.as_deref()).await,
        Commands::Get {
            id,
            class,
            follow,
            resolve,
        } => cmd_get(store, out, &id, class.as_deref(), &follow, resolve).await,
        Commands::Create { class, file, space } => {
            cmd_create(store, out, &class, &file, space.as_deref()).await
        }
        Commands::Delete { id } => cmd_delete(store, out, &id).await,
        Commands::Release { id } => cmd_release(store, out, &id, true).await,
        Commands::Unrelease { id } => cmd_release(store, out, &id, false).await,
        Commands::ReleaseStatus { id } => cmd_release_status(store, out, &id).await,
        Commands::Whoami => cmd_whoami(store, out).await,
        Commands::Spaces => cmd_spaces(store, out).await,
        Commands::Types | Commands::Describe { .. } | Commands::Query { .. } => Ok(()),
    }
}
