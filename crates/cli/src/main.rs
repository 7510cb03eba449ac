//! Engram CLI: the main entry point.
//!
//! Commands:
//! - `context`: Assemble a token-bounded context document
//! - `premortem`: Assemble past failures and principles for a domain
//! - `experience`: Record or count experiences on an axis
//! - `clusters`: Cluster experiences per axis
//! - `value`: Validate, store, or list values
//! - `config`: Show, validate, or initialise configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod container;

#[derive(Parser)]
#[command(
    name = "engram",
    about = "Engram: context assembly and value formation for coding agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.engram/config.toml)
    #[arg(short, long, global = true, env = "ENGRAM_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble context from a JSON file of candidate items
    Context {
        /// JSON array of candidate items
        #[arg(short, long)]
        pools: PathBuf,

        /// Query the candidates were retrieved for
        #[arg(short, long)]
        query: String,

        /// Categories to include (comma-separated)
        #[arg(short = 'C', long, value_delimiter = ',', default_value = "memories,code,experiences,values,commits")]
        categories: Vec<String>,

        /// Candidates per category (defaults to context.default_limit)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Token budget (defaults to context.default_max_tokens)
        #[arg(short, long)]
        max_tokens: Option<usize>,
    },

    /// Assemble a premortem from a JSON file of per-axis pools
    Premortem {
        /// JSON object keyed by axis name or `values`
        #[arg(short, long)]
        pools: PathBuf,

        /// Domain the work is in
        #[arg(short, long)]
        domain: String,

        /// Strategy about to be used
        #[arg(short, long)]
        strategy: Option<String>,

        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(short, long)]
        max_tokens: Option<usize>,
    },

    /// Manage the experience corpus
    Experience {
        #[command(subcommand)]
        command: ExperienceCommands,
    },

    /// Cluster experiences (all axes unless one is given)
    Clusters {
        #[arg(short, long)]
        axis: Option<String>,
    },

    /// Validate and store values
    Value {
        #[command(subcommand)]
        command: ValueCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ExperienceCommands {
    /// Embed and store one experience on an axis
    Add {
        #[arg(short, long)]
        axis: String,

        /// Experience text for this axis
        text: String,

        /// Confidence tier: gold, silver, bronze or abandoned
        #[arg(short, long)]
        tier: Option<String>,

        /// Explicit id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Count stored experiences on an axis
    Count {
        #[arg(short, long)]
        axis: String,
    },
}

#[derive(Subcommand)]
enum ValueCommands {
    /// Check a candidate value against a cluster
    Validate {
        text: String,

        #[arg(long)]
        cluster_id: String,
    },

    /// Validate and persist a value
    Store {
        text: String,

        #[arg(long)]
        cluster_id: String,

        #[arg(short, long)]
        axis: String,
    },

    /// List stored values, newest first
    List {
        #[arg(short, long)]
        axis: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Context {
            pools,
            query,
            categories,
            limit,
            max_tokens,
        } => {
            commands::context::run(config_path, &pools, &query, &categories, limit, max_tokens)
                .await?
        }
        Commands::Premortem {
            pools,
            domain,
            strategy,
            limit,
            max_tokens,
        } => {
            commands::premortem::run(
                config_path,
                &pools,
                &domain,
                strategy.as_deref(),
                limit,
                max_tokens,
            )
            .await?
        }
        Commands::Experience { command } => match command {
            ExperienceCommands::Add {
                axis,
                text,
                tier,
                id,
            } => commands::experience::add(config_path, &axis, &text, tier.as_deref(), id).await?,
            ExperienceCommands::Count { axis } => {
                commands::experience::count(config_path, &axis).await?
            }
        },
        Commands::Clusters { axis } => commands::clusters::run(config_path, axis.as_deref()).await?,
        Commands::Value { command } => match command {
            ValueCommands::Validate { text, cluster_id } => {
                commands::value::validate(config_path, &text, &cluster_id).await?
            }
            ValueCommands::Store {
                text,
                cluster_id,
                axis,
            } => commands::value::store(config_path, &text, &cluster_id, &axis).await?,
            ValueCommands::List { axis } => {
                commands::value::list(config_path, axis.as_deref()).await?
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config_cmd::show(config_path).await?,
            ConfigCommands::Validate => commands::config_cmd::validate(config_path).await?,
            ConfigCommands::Path => commands::config_cmd::path(config_path).await?,
            ConfigCommands::Init => commands::config_cmd::init(config_path).await?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_context_categories() {
        let cli = Cli::try_parse_from([
            "engram", "context", "--pools", "p.json", "--query", "retry", "-C", "memories,code",
        ])
        .unwrap();
        match cli.command {
            Commands::Context { categories, .. } => {
                assert_eq!(categories, vec!["memories", "code"]);
            }
            _ => panic!("expected context command"),
        }
    }

    #[test]
    fn parses_premortem() {
        let cli = Cli::try_parse_from([
            "engram", "premortem", "-p", "p.json", "-d", "payments", "-s", "bisect",
        ])
        .unwrap();
        match cli.command {
            Commands::Premortem {
                domain, strategy, ..
            } => {
                assert_eq!(domain, "payments");
                assert_eq!(strategy.as_deref(), Some("bisect"));
            }
            _ => panic!("expected premortem command"),
        }
    }

    #[test]
    fn parses_value_store() {
        let cli = Cli::try_parse_from([
            "engram", "value", "store", "Pin toolchains", "--cluster-id", "full_0", "--axis", "full",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Value {
                command: ValueCommands::Store { .. }
            }
        ));
    }
}
