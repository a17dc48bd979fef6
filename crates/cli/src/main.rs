//! Socket scorer CLI
//!
//! A command-line tool for scoring nodes, ranking them for a workload,
//! reporting placements and inspecting the scorer's telemetry cache.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{cache, placement, score, status};

/// Socket scorer CLI
#[derive(Parser)]
#[command(name = "sockscore")]
#[command(author, version, about = "CLI for the socket scoring service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via SOCKSCORE_API_URL env var)
    #[arg(long, env = "SOCKSCORE_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score every socket of a node and show the winner
    Score {
        /// Node name
        node: String,
    },

    /// Rank nodes for a workload, best first
    Rank {
        /// Candidate node names
        #[arg(required = true)]
        nodes: Vec<String>,

        /// Workload name
        #[arg(long, short, default_value = "cli-workload")]
        workload: String,

        /// Application profile of the workload
        #[arg(long, short)]
        profile: Option<String>,
    },

    /// Report that a workload was placed on a socket
    Place {
        /// Node name
        node: String,

        /// Socket id on the node
        socket: u32,

        /// Application profile of the placed workload
        profile: String,

        /// Leave the socket's idle residency untouched
        #[arg(long)]
        no_idle: bool,
    },

    /// Show a node's idle capacity in cores
    Idle {
        /// Node name
        node: String,
    },

    /// Inspect or flush the telemetry cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// List the known application profiles
    Profiles,

    /// Show scorer health and readiness
    Health,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show every cached socket
    Show,

    /// Mark every cached value unknown
    Flush,
}

async fn run(cli: Cli) -> Result<()> {
    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Score { node } => {
            score::score_node(&client, &node, cli.format).await?;
        }
        Commands::Rank {
            nodes,
            workload,
            profile,
        } => {
            score::rank_nodes(&client, nodes, workload, profile, cli.format).await?;
        }
        Commands::Place {
            node,
            socket,
            profile,
            no_idle,
        } => {
            placement::record_placement(&client, node, socket, profile, no_idle, cli.format)
                .await?;
        }
        Commands::Idle { node } => {
            score::show_idle(&client, &node, cli.format).await?;
        }
        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Show => cache::show_cache(&client, cli.format).await?,
            CacheCommands::Flush => cache::flush_cache(&client, cli.format).await?,
        },
        Commands::Profiles => {
            status::list_profiles(&client, cli.format).await?;
        }
        Commands::Health => {
            status::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        output::print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}
