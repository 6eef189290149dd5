mod cli;
mod config;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use config::ClientConfig;
use gopher_client_core::{GopherClient, GopherUrl, ItemType};

/// Command-line client for Gopher servers.
///
/// Targets are gopher URLs: gopher://host[:port]/<type><selector>
///   e.g.  gopher://gopher.floodgap.com/1/world, sdf.org/0/users/readme.txt
///
/// The scheme may be omitted and the port defaults to 70. Output is
/// auto-JSON when stdout is piped. Force with --json.
#[derive(Parser, Debug)]
#[command(name = "gopher-client", version)]
struct Args {
    /// Force JSON output (auto-enabled when stdout is piped)
    #[arg(long, global = true)]
    json: bool,

    /// Seconds allowed for the whole transaction (0 disables)
    #[arg(long, global = true, env = "GOPHER_TIMEOUT")]
    timeout: Option<u64>,

    /// Seconds allowed for resolving and connecting (0 disables)
    #[arg(long, global = true, env = "GOPHER_CONNECT_TIMEOUT")]
    connect_timeout: Option<u64>,

    /// Log protocol activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the items of a menu (default: configured home)
    Browse {
        /// Menu to browse
        target: Option<String>,
    },

    /// Retrieve a text document
    Fetch {
        /// Document URL (e.g., gopher://host/0/about.txt)
        target: String,
    },

    /// Retrieve any item, rendering it according to its type
    Get {
        /// Item URL; the type character after the host selects the rendering
        target: String,

        /// Write binary content to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Query a full-text search server
    Search {
        /// Search endpoint (e.g., gopher://host/7/search)
        target: String,

        /// Search terms
        query: String,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let fallback = if args.verbose { "debug" } else { "warn" };
    // stdout carries payloads, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .init();

    let config = ClientConfig::load();
    let json = cli::use_json(args.json || config.json);

    let options = config.transact_options(args.connect_timeout, args.timeout);
    debug!(?options, "Client configured");
    let client = GopherClient::new().with_options(options);

    if let Err(e) = run(&args.command, &client, &config, json).await {
        cli::handle_error(e, json);
    }
}

async fn run(cmd: &Command, client: &GopherClient, config: &ClientConfig, json: bool) -> Result<()> {
    match cmd {
        Command::Browse { target } => {
            let target = target
                .as_deref()
                .or(config.home.as_deref())
                .context("No target given and no home configured")?;
            let mut url = parse_target(target)?;
            url.item_type = ItemType::Menu;
            cli::browse(client, &url, json).await
        }
        Command::Fetch { target } => cli::fetch(client, &parse_target(target)?, json).await,
        Command::Get { target, output } => {
            cli::get(client, &parse_target(target)?, output.as_deref(), json).await
        }
        Command::Search { target, query } => {
            cli::search(client, &parse_target(target)?, query, json).await
        }
    }
}

fn parse_target(target: &str) -> Result<GopherUrl> {
    target
        .parse()
        .with_context(|| format!("Invalid target {:?}", target))
}
