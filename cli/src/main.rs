//! UserStream CLI — the command-line front end for UserStream.
//!
//! # Commands
//! ```text
//! userstream replay   --file <capture.json> [--config <stream.yaml>] [--raw]
//! userstream connect  (--tcp <host:port> | --ws <url>) [--config <stream.yaml>] [--max-retries N] [--raw]
//! userstream classify --file <capture.json> [--json]
//! ```

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use userstream_engine::{
    Connector, ReplayConnector, StreamConfig, StreamDriver, TcpConnector, WsConnector,
};
use userstream_observability::{init_tracing, LogConfig};

mod cmd_classify;
mod printer;

#[derive(Parser)]
#[command(
    name = "userstream",
    about = "Ingest newline-delimited JSON user streams and dispatch typed events",
    long_about = "
UserStream CLI: replay stored stream captures or follow a live feed, printing
every decoded event as one JSON line on stdout. Logs go to stderr.

ENVIRONMENT VARIABLES:
  RUST_LOG    overrides --log-level with full filter directives
",
    version
)]
struct Cli {
    /// Global log level: trace | debug | info | warn | error
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a capture file through the full pipeline
    Replay {
        /// Newline-delimited capture file
        #[arg(short, long)]
        file: PathBuf,
        /// Stream configuration (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print each entity's original JSON instead of the decoded form
        #[arg(long)]
        raw: bool,
    },

    /// Follow a live stream until Ctrl-C or retry exhaustion
    #[command(group(ArgGroup::new("endpoint").required(true).args(["tcp", "ws"])))]
    Connect {
        /// Plain TCP line feed, e.g. 127.0.0.1:7000
        #[arg(long)]
        tcp: Option<String>,
        /// WebSocket feed, e.g. wss://stream.example.com/1.1/user.json
        #[arg(long)]
        ws: Option<String>,
        /// Stream configuration (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override retry.max_retries from the configuration
        #[arg(long)]
        max_retries: Option<u32>,
        /// Print each entity's original JSON instead of the decoded form
        #[arg(long)]
        raw: bool,
    },

    /// Count records in a capture by kind without dispatching them
    Classify {
        #[arg(short, long)]
        file: PathBuf,
        /// Output the counts as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log = LogConfig::default()
        .with_level(cli.log_level.as_str())
        .json(cli.json_logs);
    init_tracing(&log).context("install log subscriber")?;

    match cli.command {
        Commands::Replay { file, config, raw } => {
            let config = load_config(config.as_deref())?;
            let connector =
                ReplayConnector::file(&file).with_max_record_bytes(config.max_record_bytes);
            run_driver(config, connector, raw).await
        }

        Commands::Connect { tcp, ws, config, max_retries, raw } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(max_retries) = max_retries {
                config.retry.max_retries = max_retries;
            }
            match (tcp, ws) {
                (Some(addr), _) => {
                    let connector =
                        TcpConnector::new(addr).with_max_record_bytes(config.max_record_bytes);
                    run_driver(config, connector, raw).await
                }
                (None, Some(url)) => {
                    let connector = WsConnector::new(&url)?
                        .with_max_record_bytes(config.max_record_bytes);
                    run_driver(config, connector, raw).await
                }
                (None, None) => anyhow::bail!("one of --tcp or --ws is required"),
            }
        }

        Commands::Classify { file, json } => cmd_classify::run(&file, json),
    }
}

fn load_config(path: Option<&Path>) -> Result<StreamConfig> {
    match path {
        Some(path) => StreamConfig::from_file(path)
            .with_context(|| format!("load stream config '{}'", path.display())),
        None => Ok(StreamConfig::default()),
    }
}

async fn run_driver<C: Connector>(config: StreamConfig, connector: C, raw: bool) -> Result<()> {
    let driver = StreamDriver::new(config);
    driver.add_listener(Arc::new(printer::PrintListener::new(
        Arc::clone(driver.registry()),
        raw,
    )));
    driver.start(connector)?;

    let result = tokio::select! {
        result = driver.wait() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, stopping");
            driver.stop().await
        }
    };

    let metrics = driver.metrics();
    info!(
        records = metrics.records_read,
        dispatched = metrics.events_dispatched,
        skipped = metrics.records_skipped,
        decode_errors = metrics.decode_errors,
        listener_failures = metrics.listener_failures,
        reconnections = metrics.reconnections,
        "session finished"
    );
    result.context("stream terminated")
}
