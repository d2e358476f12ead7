use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use memrelay::backend;
use memrelay::commands::Dispatcher;
use memrelay::mcp::McpServer;
use memrelay::{Config, Error, ReadinessGate};

/// memrelay - MCP memory server over hosted, relational or in-process storage
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Config file (defaults to $MEMRELAY_CONFIG or the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Construct the selected backend, print its mode and exit
    #[arg(long)]
    check: bool,
}

/// Logs go to stderr; stdout carries the protocol.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal error");
            // The stdin reader may still be parked in a blocking read.
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = Config::load(cli.config.as_deref())?;
    let credentials = backend::select(&config.credentials)?;
    info!(mode = %credentials.mode(), "selected memory backend");

    if cli.check {
        let backend = backend::connect(&credentials, &config).await?;
        println!("{}", backend.mode());
        return Ok(());
    }

    let gate = Arc::new(ReadinessGate::new());
    let dispatcher = Dispatcher::new(Arc::clone(&gate), config.defaults.clone());
    let server = McpServer::new(dispatcher);

    let (failed_tx, failed_rx) = oneshot::channel::<Error>();
    tokio::spawn(async move {
        match backend::connect(&credentials, &config).await {
            Ok(backend) => {
                gate.mark_ready(backend);
            }
            Err(e) => {
                gate.mark_failed();
                let _ = failed_tx.send(e);
            }
        }
    });

    tokio::select! {
        served = server.serve_stdio() => served,
        Ok(e) = failed_rx => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["memrelay"]);
        assert_eq!(cli.log_level, "info");
        assert!(cli.config.is_none());
        assert!(!cli.check);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "memrelay",
            "--log-level",
            "debug",
            "--config",
            "/tmp/memrelay.toml",
            "--check",
        ]);
        assert_eq!(cli.log_level, "debug");
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/memrelay.toml")));
        assert!(cli.check);
    }
}
