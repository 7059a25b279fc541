mod demo_transport;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use split_config::ClientConfig;
use split_runtime::tracing_init::init_tracing;
use split_runtime::SplitFactory;

use demo_transport::{FixtureTransport, LoggingRecorder};

#[derive(Parser)]
#[command(name = "split-cli", about = "Feature-flag evaluation SDK demo harness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sync loop against a fixture rule snapshot and serve
    /// treatments until interrupted.
    Run {
        /// Path to a client config TOML file.
        #[arg(short, long)]
        config: PathBuf,
        /// Path to a JSON fixture standing in for the remote rule service.
        #[arg(short, long)]
        fixture: PathBuf,
    },
    /// Evaluate one feature for one key against a fixture snapshot and exit.
    Evaluate {
        /// Path to a JSON fixture standing in for the remote rule service.
        #[arg(short, long)]
        fixture: PathBuf,
        /// The matching (and bucketing) key to evaluate.
        key: String,
        /// The feature name to evaluate.
        feature: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, fixture } => run(config, fixture).await,
        Commands::Evaluate { fixture, key, feature } => evaluate_once(fixture, key, feature).await,
    }
}

async fn run(config_path: PathBuf, fixture_path: PathBuf) -> Result<()> {
    let config_path = config_path
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("config path '{}': {e}", config_path.display()))?;
    let config = ClientConfig::load(&config_path)?;
    let base_dir = config_path
        .parent()
        .expect("config path must have a parent directory");

    let _guard = init_tracing(&config.logging, base_dir)?;

    let transport = Arc::new(FixtureTransport::load(&fixture_path)?);
    let recorder = Arc::new(LoggingRecorder);

    let factory = SplitFactory::build(&config, transport.clone(), transport, recorder.clone(), recorder)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing::info!(domain = "sys", "split-cli sync loop started");

    wait_for_signal().await;
    tracing::info!(domain = "sys", "shutting down");
    factory.shutdown().await;

    Ok(())
}

async fn evaluate_once(fixture_path: PathBuf, key: String, feature: String) -> Result<()> {
    let config = ClientConfig::default();
    let transport = Arc::new(FixtureTransport::load(&fixture_path)?);
    let recorder = Arc::new(LoggingRecorder);

    let factory = SplitFactory::build(&config, transport.clone(), transport, recorder.clone(), recorder)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    // One split-sync tick has to land before we can evaluate against it;
    // the periodic task already fired once at start, but give it a beat.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let client = factory.client();
    let treatment = client.treatment(&key, &feature, &Default::default());
    println!("{treatment}");

    factory.shutdown().await;
    Ok(())
}

/// Waits for Ctrl-C (or SIGTERM on Unix), mirroring the signal handling this
/// codebase's longer-running services use for graceful shutdown.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to listen for SIGTERM");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(domain = "sys", signal = "SIGINT", "received signal, initiating graceful shutdown");
            }
            _ = sigterm.recv() => {
                tracing::info!(domain = "sys", signal = "SIGTERM", "received signal, initiating graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for Ctrl-C");
        tracing::info!(domain = "sys", signal = "ctrl-c", "received signal, initiating graceful shutdown");
    }
}
