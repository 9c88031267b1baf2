mod cli;
mod logging;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use qbunpack_core::{
    load_config, validate_config, write_default_config, CommandUnpacker, Config, Dispatcher,
    DispatcherConfig, LoggingObserver, QBittorrentClient, QueueObserver, TorrentClient, Unpacker,
};

use cli::Cli;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(path) = &cli.write_config {
        return match write_config(&cli, path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        };
    }

    if let Some(path) = &cli.scan {
        if let Err(e) = logging::init(None) {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
        return match scan(path).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Scan failed: {:#}", e);
                ExitCode::FAILURE
            }
        };
    }

    let mut config = match load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    config.apply_overrides(cli.dest.clone(), cli.temp.clone());

    if let Err(e) = logging::init(config.log_path.as_deref()) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn write_config(cli: &Cli, path: &Path) -> Result<()> {
    let mut config = Config::default();
    config.apply_overrides(cli.dest.clone(), cli.temp.clone());
    let written = write_default_config(path, &config, cli.force)
        .with_context(|| format!("Failed to write config to {:?}", path))?;
    println!("Configuration written to {}", written.display());
    Ok(())
}

async fn scan(path: &Path) -> Result<()> {
    let unpacker = CommandUnpacker::detect().context("Failed to set up extraction tools")?;
    let targets = unpacker
        .scan(path, &CancellationToken::new())
        .await
        .with_context(|| format!("Failed to scan {:?}", path))?;

    if targets.is_empty() {
        println!("No archives found in {}", path.display());
    }
    for target in &targets {
        println!("{}", target);
    }
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    info!("Starting qbunpack {}", VERSION);

    validate_config(&config).context("Configuration validation failed")?;
    if let Some(temp) = &config.temp_path {
        info!("Temp path: {:?}", temp);
    }
    info!("Destination path: {:?}", config.dest_path);

    info!("Initializing qBittorrent client at {}", config.qbittorrent.url);
    let client: Arc<dyn TorrentClient> = Arc::new(
        QBittorrentClient::new(config.qbittorrent.clone())
            .context("Failed to create qBittorrent client")?,
    );

    let unpacker = CommandUnpacker::detect().context("Failed to set up extraction tools")?;
    let formats: Vec<String> = unpacker.formats().iter().map(|f| f.to_string()).collect();
    info!("Extraction formats available: {}", formats.join(", "));
    let unpacker: Arc<dyn Unpacker> = Arc::new(unpacker);

    let observer: Arc<dyn QueueObserver> = Arc::new(LoggingObserver);
    let dispatcher = Dispatcher::new(
        DispatcherConfig::from_config(&config),
        client,
        unpacker,
        Some(observer),
    );

    let cancel = CancellationToken::new();
    let mut task = tokio::spawn(dispatcher.run(cancel.clone()));

    let result = tokio::select! {
        joined = &mut task => joined,
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            cancel.cancel();
            task.await
        }
    };

    match result.context("Dispatcher task failed")? {
        Ok(()) => {
            info!("qbunpack stopped");
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            warn!("Stopped while a request was in flight");
            Ok(())
        }
        Err(e) => {
            cancel.cancel();
            Err(e).context("Dispatcher failed")
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
