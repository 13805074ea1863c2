use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use dabmux_core::config::MuxConfig;
use dabmux_core::Multiplexer;
use tracing_subscriber::EnvFilter;

/// Software DAB/DAB+ multiplexer.
#[derive(Parser, Debug)]
#[command(name = "dabmux", version, about, long_about = None)]
struct Args {
    /// Path to the ensemble configuration YAML.
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Override the log level (error, warn, info, debug, trace). Defaults to
    /// `RUST_LOG`, then `info`.
    #[arg(short, long)]
    log_level: Option<String>,

    /// Skip all configured ETI file sinks.
    #[arg(long)]
    no_eti: bool,

    /// Skip all configured EDI network outputs.
    #[arg(long)]
    no_edi: bool,
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing_log::LogTracer::init().context("failed to bridge `log` records into `tracing`")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref())?;

    tracing::info!(path = %args.config.display(), "loading configuration");
    let mut config = MuxConfig::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;

    if args.no_eti {
        config.outputs.eti.clear();
    }
    if args.no_edi {
        config.outputs.edi.clear();
    }

    tracing::info!(
        ensemble = %config.ensemble.label,
        subchannels = config.ensemble.subchannels.len(),
        services = config.ensemble.services.len(),
        "ensemble loaded"
    );

    let mut mux = Multiplexer::new(config).await.context("failed to start multiplexer")?;
    let shutdown = mux.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested, stopping after the current frame");
            shutdown.store(false, Ordering::Relaxed);
        }
    });

    mux.run().await.context("multiplexer loop failed")?;
    tracing::info!(frames = mux.frame_count(), "multiplexer stopped");
    Ok(())
}
