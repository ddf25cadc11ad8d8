use std::sync::Arc;

use clap::Parser;
use hostex_collector::{
    CollectorDeps, NativeSource, Scraper, ScraperConfig, default_registry, source::SnapshotSource,
};
use hostex_server::{Cli, ExporterConfig, ExporterState, exporter_router, logging};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let registry = Arc::new(default_registry());

    if cli.print_collectors {
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(());
    }

    logging::init(&cli.log_level, cli.log_format)
        .map_err(|err| err as Box<dyn std::error::Error>)?;
    let config = ExporterConfig::try_from(&cli)?;
    let enabled = registry.resolve_enabled(&config.enabled_collectors)?;

    let source: Arc<dyn NativeSource> = match &config.snapshot_dir {
        Some(dir) => {
            let source = SnapshotSource::new(dir)?;
            info!(dir = %source.root().display(), "reading counters from snapshot directory");
            Arc::new(source)
        }
        None => host_source(),
    };
    info!(source = source.name(), "native counter source ready");

    let deps = CollectorDeps {
        namespace: config.namespace.clone(),
        source,
    };
    let active = registry.build(&enabled, &deps);
    if active.is_empty() {
        warn!("no collector could be enabled on this host");
    }

    let scraper = Arc::new(Scraper::new(
        &config.namespace,
        active,
        ScraperConfig {
            channel_capacity: config.channel_capacity,
        },
    )?);
    let state = Arc::new(ExporterState::new(Arc::clone(&registry), scraper, &config));
    let app = exporter_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(
        "hostex listening on {} (metrics at {})",
        config.listen_addr, config.metrics_path
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(windows)]
fn host_source() -> Arc<dyn NativeSource> {
    Arc::new(hostex_collector::source::WmiSource::new())
}

#[cfg(not(windows))]
fn host_source() -> Arc<dyn NativeSource> {
    warn!("no native counter source on this platform, every collector will be unavailable");
    Arc::new(hostex_collector::source::MemorySource::new())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
