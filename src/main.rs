use std::io::IsTerminal;
use std::sync::Arc;

use clap::Parser;
use tracing::{Level, info, warn};

use fleetlink::cli::{Cli, Command};
use fleetlink::compactor;
use fleetlink::config::{Config, TenantConfig};
use fleetlink::console::{Console, OutputFormat};
use fleetlink::engine::Engine;
use fleetlink::tenant::TenantManager;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let serving = matches!(cli.command, Command::Serve);

    // Logs go to stderr so command output can be piped
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if serving { Level::INFO } else { Level::WARN })
        .init();

    let mut config = Config::from_env()?;
    if let Some(dir) = cli.global.data_dir.clone() {
        config.data_dir = dir;
    }
    let tenant = config.tenant_config(cli.global.tenant.as_deref())?;
    fleetlink::observability::init(config.metrics_port)?;

    let tenants = TenantManager::new(config.data_dir.clone(), config.compact_threshold);
    let engine = tenants.get_or_create(&tenant.tenant_id)?;

    if serving {
        return serve(engine, &tenant, &config).await;
    }

    let format = if cli.global.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text {
            color: std::io::stdout().is_terminal(),
        }
    };
    let today = chrono::Local::now().date_naive();
    let console = Console::new(engine, tenant, format, today);
    let output = console.execute(cli.command).await?;
    println!("{output}");
    Ok(())
}

/// Keep the tenant open until Ctrl-C or SIGTERM. The compactor and the
/// metrics endpoint run in the background meanwhile.
async fn serve(
    engine: Arc<Engine>,
    tenant: &TenantConfig,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("fleetlink serving tenant {}", tenant.tenant_id);
    info!("  data_dir: {}", config.data_dir.display());
    info!("  compact_threshold: {}", config.compact_threshold);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );
    info!("  vehicles: {}", engine.list_vehicles().await.len());

    shutdown_signal().await?;
    info!("shutdown signal received");

    // Leave a short log behind for the next start
    if let Err(e) = compactor::compact_if_due(&engine, config.compact_threshold).await {
        warn!("final compaction failed: {e}");
    }
    info!("fleetlink stopped");
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
