use std::{path::PathBuf, process, sync::Arc};

use clap::Parser;
use shelly_exporter::{
    config::{
        devices::{duplicate_names, DeviceConfig},
        Config,
    },
    core::{
        device::HttpDeviceClient,
        exposition::TelemetryGauges,
        poller::PollCycle,
        registry::MetricsRegistry,
        scheduler::Scheduler,
        server::ExposureServer,
    },
    logger::LoggerManager,
    print_error, print_info,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "shelly-exporter", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "SHELLY_EXPORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

fn log_devices_table(devices: &[DeviceConfig]) {
    let name_width = devices
        .iter()
        .map(|d| d.name.len())
        .max()
        .unwrap_or(0)
        .max("Device".len());

    info!("{:<width$} | Address", "Device", width = name_width);
    info!("{}-+-{}", "-".repeat(name_width), "-".repeat(24));
    for device in devices {
        info!("{:<width$} | {}", device.name, device.address, width = name_width);
    }
}

async fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
        _ = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let cfg = Config::new(cli.config.as_deref()).unwrap_or_else(|e| {
        print_error!("{}", e);
        process::exit(1);
    });

    if cli.check {
        print_info!("Configuration is valid ({} devices)", cfg.devices.len());
        return Ok(());
    }

    let mut logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting shelly-exporter version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", cfg.logger.level);
    debug!("{:#?}", cfg.poller);

    log_devices_table(&cfg.devices);
    for (name, count) in duplicate_names(&cfg.devices) {
        warn!(
            "Device name '{}' is configured {} times; its readings share one label",
            name, count
        );
    }

    if let Err(e) = TelemetryGauges::new() {
        error!("Failed to register metrics: {}", e);
        process::exit(1);
    }

    let client = HttpDeviceClient::new().unwrap_or_else(|e| {
        error!("{}", e);
        process::exit(1);
    });

    let server = ExposureServer::bind(&cfg.server).await.unwrap_or_else(|e| {
        error!("{}", e);
        process::exit(1);
    });

    let registry = Arc::new(MetricsRegistry::new());
    let shutdown = CancellationToken::new();

    tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    let server_task = tokio::spawn(server.run(registry.clone(), shutdown.clone()));

    let cycle = PollCycle::new(
        cfg.devices.clone(),
        Arc::new(client),
        registry,
        cfg.poller.timeout(),
    );
    Scheduler::new(cycle, cfg.poller.interval())
        .run(shutdown.clone())
        .await;

    server_task.await??;
    info!("Shutdown complete");
    Ok(())
}
