use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use geocode_pipeline::config::{load_config, GeocodeConfig};
use geocode_pipeline::observability::{logging, metrics};
use geocode_pipeline::{HttpServer, Pipeline, Shutdown};

#[derive(Parser)]
#[command(name = "geocode-pipeline")]
#[command(about = "Caching, load-balanced geocoding service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "geocode.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config: GeocodeConfig = load_config(&args.config)?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "geocode-pipeline starting");
    tracing::info!(
        config = %args.config.display(),
        bind_address = %config.server.bind_address,
        providers = config.providers.len(),
        request_timeout_secs = config.server.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let pipeline = Pipeline::from_config(&config)?;

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config.server, pipeline);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    geocode_pipeline::lifecycle::wait_for_signal().await;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
