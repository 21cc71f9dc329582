use std::future::IntoFuture;
use std::path::PathBuf;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_worker::config::{load_config, Config};
use cache_worker::http;
use cache_worker::membership;
use cache_worker::service::WorkerService;
use cache_worker::storage::WorkerStorage;

/// Worker storage node: admits cached files into a bounded memory
/// budget and reports in to the master over the heartbeat protocol.
#[derive(Parser, Debug)]
struct Args {
    /// Path to a TOML config file; falls back to built-in defaults when
    /// absent.
    #[arg(long, default_value = "worker.toml")]
    config: PathBuf,

    /// Overrides `bind_address` from the config file.
    #[arg(long)]
    bind: Option<String>,

    /// Overrides `master_address` from the config file.
    #[arg(long)]
    master: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_worker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config: Config = load_config(&args.config);
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(master) = args.master {
        config.master_address = master;
    }

    let storage = WorkerStorage::new(
        config.capacity_bytes,
        config.data_folder.clone(),
        config.temp_folder.clone(),
        config.underfs_temp_folder.clone(),
        config.underfs_data_folder.clone(),
    )
    .expect("failed to prepare worker storage directories");

    let bind_address = config.bind_address.clone();
    let service = WorkerService::new(config, storage);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let heartbeat_service = service.clone();
    let heartbeat_task = tokio::spawn(membership::run(heartbeat_service, shutdown_rx));

    let app = http::router(service);
    tracing::info!(%bind_address, "worker listening");
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .expect("failed to bind worker address");

    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "worker server crashed");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = heartbeat_task.await;
}
