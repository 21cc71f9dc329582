use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_master::config::{load_config, Config};
use cache_master::http;
use cache_master::service::MasterService;

/// Master namespace and placement service.
#[derive(Parser, Debug)]
struct Args {
    /// Path to a TOML config file; falls back to built-in defaults when
    /// absent.
    #[arg(long, default_value = "master.toml")]
    config: PathBuf,

    /// Overrides `bind_address` from the config file.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_master=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config: Config = load_config(&args.config);
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    let bind_address = config.bind_address.clone();
    let service = MasterService::new(config);

    spawn_timeout_sweeper(service.clone());

    let app = http::router(service);
    tracing::info!(%bind_address, "master listening");
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .expect("failed to bind master address");
    axum::serve(listener, app).await.expect("master server crashed");
}

/// Periodically drops workers that have stopped heartbeating, the
/// master-side half of the timeout contract in section 4.3.
fn spawn_timeout_sweeper(service: MasterService) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            service.sweep_timed_out_workers();
        }
    });
}
