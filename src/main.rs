use std::net::SocketAddr;

use clap::Parser;
use edge_proxy::{app_state::AppState, config::Config, router};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Enable verbose logging, equivalent to `RUST_LOG=info,edge_proxy=trace`.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_filter = if args.verbose { "info,edge_proxy=trace" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stdout))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let config = match Config::try_read() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("failed to read config: {error}");
            std::process::exit(1);
        }
    };
    let pretty_config = serde_json::to_string_pretty(&config)
        .unwrap_or_else(|_| "<config serialization failed>".to_string());
    tracing::debug!(config = pretty_config, "resolved configuration");
    if let Err(error) = config.validate() {
        tracing::error!(%error, "configuration validation failed");
        std::process::exit(1);
    }

    let port = config.port;
    let app_state = match AppState::build(config).await {
        Ok(app_state) => app_state,
        Err(error) => {
            tracing::error!(%error, "failed to initialize application state");
            std::process::exit(1);
        }
    };

    let app = router::build(app_state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, %addr, "failed to bind listener");
            std::process::exit(1);
        }
    };

    info!(%addr, "edge-proxy listening");
    let serve = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>());

    if let Err(error) = serve.with_graceful_shutdown(wait_for_shutdown_signals()).await {
        tracing::error!(%error, "server error");
        std::process::exit(1);
    }
}

async fn wait_for_shutdown_signals() {
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT signal");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM signal");

    tokio::select! {
        _ = sigint.recv() => {
            warn!("SIGINT received, starting graceful shutdown");
        },
        _ = sigterm.recv() => {
            warn!("SIGTERM received, starting graceful shutdown");
        },
    }
}
