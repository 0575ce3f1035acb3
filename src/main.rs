use clap::Parser;
use csv_stream_server::{
    cli::{Cli, Commands},
    config::ServerConfig,
    create_router,
    state::ServerState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "csv_stream_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Dump(args)) => {
            return args
                .execute(&mut std::io::stdout())
                .await
                .map_err(|e| e.into());
        }
        Some(Commands::Serve) | None => {
            // Continue to run server
        }
    }

    // Load configuration
    let config = ServerConfig::from_env()?;

    info!("Starting CSV stream server v{}", VERSION);
    info!("   Bind address: {}", config.bind_address());
    info!("   Data directory: {:?}", config.data_directory);
    info!("   Read chunk size: {} bytes", config.read_chunk_size);
    info!("   Max lines per read: {}", config.max_read_lines);
    info!("   Max open streams: {}", config.max_sessions);
    info!("   CORS origins: {:?}", config.cors_origins);
    if config.is_lan_mode() {
        warn!("Listening on all interfaces; streams are served without authentication");
    }
    if !config.data_directory.is_dir() {
        warn!(
            "Data directory {:?} does not exist; every open will fail",
            config.data_directory
        );
    }

    let state = Arc::new(ServerState::new(config.clone()));

    // Spawn background task to close idle streams
    match config.idle_timeout_seconds {
        Some(timeout) => {
            info!("   Idle stream timeout: {}s", timeout);
            let registry = state.streams.registry().clone();
            let period = Duration::from_secs((timeout as u64 / 2).clamp(1, 60));
            tokio::spawn(async move {
                let mut interval = time::interval(period);
                loop {
                    interval.tick().await;
                    let removed = registry.cleanup_idle(timeout);
                    if removed > 0 {
                        info!("Closed {} idle streams", removed);
                    }
                }
            });
        }
        None => info!("   Idle stream timeout: disabled"),
    }

    let app = create_router(state);

    // Start server
    let addr: SocketAddr = config.bind_address().parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
