#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use pichord::{ChordService, DigitSequence, FileStore, ImageStore, MemoryStore};
use server::config::{CliArgs, ServerConfig};
use server::identity::JwtVerifier;
use server::scheduler::spawn_rerender_loop;
use server::service::handler::{AppState, Service, Store, router};
use server::telemetry::{RenderMetrics, init_telemetry};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let service = Arc::new(build_service(&config)?);

    // Serve something from the first request on, even before anyone claims a
    // position.
    {
        let service = Arc::clone(&service);
        match tokio::task::spawn_blocking(move || service.ensure_rendered()).await? {
            Ok(Some(report)) => tracing::info!(
                assigned_count = report.assigned_count,
                "Initial render published"
            ),
            Ok(None) => {}
            Err(err) => tracing::error!(error = %err, "Initial render failed"),
        }
    }

    let shutdown = CancellationToken::new();
    let scheduler = config
        .render_interval
        .map(|every| spawn_rerender_loop(Arc::clone(&service), every, shutdown.clone()));

    let state = AppState::new(
        Arc::clone(&service),
        JwtVerifier::new(&config.jwt),
        config.admin_token.clone(),
    );
    let app = router(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&config.server_addr, &config);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    if let Some(handle) = scheduler {
        if tokio::time::timeout(config.shutdown_timeout, handle)
            .await
            .is_err()
        {
            tracing::warn!("Re-render loop did not stop within the shutdown timeout");
        }
    }

    tracing::info!("Service shut down successfully");
    providers.shutdown();
    Ok(())
}

fn build_service(config: &ServerConfig) -> anyhow::Result<Service> {
    let store: Store = match &config.data_path {
        Some(path) => Box::new(FileStore::open(path)?),
        None => {
            tracing::warn!("DATA_PATH not set; assignments are kept in memory only");
            Box::new(MemoryStore::new())
        }
    };

    let digits = DigitSequence::load(&config.digits_path);

    let mut images = ImageStore::new(&config.public_base_url, config.resolutions.latest());
    if let Some(dir) = &config.wallpaper_dir {
        images = images.with_mirror(dir);
    }

    Ok(
        ChordService::new(store, digits, config.resolutions.clone(), images)
            .with_observer(RenderMetrics),
    )
}

fn log_startup_info(addr: &str, config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting pichord on {} with full config: {:#?}", addr, config);
    } else {
        tracing::info!(
            "Starting pichord on {} with {} resolutions",
            addr,
            config.resolutions.len()
        );
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
        () = shutdown.cancelled() => {},
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
    shutdown.cancel();
}
