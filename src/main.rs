//! Album Art Display
//!
//! Now-playing tracker for a local-network speaker with high-resolution
//! album artwork and SSE push to display clients.

use album_art_display::{api, artwork, broadcaster, config, device, poller};

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "album_art_display=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting Album Art Display v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = config::load_config()?;
    if config.device.host.is_empty() {
        anyhow::bail!("no speaker configured: set device.host in the config file or AAD_DEVICE__HOST");
    }
    tracing::info!(
        "Configuration loaded, device: {}, port: {}",
        config.device.host,
        config.port
    );

    // State broadcaster
    let broadcaster = Arc::new(broadcaster::StateBroadcaster::with_default_capacity());

    // Artwork resolution pipeline
    let lookup = Arc::new(artwork::ItunesClient::new(
        config.artwork.image_size,
        config.artwork.lookup_timeout(),
    ));
    let resolver = Arc::new(artwork::ArtworkResolver::new(
        lookup,
        Arc::new(artwork::ArtworkCache::new()),
        Arc::new(artwork::RateLimitGate::new()),
        config.artwork.prefer_external,
        config.artwork.cooldown(),
    ));
    tracing::info!(
        "Artwork resolver initialized (external lookup {})",
        if config.artwork.prefer_external { "enabled" } else { "disabled" }
    );

    // Device client
    let sonos = Arc::new(device::SonosDevice::new(
        &config.device.host,
        config.device.queue_lookahead,
        config.device.query_timeout(),
    ));

    // Start the poll loop
    let shutdown = CancellationToken::new();
    let settings = poller::PollerSettings::from(&config);
    let poll_task = tokio::spawn(
        poller::DevicePoller::new(sonos, resolver, broadcaster.clone(), settings)
            .run(shutdown.clone()),
    );
    tracing::info!("Device poller started for {}", config.device.host);

    // Build API routes
    let state = api::AppState::new(broadcaster, config.device.host.clone());
    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup: stop the poller
    tracing::info!("Shutting down poller...");
    shutdown.cancel();
    let _ = poll_task.await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
