use anyhow::{Context, Result};
use clap::Parser;
use live_session::{create_router, AppState, Config, LiveAdapter, SessionController};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "live-session", version, about = "Realtime audio/video session with a live conversational service")]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/live-session")]
    config: String,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let bind = args.bind.unwrap_or_else(|| cfg.service.http.bind.clone());
    let port = args.port.unwrap_or(cfg.service.http.port);

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Remote model: {} (voice {})", cfg.remote.model, cfg.remote.voice);

    let live = cfg.live_config();
    if live.api_key.is_none() {
        info!("No API key configured; set GEMINI_API_KEY or remote.api_key");
    }

    let controller = Arc::new(SessionController::new(
        cfg.session_config(),
        Arc::new(LiveAdapter::new(live)),
        Arc::new(cfg.devices()),
    ));

    let app = create_router(AppState::new(Arc::clone(&controller)));

    let listener = tokio::net::TcpListener::bind((bind.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", bind, port))?;
    info!("HTTP server listening on {}:{}", bind, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Stop a running session before the bridge goes away
    let controller = Arc::clone(&controller);
    tokio::task::spawn_blocking(move || {
        if controller.stop().is_ok() {
            info!("Stopped active session on shutdown");
        }
    })
    .await
    .context("Shutdown task failed")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown requested");
}
