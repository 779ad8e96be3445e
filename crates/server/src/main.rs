use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use context::create_store;
use std::net::SocketAddr;
use std::sync::Arc;
use tracestore_server::create_router;

/// OTLP/JSON trace ingestion and query server
#[derive(Parser, Debug)]
#[command(name = "tracestore-server")]
#[command(about = "OTLP/JSON trace ingestion and query server", long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info")),
        )
        .with_target(true)
        .with_line_number(true)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    config.validate()?;

    let store = Arc::new(create_store(&config).context("Failed to open span store")?);

    let addr: SocketAddr = config
        .server
        .listen_address
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.server.listen_address))?;

    let router = create_router(Arc::clone(&store), &config.server);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(address = %addr, "Trace store server started");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close();
    tracing::info!("Trace store server shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
