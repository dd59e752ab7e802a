//! Mock registrar HTTP server
//!
//! In-memory implementation of the registrar API for local runs of the
//! `ticket-desk` CLI and the dashboard. State is lost on exit.
//!
//! Usage:
//!   cargo run --bin mock-registrar -- --port 5000

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use ticket_desk::infra::{logging, Config};
use ticket_desk::io::mock_registrar::{serve, MockRegistrar};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mock-registrar")]
#[command(about = "In-memory conference registrar for local testing")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Bind address (overrides mock.bind_address)
    #[arg(short, long)]
    bind: Option<String>,

    /// TCP port (overrides mock.port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_stderr(args.log_json);

    let config = Config::load_from_path(&Config::resolve_config_path(args.config.as_deref()));
    let bind = args.bind.as_deref().unwrap_or(config.mock_bind_address());
    let port = args.port.unwrap_or(config.mock_port());
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let listener =
        TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {}", addr))?;
    let registrar = Arc::new(MockRegistrar::new(config.event().clone()));

    info!(
        addr = %addr,
        event = %config.event().name,
        "mock_registrar_config"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    serve(listener, registrar, shutdown_rx)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Mock registrar failed")?;
    Ok(())
}
