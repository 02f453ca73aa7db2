//! txcost-sim: real-time transaction-cost simulator for a crypto L2 order
//! book. Ingests a live orderbook feed, runs slippage/fee/impact/maker-taker
//! models on every batch of updates, and publishes the result behind an
//! HTTP control surface.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::prelude::*;

use txcost_sim::api;
use txcost_sim::config::Config;
use txcost_sim::simulator::Simulator;
use txcost_sim::transport::WebsocketIngest;

/// CLI overrides for the environment-driven configuration. Every flag falls
/// back to its `env`-named variable, then the documented default.
#[derive(Parser, Debug)]
#[command(name = "txcost-sim")]
#[command(about = "Real-time transaction-cost simulator for a crypto L2 order book")]
struct Args {
    /// Address to bind the HTTP control surface to.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind the HTTP control surface to.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Upstream L2-orderbook WebSocket URL.
    #[arg(long, env = "WEBSOCKET_URL")]
    websocket_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing();

    let mut config = Config::from_env().context("failed to load configuration")?;
    config.host = args.host;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(url) = args.websocket_url {
        config.websocket_url = url;
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid HOST/PORT")?;
    let websocket_url = config.websocket_url.clone();

    let simulator = Simulator::new(config);
    simulator.start();

    let ingest = WebsocketIngest::new(websocket_url, simulator.clone());
    tokio::spawn(ingest.run());

    let app = api::router(simulator);

    info!(%addr, "txcost-sim listening");
    let listener = TcpListener::bind(addr).await.context("failed to bind HTTP listener")?;
    axum::serve(listener, app).await.context("HTTP server error")?;

    Ok(())
}

/// Env-filter first, falling back to a crate-scoped default, then a plain
/// `fmt` layer.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "txcost_sim=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
