//! Parlor relay server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin parlor-server
//! cargo run --bin parlor-server -- --bind 0.0.0.0:8080 --reconnect-grace-secs 120
//! ```

use std::time::Duration;

use clap::Parser;
use parlor::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "parlor-server")]
#[command(about = "Host/client room relay for party games", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// How long a client that dropped mid-game keeps its slot
    #[arg(long, default_value_t = 300)]
    reconnect_grace_secs: u64,

    /// How often expired slots are reclaimed
    #[arg(long, default_value_t = 10)]
    sweep_interval_secs: u64,

    /// How long a new peer may take to finish the WebSocket upgrade
    #[arg(long, default_value_t = 10)]
    handshake_timeout_secs: u64,
}

/// `RUST_LOG` overrides the default `info` level.
fn setup_logger(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), ParlorError> {
    setup_logger("info");

    let args = Args::parse();

    let server = RelayServer::builder()
        .bind(&args.bind)
        .session_config(SessionConfig {
            reconnect_grace_secs: args.reconnect_grace_secs,
        })
        .sweep_interval(Duration::from_secs(args.sweep_interval_secs))
        .handshake_timeout(Duration::from_secs(args.handshake_timeout_secs))
        .build()
        .await?;

    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "listening");
    }

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
