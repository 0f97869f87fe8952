//! `RelayServer` builder and server loop.
//!
//! This is the entry point for running a Parlor relay. It ties together
//! all the layers: transport → protocol → router (rooms + sessions).

use std::sync::Arc;
use std::time::Duration;

use parlor_protocol::{Codec, JsonCodec};
use parlor_session::SessionConfig;
use parlor_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ParlorError;
use crate::handler::handle_connection;
use crate::router::Router;

/// How often disconnected slots are checked against the grace period,
/// unless configured otherwise.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// How long an accepted TCP peer may take to finish the WebSocket upgrade,
/// unless configured otherwise.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The router is
/// the only mutable state, and every operation holds its lock from start
/// to finish.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) router: Mutex<Router>,
    pub(crate) codec: C,
    pub(crate) handshake_timeout: Duration,
}

/// Builder for configuring and starting a relay server.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use parlor::prelude::*;
///
/// # async fn run() -> Result<(), ParlorError> {
/// let server = RelayServer::builder()
///     .bind("0.0.0.0:8080")
///     .session_config(SessionConfig { reconnect_grace_secs: 120 })
///     .sweep_interval(Duration::from_secs(5))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RelayServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    sweep_interval: Duration,
    handshake_timeout: Duration,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration (reconnect grace period).
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets how often stale slots are swept. A zero interval falls back to
    /// [`DEFAULT_SWEEP_INTERVAL`].
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = if interval.is_zero() {
            DEFAULT_SWEEP_INTERVAL
        } else {
            interval
        };
        self
    }

    /// Sets how long a new peer may take to finish the WebSocket upgrade
    /// before it is dropped. A zero timeout falls back to
    /// [`DEFAULT_HANDSHAKE_TIMEOUT`].
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = if timeout.is_zero() {
            DEFAULT_HANDSHAKE_TIMEOUT
        } else {
            timeout
        };
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<RelayServer<JsonCodec>, ParlorError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            router: Mutex::new(Router::new(self.session_config)),
            codec: JsonCodec,
            handshake_timeout: self.handshake_timeout,
        });

        Ok(RelayServer {
            transport,
            state,
            sweep_interval: self.sweep_interval,
        })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound relay server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RelayServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    sweep_interval: Duration,
}

impl RelayServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }
}

impl<C: Codec> RelayServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Starts the stale-slot sweeper, then accepts incoming connections and
    /// spawns a handler task for each. Runs until the process is terminated
    /// or the returned future is dropped, which also stops the sweeper.
    pub async fn run(mut self) -> Result<(), ParlorError> {
        tracing::info!(sweep_interval = ?self.sweep_interval, "Parlor relay running");

        let _sweeper = SweeperGuard(tokio::spawn(sweep_stale_slots(
            Arc::clone(&self.state),
            self.sweep_interval,
        )));

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    // The upgrade runs on the connection's own task, so a
                    // silent peer never holds up the next accept.
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(pending, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Aborts the sweeper task when the server loop goes away.
struct SweeperGuard(JoinHandle<()>);

impl Drop for SweeperGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Periodically reclaims client slots that outlived the grace period.
async fn sweep_stale_slots<C: Codec>(state: Arc<ServerState<C>>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let expired = state.router.lock().await.expire_stale();
        if expired > 0 {
            tracing::info!(expired, "reclaimed stale client slots");
        }
    }
}
