//! Per-connection handler: read requests, write deliveries.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task. The flow is:
//!   1. Finish the WebSocket upgrade within the handshake timeout
//!   2. Attach an outbound queue to the router, spawn the writer on it
//!   3. Loop: receive a frame → decode → lock the router → run the request
//!   4. On exit (clean close, error or panic) the guard tells the router
//!      the channel is gone

use std::sync::Arc;

use parlor_protocol::{ClientRequest, Codec};
use parlor_transport::{
    Connection, ConnectionId, Handshake, PendingWebSocket, TransportError, WebSocketConnection,
};
use tokio::sync::mpsc;

use crate::error::{ParlorError, RelayError};
use crate::outbox::{Delivery, DeliveryReceiver};
use crate::server::ServerState;

/// Drop guard that reports the channel closed when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct DisconnectGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for DisconnectGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.router.lock().await.on_disconnect(conn_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    pending: PendingWebSocket,
    state: Arc<ServerState<C>>,
) -> Result<(), ParlorError> {
    let peer = pending.peer_addr();
    let conn = tokio::time::timeout(state.handshake_timeout, pending.complete())
        .await
        .map_err(|_| {
            tracing::debug!(%peer, "peer never finished the WebSocket upgrade");
            TransportError::HandshakeTimedOut(state.handshake_timeout)
        })??;
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (tx, rx) = mpsc::unbounded_channel();
    state.router.lock().await.attach(conn_id, tx);
    let _guard = DisconnectGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    let writer_conn = Arc::clone(&conn);
    let writer_state = Arc::clone(&state);
    tokio::spawn(async move {
        if let Err(e) = write_deliveries(&writer_conn, rx, &writer_state.codec).await {
            tracing::debug!(%conn_id, error = %e, "writer stopped");
        }
    });

    loop {
        let data = match conn.recv().await? {
            Some(data) => data,
            None => {
                tracing::info!(%conn_id, "connection closed");
                break;
            }
        };

        // Decode before taking the lock; only routing needs it.
        let request = ClientRequest::decode(&state.codec, &data);

        let mut router = state.router.lock().await;
        match request {
            Ok(request) => router.handle(conn_id, request),
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "undecodable request");
                router.report(conn_id, &RelayError::from(e));
            }
        }
    }

    // _guard drops here → router.on_disconnect fires.
    Ok(())
}

/// Drains a connection's delivery queue onto the socket.
///
/// Ends when the router drops the queue's sender, or after a
/// [`Delivery::Close`].
async fn write_deliveries(
    conn: &WebSocketConnection,
    mut rx: DeliveryReceiver,
    codec: &impl Codec,
) -> Result<(), ParlorError> {
    while let Some(delivery) = rx.recv().await {
        let bytes = match delivery {
            Delivery::Event(event) => codec.encode(&event)?,
            Delivery::Forward(payload) => codec.encode(&payload)?,
            Delivery::Close => {
                conn.close().await?;
                break;
            }
        };
        conn.send(&bytes).await?;
    }
    Ok(())
}
