//! Connection - handles an individual client link.
//!
//! Each accepted socket is upgraded to a WebSocket and then served by two
//! cooperating tasks:
//!
//! - the **reader** (this task) decodes inbound frames and dispatches them
//!   in arrival order; it never blocks on fan-out,
//! - a spawned **writer** drains the connection's bounded outbound channel
//!   into the sink, preserving enqueue order.
//!
//! Force-close (heartbeat eviction, overflow, kick) cancels the token in
//! the presence entry; the reader unwinds and runs the single disconnect
//! path, which may open a grace window.

use crate::handlers;
use crate::reconnect;
use crate::state::{ConnId, Core};
use drift_proto::{ClientEvent, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// A client connection handler.
pub struct Connection {
    conn_id: ConnId,
    addr: SocketAddr,
    core: Arc<Core>,
    stream: TcpStream,
}

impl Connection {
    pub fn new(conn_id: ConnId, stream: TcpStream, addr: SocketAddr, core: Arc<Core>) -> Self {
        Self {
            conn_id,
            addr,
            core,
            stream,
        }
    }

    /// Serve the connection until the transport closes or the core cancels
    /// it.
    #[instrument(skip(self), fields(conn = %self.conn_id, addr = %self.addr), name = "connection")]
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            conn_id,
            addr: _,
            core,
            stream,
        } = self;

        let ws = tokio_tungstenite::accept_async(stream).await?;
        let (mut sink, mut frames) = ws.split();

        let capacity = core.config.limits.outbound_capacity;
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<ServerEvent>(capacity);
        let cancel = CancellationToken::new();
        core.presence.accept(conn_id, outgoing_tx, cancel.clone());
        info!("Client connected");

        // Writer: the only place that touches the sink. Exits once the
        // presence entry (the sole sender) is dropped and the channel
        // drains.
        let writer = tokio::spawn(async move {
            while let Some(event) = outgoing_rx.recv().await {
                let frame = match event.to_json() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode outbound event");
                        continue;
                    }
                };
                if sink.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Reader: inbound events in arrival order.
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Connection cancelled");
                    break;
                }
                frame = frames.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&core, conn_id, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary and transport-level ping/pong are ignored;
                        // liveness runs over protocol events.
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "Read error");
                        break;
                    }
                }
            }
        }

        // Single teardown path: queue entry, presence binding, grace.
        reconnect::grace_or_dispose(&core, conn_id).await;

        // Presence dropped the sender above; let the writer flush what was
        // already queued (e.g. a final partner-disconnected).
        let _ = writer.await;
        info!("Client disconnected");
        Ok(())
    }
}

/// Decode one frame and dispatch it. Errors are surfaced to the sender
/// only; they never unwind the reader.
async fn handle_frame(core: &Arc<Core>, conn_id: ConnId, text: &str) {
    let event = match ClientEvent::parse(text) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "Malformed frame");
            core.send_to(
                conn_id,
                ServerEvent::Error {
                    message: "Malformed event".to_string(),
                },
            );
            return;
        }
    };

    let name = event.name();
    if let Err(e) = handlers::dispatch(core, conn_id, event).await {
        handlers::report_error(core, conn_id, name, &e);
    }
}
