//! WebSocket test client speaking the JSON event protocol.

#![allow(dead_code)]

use drift_proto::{ClientEvent, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Default patience for a single expected event.
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected test client.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Connect to a test server.
    pub async fn connect(addr: &str) -> anyhow::Result<Self> {
        let (ws, _response) = connect_async(format!("ws://{addr}")).await?;
        Ok(Self { ws })
    }

    /// Send one event.
    pub async fn send(&mut self, event: &ClientEvent) -> anyhow::Result<()> {
        let frame = serde_json::to_string(event)?;
        self.ws.send(Message::Text(frame)).await?;
        Ok(())
    }

    /// Send a raw text frame (for malformed-input tests).
    pub async fn send_raw(&mut self, frame: &str) -> anyhow::Result<()> {
        self.ws.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    /// Receive the next event, with the default timeout.
    pub async fn recv(&mut self) -> anyhow::Result<ServerEvent> {
        self.recv_timeout(RECV_TIMEOUT).await
    }

    /// Receive the next event within `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> anyhow::Result<ServerEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let frame = tokio::time::timeout(remaining, self.ws.next())
                .await
                .map_err(|_| anyhow::anyhow!("timed out waiting for an event"))?;
            match frame {
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str(&text)?);
                }
                Some(Ok(Message::Close(_))) | None => {
                    anyhow::bail!("connection closed");
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Receive events until `predicate` matches, returning everything seen
    /// (the matching event last).
    pub async fn recv_until(
        &mut self,
        predicate: impl Fn(&ServerEvent) -> bool,
    ) -> anyhow::Result<Vec<ServerEvent>> {
        let mut seen = Vec::new();
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let event = self.recv_timeout(remaining).await?;
            let done = predicate(&event);
            seen.push(event);
            if done {
                return Ok(seen);
            }
        }
    }

    /// Assert that nothing arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) -> anyhow::Result<()> {
        match self.recv_timeout(window).await {
            Ok(event) => anyhow::bail!("expected silence, got {}", event.name()),
            Err(_) => Ok(()),
        }
    }

    /// Wait until the server closes this connection.
    pub async fn wait_for_close(&mut self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.recv_timeout(remaining).await {
                Ok(_) => continue,
                Err(e) if e.to_string().contains("connection closed") => return Ok(()),
                Err(e) if e.to_string().contains("timed out") => {
                    anyhow::bail!("connection never closed")
                }
                // Transport errors also mean the server hung up on us.
                Err(_) => return Ok(()),
            }
        }
    }

    /// Close the client side.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}

/// Shorthand builders for common inbound events.
pub mod events {
    use drift_proto::{
        ClientEvent, JoinQueuePayload, Mode, SendMessagePayload, UserJoinPayload,
    };

    pub fn user_join(session_id: &str) -> ClientEvent {
        ClientEvent::UserJoin(UserJoinPayload {
            session_id: session_id.to_string(),
            interests: Vec::new(),
            mode: None,
        })
    }

    pub fn join_queue(interests: &[&str], mode: Mode) -> ClientEvent {
        ClientEvent::JoinQueue(JoinQueuePayload {
            interests: interests.iter().map(|s| s.to_string()).collect(),
            mode: Some(mode),
        })
    }

    pub fn send_message(content: &str) -> ClientEvent {
        ClientEvent::SendMessage(SendMessagePayload {
            content: content.to_string(),
            message_type: None,
        })
    }
}
