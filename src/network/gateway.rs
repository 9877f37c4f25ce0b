//! Gateway - TCP listener that accepts incoming WebSocket connections.
//!
//! The Gateway binds to a socket and spawns a Connection task for each
//! incoming client.

use crate::network::Connection;
use crate::state::Core;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// The Gateway accepts incoming TCP connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    core: Arc<Core>,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(addr: SocketAddr, core: Arc<Core>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "Gateway listening");
        Ok(Self { listener, core })
    }

    /// Run the gateway, accepting connections forever.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> std::io::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let core = Arc::clone(&self.core);
                    let conn_id = Uuid::new_v4();

                    tokio::spawn(async move {
                        let connection = Connection::new(conn_id, stream, addr, core);
                        if let Err(e) = connection.run().await {
                            error!(conn = %conn_id, %addr, error = %e, "Connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}
