//! Raw TCP transport: one session per accepted connection.

use tokio::net::TcpListener;

use crate::protocol::ProtocolHandler;
use crate::types::{McpError, McpResult};

use super::{serve_connection, LineTransport};

pub struct TcpServer {
    handler: ProtocolHandler,
}

impl TcpServer {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self { handler }
    }

    /// Accept connections on `addr` until Ctrl-C.
    pub async fn run(&self, addr: &str) -> McpResult<()> {
        let listener = TcpListener::bind(addr).await.map_err(McpError::Io)?;
        tracing::info!("TCP transport listening on {addr}");
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until Ctrl-C.
    pub async fn serve(&self, listener: TcpListener) -> McpResult<()> {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!("Accept failed: {e}");
                            continue;
                        }
                    };
                    tracing::info!("Connection from {peer}");
                    let (read_half, write_half) = stream.into_split();
                    let handler = self.handler.clone();
                    tokio::spawn(async move {
                        let transport = LineTransport::new(read_half, write_half);
                        if let Err(e) = serve_connection(handler, transport).await {
                            tracing::warn!("Connection from {peer} ended with error: {e}");
                        }
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, stopping TCP transport");
                    break;
                }
            }
        }

        if let Err(e) = self.handler.state().save() {
            tracing::error!("Failed to save state on exit: {e}");
        }
        Ok(())
    }
}
