//! Stdio transport: newline-delimited JSON on stdin/stdout.

use tokio::io::{Stdin, Stdout};

use crate::protocol::ProtocolHandler;
use crate::types::McpResult;

use super::{serve_connection, LineReader, LineTransport, LineWriter, Transport};

/// Stdio transport for desktop MCP clients. Logs must go to stderr.
pub struct StdioTransport {
    inner: LineTransport<Stdin, Stdout>,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self {
            inner: LineTransport::new(tokio::io::stdin(), tokio::io::stdout()),
        }
    }

    /// Serve a single session until stdin closes or the client shuts down.
    pub async fn run(self, handler: ProtocolHandler) -> McpResult<()> {
        tracing::info!("Stdio transport started");
        let result = serve_connection(handler, self).await;
        tracing::info!("Stdio transport stopped");
        result
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for StdioTransport {
    type Reader = LineReader<Stdin>;
    type Writer = LineWriter<Stdout>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        self.inner.split()
    }
}
