//! Transport layer: byte-frame channels and the per-connection driver.

use async_trait::async_trait;

use crate::types::McpResult;

pub mod connection;
pub mod framing;
#[cfg(feature = "http")]
pub mod http;
pub mod line;
pub mod stdio;
pub mod tcp;

pub use connection::serve_connection;
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use line::{LineReader, LineTransport, LineWriter};
pub use stdio::StdioTransport;
pub use tcp::TcpServer;

/// Inbound half of a connection.
#[async_trait]
pub trait MessageReader: Send {
    /// Next complete frame, or `None` at end of stream.
    ///
    /// Must be cancel safe: dropping the future before it completes loses no
    /// bytes.
    async fn receive(&mut self) -> McpResult<Option<Vec<u8>>>;
}

/// Outbound half of a connection.
#[async_trait]
pub trait MessageWriter: Send {
    async fn send(&mut self, frame: &[u8]) -> McpResult<()>;
}

/// A bidirectional channel that can be split into independently owned halves.
pub trait Transport {
    type Reader: MessageReader + 'static;
    type Writer: MessageWriter + 'static;

    fn split(self) -> (Self::Reader, Self::Writer);
}
