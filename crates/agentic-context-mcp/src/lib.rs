//! AgenticContext MCP Server: negotiated JSON-RPC sessions dispatching named
//! tools against a shared, concurrent state store.

pub mod config;
pub mod protocol;
pub mod repl;
pub mod resources;
pub mod session;
pub mod tools;
pub mod transport;
pub mod types;

pub use config::{resolve_state_path, ServerConfig};
pub use protocol::ProtocolHandler;
pub use session::{Session, SessionState, StateManager};
pub use tools::{handler_fn, ToolHandler, ToolRegistry};
pub use transport::{serve_connection, StdioTransport, TcpServer};
