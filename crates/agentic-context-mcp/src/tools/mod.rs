//! Method registry and the bundled handler modules.

pub mod agents;
pub mod registry;
pub mod slots;
pub mod tasks;
pub mod tickets;

pub use registry::{default_registry, handler_fn, FnHandler, ToolEntry, ToolHandler, ToolRegistry};
