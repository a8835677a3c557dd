//! Session lifecycle and state management.

pub mod lifecycle;
pub mod manager;
pub mod registry;

pub use lifecycle::{Session, SessionState};
pub use manager::StateManager;
pub use registry::SessionRegistry;
