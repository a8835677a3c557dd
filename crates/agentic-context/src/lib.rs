//! AgenticContext core: concurrent keyed records, transition tables, and context slots.

pub mod context;
pub mod fsm;
pub mod storage;
pub mod store;
pub mod types;

pub use context::{ContextSnapshot, ContextStore, StoreStats};
pub use fsm::{Transition, TransitionTable};
pub use storage::{SnapshotReader, SnapshotWriter};
pub use store::StateStore;
pub use types::*;
