//! Read-only views of the store, addressed by URI.

pub mod registry;
pub mod templates;

pub use registry::ResourceRegistry;
