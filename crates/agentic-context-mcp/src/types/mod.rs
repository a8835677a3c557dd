//! All protocol data types used by the server.

pub mod builtin;
pub mod capabilities;
pub mod error;
pub mod message;

pub use builtin::*;
pub use capabilities::*;
pub use error::*;
pub use message::*;
