//! Protocol core: codec, negotiation, parameter validation, and dispatch.

pub mod codec;
pub mod handler;
pub mod negotiation;
pub mod validator;

pub use codec::{decode, encode, DecodeError};
pub use handler::ProtocolHandler;
pub use negotiation::Negotiated;
