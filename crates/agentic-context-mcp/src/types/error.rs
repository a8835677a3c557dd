//! Error types and JSON-RPC error codes for the server.
//!
//! Protocol errors use the JSON-RPC reserved range; negotiation and session
//! errors sit in the implementation-defined server range; domain errors
//! (raised by handlers for syntactically valid requests) have their own block.

use serde_json::{json, Value};

use agentic_context::ContextError;

use super::message::{JsonRpcError, JsonRpcErrorObject, RequestId, JSONRPC_VERSION};

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Session and negotiation error codes.
pub mod session_error_codes {
    pub const NO_COMPATIBLE_VERSION: i32 = -32000;
    pub const SESSION_NOT_READY: i32 = -32002;

    /// HTTP transport: missing or invalid bearer token.
    pub const UNAUTHORIZED: i32 = -32900;
}

/// Domain error codes returned by handlers.
pub mod domain_error_codes {
    pub const ALREADY_EXISTS: i32 = -32040;
    pub const NOT_FOUND: i32 = -32041;
    pub const INVALID_TRANSITION: i32 = -32042;
    pub const REJECTED: i32 = -32043;
}

/// All errors that can occur in the server.
#[derive(thiserror::Error, Debug)]
pub enum McpError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("No compatible protocol version (requested {requested:?}, supported {supported:?})")]
    NoCompatibleVersion {
        requested: Vec<String>,
        supported: Vec<String>,
    },

    #[error("Session not ready: {0}")]
    SessionNotReady(String),

    #[error("Capability not negotiated: {0}")]
    CapabilityNotNegotiated(String),

    #[error("Duplicate method: {0}")]
    DuplicateMethod(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition for {kind}: cannot apply '{event}' in state '{from}'")]
    InvalidTransition {
        kind: String,
        from: String,
        event: String,
    },

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unauthorized")]
    Unauthorized,
}

impl McpError {
    pub fn code(&self) -> i32 {
        use domain_error_codes::*;
        use error_codes::*;
        use session_error_codes::*;
        match self {
            McpError::ParseError(_) => PARSE_ERROR,
            McpError::InvalidRequest(_) | McpError::CapabilityNotNegotiated(_) => INVALID_REQUEST,
            McpError::MethodNotFound(_) => METHOD_NOT_FOUND,
            McpError::InvalidParams(_) => INVALID_PARAMS,
            McpError::InternalError(_) | McpError::DuplicateMethod(_) => INTERNAL_ERROR,
            McpError::NoCompatibleVersion { .. } => NO_COMPATIBLE_VERSION,
            McpError::SessionNotReady(_) => SESSION_NOT_READY,
            McpError::AlreadyExists(_) => ALREADY_EXISTS,
            McpError::NotFound(_) => NOT_FOUND,
            McpError::InvalidTransition { .. } => INVALID_TRANSITION,
            McpError::Rejected(_) => REJECTED,
            McpError::Transport(_) | McpError::Io(_) => INTERNAL_ERROR,
            McpError::Json(_) => INTERNAL_ERROR,
            McpError::Unauthorized => UNAUTHORIZED,
        }
    }

    /// Business-rule failure on a syntactically valid request.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            McpError::AlreadyExists(_)
                | McpError::NotFound(_)
                | McpError::InvalidTransition { .. }
                | McpError::Rejected(_)
        )
    }

    /// Unexpected failure inside the server rather than a caller mistake.
    pub fn is_internal(&self) -> bool {
        self.code() == error_codes::INTERNAL_ERROR
    }

    /// Structured detail attached to the error object.
    pub fn data(&self) -> Option<Value> {
        match self {
            McpError::NoCompatibleVersion {
                requested,
                supported,
            } => Some(json!({ "requested": requested, "supported": supported })),
            McpError::SessionNotReady(state) => Some(json!({ "state": state })),
            McpError::CapabilityNotNegotiated(name) => Some(json!({ "capability": name })),
            McpError::AlreadyExists(key) => Some(json!({ "kind": "already_exists", "key": key })),
            McpError::NotFound(key) => Some(json!({ "kind": "not_found", "key": key })),
            McpError::InvalidTransition { kind, from, event } => Some(json!({
                "kind": "invalid_transition",
                "entity": kind,
                "from": from,
                "event": event,
            })),
            McpError::Rejected(reason) => Some(json!({ "kind": "rejected", "reason": reason })),
            _ => None,
        }
    }

    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        JsonRpcErrorObject {
            code: self.code(),
            message: self.to_string(),
            data: self.data(),
        }
    }

    pub fn to_json_rpc_error(&self, id: RequestId) -> JsonRpcError {
        JsonRpcError {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error: self.to_error_object(),
        }
    }
}

impl From<ContextError> for McpError {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::AlreadyExists(key) => McpError::AlreadyExists(key),
            ContextError::NotFound(key) => McpError::NotFound(key),
            ContextError::InvalidTransition { kind, from, event } => {
                McpError::InvalidTransition { kind, from, event }
            }
            ContextError::Rejected(reason) => McpError::Rejected(reason),
            ContextError::InvalidInput(msg) => McpError::InvalidParams(msg),
            ContextError::Storage(msg) => McpError::InternalError(msg),
            ContextError::Io(e) => McpError::Io(e),
        }
    }
}

pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            McpError::ParseError(String::new()),
            McpError::InvalidRequest(String::new()),
            McpError::MethodNotFound(String::new()),
            McpError::InvalidParams(String::new()),
            McpError::InternalError(String::new()),
            McpError::NoCompatibleVersion {
                requested: vec![],
                supported: vec![],
            },
            McpError::SessionNotReady(String::new()),
            McpError::AlreadyExists(String::new()),
            McpError::NotFound(String::new()),
            McpError::InvalidTransition {
                kind: String::new(),
                from: String::new(),
                event: String::new(),
            },
            McpError::Rejected(String::new()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(McpError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_domain_classification() {
        assert!(McpError::AlreadyExists("task:1".into()).is_domain());
        assert!(!McpError::MethodNotFound("x".into()).is_domain());
        assert!(McpError::InternalError("boom".into()).is_internal());
        assert!(!McpError::InvalidParams("bad".into()).is_internal());
    }

    #[test]
    fn test_context_error_mapping() {
        let e: McpError = ContextError::InvalidTransition {
            kind: "task".into(),
            from: "SHIPPING".into(),
            event: "assembled".into(),
        }
        .into();
        assert_eq!(e.code(), domain_error_codes::INVALID_TRANSITION);
        let data = e.data().unwrap();
        assert_eq!(data["kind"], "invalid_transition");
        assert_eq!(data["from"], "SHIPPING");

        let e: McpError = ContextError::InvalidInput("role".into()).into();
        assert_eq!(e.code(), error_codes::INVALID_PARAMS);
    }

    #[test]
    fn test_error_object_carries_data() {
        let err = McpError::NotFound("ticket:TK-1".into()).to_json_rpc_error(RequestId::Number(7));
        assert_eq!(err.id, RequestId::Number(7));
        assert_eq!(err.error.code, -32041);
        assert_eq!(err.error.data.unwrap()["key"], "ticket:TK-1");
    }
}
