//! Message codec: raw bytes to requests, responses to raw bytes.

use serde_json::{Map, Value};

use crate::types::{JsonRpcRequest, McpError, RequestId, Response, JSONRPC_VERSION};

/// Why a frame could not be turned into a request.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Not well-formed JSON, or empty.
    Malformed(String),
    /// Well-formed JSON that is not a valid request. Carries the id when one
    /// could be recovered so the error response can echo it.
    SchemaViolation {
        id: Option<RequestId>,
        reason: String,
    },
}

impl DecodeError {
    pub fn id(&self) -> RequestId {
        match self {
            DecodeError::SchemaViolation { id: Some(id), .. } => id.clone(),
            _ => RequestId::Null,
        }
    }

    pub fn to_mcp_error(&self) -> McpError {
        match self {
            DecodeError::Malformed(reason) => McpError::ParseError(reason.clone()),
            DecodeError::SchemaViolation { reason, .. } => McpError::InvalidRequest(reason.clone()),
        }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Malformed(reason) => write!(f, "malformed message: {reason}"),
            DecodeError::SchemaViolation { reason, .. } => write!(f, "schema violation: {reason}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl Response {
    /// The error response owed for a frame that failed to decode.
    pub fn from_decode_error(error: &DecodeError) -> Self {
        Response::error(error.id(), &error.to_mcp_error())
    }
}

/// Decode one frame into a request.
pub fn decode(bytes: &[u8]) -> Result<JsonRpcRequest, DecodeError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Malformed("Empty message".to_string()));
    }

    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let Value::Object(mut object) = value else {
        return Err(DecodeError::SchemaViolation {
            id: None,
            reason: "Request must be a JSON object".to_string(),
        });
    };

    let id = match object.remove("id") {
        None => {
            return Err(DecodeError::SchemaViolation {
                id: None,
                reason: "Missing request id".to_string(),
            })
        }
        Some(raw) => RequestId::from_value(&raw).ok_or_else(|| DecodeError::SchemaViolation {
            id: None,
            reason: format!("Request id must be a string, integer or null, got {raw}"),
        })?,
    };

    let violation = |reason: String| DecodeError::SchemaViolation {
        id: Some(id.clone()),
        reason,
    };

    match object.remove("jsonrpc") {
        None => {}
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        Some(other) => {
            return Err(violation(format!(
                "Expected jsonrpc version \"{JSONRPC_VERSION}\", got {other}"
            )))
        }
    }

    let method = match object.remove("method") {
        Some(Value::String(m)) if !m.is_empty() => m,
        Some(Value::String(_)) => return Err(violation("Method name must not be empty".into())),
        Some(_) => return Err(violation("Method must be a string".into())),
        None => return Err(violation("Missing method".into())),
    };

    let params = match object.remove("params") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(params)) => params,
        Some(_) => return Err(violation("Params must be an object".into())),
    };

    Ok(JsonRpcRequest {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        method,
        params,
    })
}

/// Encode a response. Always produces a valid JSON-RPC envelope.
pub fn encode(response: &Response) -> Vec<u8> {
    match serde_json::to_vec(response) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Failed to encode response {}: {e}", response.id());
            format!(
                r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":{},"message":"Failed to encode response"}}}}"#,
                crate::types::error_codes::INTERNAL_ERROR
            )
            .into_bytes()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_request() {
        let req = decode(br#"{"jsonrpc":"2.0","id":1,"method":"ping","params":{"a":1}}"#).unwrap();
        assert_eq!(req.id, RequestId::Number(1));
        assert_eq!(req.method, "ping");
        assert_eq!(req.params["a"], 1);
    }

    #[test]
    fn test_decode_defaults() {
        let req = decode(br#"{"id":"abc","method":"tools/list"}"#).unwrap();
        assert_eq!(req.id, RequestId::String("abc".into()));
        assert!(req.params.is_empty());
        assert_eq!(req.jsonrpc, "2.0");

        let req = decode(br#"{"id":null,"method":"ping","params":null}"#).unwrap();
        assert_eq!(req.id, RequestId::Null);
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(decode(b"{not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(b""), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(b"  \n"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_schema_violations() {
        let err = decode(b"[1,2,3]").unwrap_err();
        assert!(matches!(err, DecodeError::SchemaViolation { id: None, .. }));

        let err = decode(br#"{"method":"ping"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::SchemaViolation { id: None, .. }));

        let err = decode(br#"{"id":{"x":1},"method":"ping"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::SchemaViolation { id: None, .. }));

        let err = decode(br#"{"id":5,"params":{}}"#).unwrap_err();
        assert_eq!(err.id(), RequestId::Number(5));

        let err = decode(br#"{"id":5,"method":"ping","params":[1]}"#).unwrap_err();
        assert_eq!(err.id(), RequestId::Number(5));

        let err = decode(br#"{"jsonrpc":"1.0","id":"x","method":"ping"}"#).unwrap_err();
        assert_eq!(err.id(), RequestId::String("x".into()));
    }

    #[test]
    fn test_decode_error_response() {
        let err = decode(br#"{"id":9,"method":42}"#).unwrap_err();
        let response = Response::from_decode_error(&err);
        assert_eq!(response.id(), &RequestId::Number(9));
        assert_eq!(response.error_object().unwrap().code, -32600);

        let response = Response::from_decode_error(&decode(b"}").unwrap_err());
        assert_eq!(response.id(), &RequestId::Null);
        assert_eq!(response.error_object().unwrap().code, -32700);
    }

    #[test]
    fn test_encode_envelopes() {
        let ok = encode(&Response::success(RequestId::Number(3), json!({"x": true})));
        let value: Value = serde_json::from_slice(&ok).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 3, "result": {"x": true}}));

        let err = encode(&Response::error(
            RequestId::String("q".into()),
            &McpError::MethodNotFound("nope".into()),
        ));
        let value: Value = serde_json::from_slice(&err).unwrap();
        assert_eq!(value["id"], "q");
        assert_eq!(value["error"]["code"], -32601);
        assert!(value.get("result").is_none());
        assert!(value["error"].get("data").is_none());
    }
}
