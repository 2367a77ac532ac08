//! Request envelope parsing and response envelopes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::DispatchError;

/// Envelope protocol version echoed in every response.
pub const JSONRPC_VERSION: &str = "2.0";

/// The operations a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Initialize,
    Ping,
    ListTools,
    CallTool,
}

impl Operation {
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "initialize" => Some(Operation::Initialize),
            "ping" => Some(Operation::Ping),
            "tools/list" => Some(Operation::ListTools),
            "tools/call" => Some(Operation::CallTool),
            _ => None,
        }
    }
}

/// A parsed request. `params` is always an object; absent params parse as
/// an empty one.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub method: String,
    pub params: Map<String, Value>,
    pub id: Value,
}

/// A body that could not be parsed. Carries whatever id was recoverable so
/// the error response can still echo it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct EnvelopeError {
    pub id: Value,
    pub reason: String,
}

impl EnvelopeError {
    fn new(id: Value, reason: &str) -> Self {
        Self {
            id,
            reason: reason.to_string(),
        }
    }
}

impl From<EnvelopeError> for DispatchError {
    fn from(err: EnvelopeError) -> Self {
        DispatchError::MalformedPayload(err.reason)
    }
}

impl Envelope {
    pub fn parse(raw: &[u8]) -> Result<Self, EnvelopeError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(EnvelopeError::new(Value::Null, "empty body"));
        }
        let value: Value = serde_json::from_slice(raw)
            .map_err(|_| EnvelopeError::new(Value::Null, "body is not valid JSON"))?;
        let Value::Object(mut obj) = value else {
            return Err(EnvelopeError::new(Value::Null, "body is not a JSON object"));
        };

        let id = obj.remove("id").unwrap_or(Value::Null);
        let method = match obj.remove("method") {
            Some(Value::String(m)) if !m.trim().is_empty() => m.trim().to_string(),
            _ => return Err(EnvelopeError::new(id, "method must be a non-empty string")),
        };
        let params = match obj.remove("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(p)) => p,
            Some(_) => return Err(EnvelopeError::new(id, "params must be an object")),
        };

        Ok(Self { method, params, id })
    }

    pub fn operation(&self) -> Result<Operation, DispatchError> {
        Operation::parse(&self.method)
            .ok_or_else(|| DispatchError::UnknownOperation(self.method.clone()))
    }

    /// `params.name` for `tools/call`, trimmed. Blank or non-string names
    /// are malformed.
    pub fn tool_name(&self) -> Result<&str, DispatchError> {
        match self.params.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => Ok(name.trim()),
            _ => Err(DispatchError::MalformedPayload(
                "name parameter required".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub kind: String,
    pub message: String,
}

/// Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: &DispatchError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(RpcErrorBody {
                kind: error.kind().into(),
                message: error.to_string(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal() {
        let env = Envelope::parse(br#"{"method":"tools/list"}"#).unwrap();
        assert_eq!(env.method, "tools/list");
        assert!(env.params.is_empty());
        assert_eq!(env.id, Value::Null);
        assert_eq!(env.operation().unwrap(), Operation::ListTools);
    }

    #[test]
    fn test_parse_keeps_id_and_params() {
        let env = Envelope::parse(
            br#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"search_posts","arguments":{"query":"x"}}}"#,
        )
        .unwrap();
        assert_eq!(env.id, json!(7));
        assert_eq!(env.tool_name().unwrap(), "search_posts");
        assert_eq!(env.params["arguments"]["query"], "x");
    }

    #[test]
    fn test_parse_failures() {
        let cases: [&[u8]; 8] = [
            b"",
            b"   ",
            b"not json",
            b"[1,2]",
            br#"{"params":{}}"#,
            br#"{"method":""}"#,
            br#"{"method":42}"#,
            br#"{"method":"tools/list","params":[1]}"#,
        ];
        for raw in cases {
            assert!(Envelope::parse(raw).is_err(), "{:?}", String::from_utf8_lossy(raw));
        }
    }

    #[test]
    fn test_parse_failure_recovers_id() {
        let err = Envelope::parse(br#"{"id":"abc","params":{}}"#).unwrap_err();
        assert_eq!(err.id, json!("abc"));
        assert!(matches!(
            DispatchError::from(err),
            DispatchError::MalformedPayload(_)
        ));
    }

    #[test]
    fn test_unknown_operation() {
        let env = Envelope::parse(br#"{"method":"resources/list"}"#).unwrap();
        assert_eq!(
            env.operation(),
            Err(DispatchError::UnknownOperation("resources/list".into()))
        );
    }

    #[test]
    fn test_tool_name_required() {
        for params in [json!({}), json!({"name": "  "}), json!({"name": 3})] {
            let env = Envelope {
                method: "tools/call".into(),
                params: params.as_object().unwrap().clone(),
                id: Value::Null,
            };
            assert!(matches!(
                env.tool_name(),
                Err(DispatchError::MalformedPayload(_))
            ));
        }
    }

    #[test]
    fn test_response_shapes() {
        let ok = serde_json::to_value(RpcResponse::success(json!(1), json!({"tools": []}))).unwrap();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "id": 1, "result": {"tools": []}}));

        let err = RpcResponse::failure(json!(2), &DispatchError::UnknownCapability("nope".into()));
        assert!(err.is_error());
        let err = serde_json::to_value(err).unwrap();
        assert_eq!(err["error"]["kind"], "unknown_capability");
        assert!(err.get("result").is_none());
    }
}
