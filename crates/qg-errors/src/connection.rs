use serde::Serialize;
use serde_json::json;

/// Single-shot connection error (§6, §7), raised by `ping`/`load`/`close`
/// calls against executors, cache providers, and metadata/role providers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionErrorCode {
    #[error("connection failed{}", url.as_deref().map(|u| format!(" to {u}")).unwrap_or_default())]
    ConnectionFailed {
        url: Option<String>,
        timeout_ms: Option<u64>,
    },
    #[error("network error reaching {unreachable:?}")]
    NetworkError { unreachable: Vec<String> },
    #[error("request timed out after {timeout_ms}ms")]
    RequestTimeout { timeout_ms: u64 },
}

impl ConnectionErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionErrorCode::ConnectionFailed { .. } => "CONNECTION_FAILED",
            ConnectionErrorCode::NetworkError { .. } => "NETWORK_ERROR",
            ConnectionErrorCode::RequestTimeout { .. } => "REQUEST_TIMEOUT",
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            ConnectionErrorCode::ConnectionFailed { url, timeout_ms } => json!({
                "url": url,
                "timeoutMs": timeout_ms,
            }),
            ConnectionErrorCode::NetworkError { unreachable } => json!({
                "unreachable": unreachable,
            }),
            ConnectionErrorCode::RequestTimeout { timeout_ms } => json!({
                "timeoutMs": timeout_ms,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}")]
pub struct ConnectionError {
    pub code: ConnectionErrorCode,
}

impl ConnectionError {
    pub fn new(code: ConnectionErrorCode) -> Self {
        ConnectionError { code }
    }
}

impl Serialize for ConnectionError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ConnectionError", 3)?;
        s.serialize_field("code", self.code.as_str())?;
        s.serialize_field("message", &self.code.to_string())?;
        s.serialize_field("details", &self.code.details())?;
        s.end()
    }
}
