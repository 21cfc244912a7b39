//! MCP Transport - 전송 계층 구현
//!
//! MCP 서버와의 통신을 위한 전송 계층
//! - Stdio: 로컬 프로세스와 stdin/stdout 통신 (줄 단위 JSON-RPC)
//! - Http: 호출마다 POST 한 번
//! - StreamableHttp: POST 응답을 SSE 스트림으로 받아 종료 이벤트까지 대기
//!
//! 모든 전송은 끊김을 `Error::TransportClosed`로, 응답 지연을
//! `Error::ToolTimeout`으로 돌려줍니다. 조용히 멈추는 경우는 없습니다.

mod http;
mod stdio;
mod streamable;

pub use http::HttpTransport;
pub use stdio::StdioTransport;
pub use streamable::StreamableHttpTransport;

use anvil_foundation::{Error, McpServerConfig, Result, TransportKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// tools/list 변경 알림
pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";

/// JSON-RPC 2.0 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// result 또는 에러로 변환
    pub fn into_result(self) -> Result<Value> {
        if let Some(error) = self.error {
            return Err(Error::Mcp(format!("{} (code {})", error.message, error.code)));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// JSON-RPC 에러
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC 2.0 알림 (응답 없음)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// 서버에서 들어온 한 줄/이벤트를 분류
#[derive(Debug)]
pub(crate) enum Incoming {
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
    Other,
}

pub(crate) fn classify(raw: &str) -> Incoming {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return Incoming::Other;
    };
    let has_id = value.get("id").map_or(false, |id| !id.is_null());
    let has_method = value.get("method").is_some();

    if has_id && !has_method {
        serde_json::from_value(value)
            .map(Incoming::Response)
            .unwrap_or(Incoming::Other)
    } else if !has_id && has_method {
        serde_json::from_value(value)
            .map(Incoming::Notification)
            .unwrap_or(Incoming::Other)
    } else {
        Incoming::Other
    }
}

/// MCP Transport trait
///
/// 동시 요청 허용 여부는 구현체가 결정합니다. 다중화를 선언하지 않은
/// 서버에 대한 요청은 구현체 내부에서 직렬화됩니다.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// 전송 종류
    fn kind(&self) -> TransportKind;

    /// 요청 전송 및 응답 수신 (timeout 초과 시 `Error::ToolTimeout`, tool = method)
    async fn request(&self, method: &str, params: Option<Value>, timeout: Duration)
        -> Result<Value>;

    /// 알림 전송 (응답 없음)
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()>;

    /// 연결 종료
    async fn close(&self) -> Result<()>;

    /// 연결 상태 확인
    fn is_connected(&self) -> bool;

    /// 서버 → 클라이언트 알림 구독 (지원하는 전송만)
    fn notifications(&self) -> Option<broadcast::Receiver<JsonRpcNotification>> {
        None
    }
}

/// 설정에 맞는 전송 생성 (핸드셰이크 전 단계)
pub fn open_transport(
    server: &str,
    config: &McpServerConfig,
) -> Result<Box<dyn McpTransport>> {
    let transport: Box<dyn McpTransport> = match config.transport {
        TransportKind::Stdio => Box::new(StdioTransport::spawn(server, config)?),
        TransportKind::Http => Box::new(HttpTransport::new(server, config)?),
        TransportKind::StreamableHttp => Box::new(StreamableHttpTransport::new(server, config)?),
    };
    Ok(transport)
}

/// 직렬 모드의 차례 대기
///
/// 대기 시간도 요청 deadline에 포함됩니다. 앞선 요청이 멈춰 있으면
/// 뒤의 요청도 자기 timeout 안에 `ToolTimeout`으로 끝납니다.
async fn acquire_turn<'a>(
    serial: &'a Option<tokio::sync::Mutex<()>>,
    deadline: Instant,
    method: &str,
    timeout: Duration,
) -> Result<Option<tokio::sync::MutexGuard<'a, ()>>> {
    let Some(lock) = serial else {
        return Ok(None);
    };
    tokio::time::timeout_at(deadline, lock.lock())
        .await
        .map(Some)
        .map_err(|_| timeout_error(method, timeout))
}

fn timeout_error(method: &str, timeout: Duration) -> Error {
    Error::ToolTimeout {
        tool: method.to_string(),
        timeout_ms: timeout.as_millis() as u64,
    }
}

/// 설정 헤더를 reqwest 헤더 맵으로
fn header_map(server: &str, config: &McpServerConfig) -> Result<reqwest::header::HeaderMap> {
    use reqwest::header::{HeaderName, HeaderValue};

    let mut headers = reqwest::header::HeaderMap::new();
    for (key, value) in config.resolved_headers()? {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| Error::Config(format!("{}: invalid header '{}': {}", server, key, e)))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|e| Error::Config(format!("{}: invalid header value for '{}': {}", server, key, e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn config_url(server: &str, config: &McpServerConfig) -> Result<String> {
    config
        .url
        .clone()
        .ok_or_else(|| Error::Config(format!("{}: missing 'url'", server)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_rpc_request() {
        let request = JsonRpcRequest::new(1, "tools/list", None);
        let raw = serde_json::to_value(&request).unwrap();
        assert_eq!(raw, json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" }));
    }

    #[test]
    fn test_response_error_becomes_mcp_error() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": { "code": -32601, "message": "Method not found" }
        }))
        .unwrap();
        let err = response.into_result().unwrap_err();
        assert!(matches!(err, Error::Mcp(msg) if msg.contains("-32601")));
    }

    #[test]
    fn test_classify() {
        assert!(matches!(
            classify(r#"{"jsonrpc":"2.0","id":7,"result":{}}"#),
            Incoming::Response(r) if r.id == Some(7)
        ));
        assert!(matches!(
            classify(r#"{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}"#),
            Incoming::Notification(n) if n.method == TOOLS_LIST_CHANGED
        ));
        // 서버 → 클라이언트 요청은 처리하지 않음
        assert!(matches!(
            classify(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#),
            Incoming::Other
        ));
        assert!(matches!(classify("starting server..."), Incoming::Other));
    }
}
