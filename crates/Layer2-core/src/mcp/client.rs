//! MCP Client - MCP 서버 클라이언트
//!
//! 전송 계층 위에서 핸드셰이크, 도구 목록, 도구 호출을 처리하고
//! 세션 상태(Starting / Ready / Degraded / Closed)를 관리합니다.

use super::transport::{open_transport, JsonRpcNotification, McpTransport};
use super::types::{McpTool, McpToolCall, McpToolResult, MCP_PROTOCOL_VERSION};
use anvil_foundation::{Error, Limits, McpServerConfig, Result, TransportKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// tools/list 페이지 상한 (서버가 cursor를 끝없이 돌려주는 경우 방어)
const MAX_LIST_PAGES: usize = 64;

/// 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// 핸드셰이크 중
    Starting,
    /// 사용 가능
    Ready,
    /// 최근 호출이 타임아웃됨 (다음 성공 시 Ready)
    Degraded,
    /// 종료됨 (프로세스 종료, 연결 끊김, close)
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Starting => write!(f, "starting"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Degraded => write!(f, "degraded"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// MCP 서버 정보
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Initialize 응답
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResult {
    #[serde(default)]
    protocol_version: String,
    #[serde(default)]
    server_info: ServerInfo,
    #[serde(default)]
    capabilities: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<McpTool>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// MCP 클라이언트 (서버 하나, 세션 하나)
pub struct McpClient {
    /// 서버 이름
    name: String,

    /// 전송 계층
    transport: Box<dyn McpTransport>,

    /// 현재 상태
    state: RwLock<SessionState>,

    /// 서버 정보 (initialize 응답)
    server_info: RwLock<ServerInfo>,

    /// 서버가 tools.listChanged를 선언했는지
    list_changed: RwLock<bool>,

    /// 마지막으로 받은 도구 목록
    tools: RwLock<Vec<McpTool>>,

    /// 기본 도구 호출 타임아웃
    tool_timeout: Duration,
}

impl McpClient {
    /// 서버에 연결하고 핸드셰이크 + 도구 목록까지 완료
    ///
    /// 시작 타임아웃 안에 끝나지 않으면 전송을 닫고 `Error::StartupTimeout`.
    pub async fn connect(name: &str, config: &McpServerConfig, limits: &Limits) -> Result<Self> {
        let startup = config.startup_timeout(limits.startup_timeout);
        info!(server = %name, transport = %config.transport, "Connecting to MCP server");

        let transport = open_transport(name, config)?;
        let client = Self::with_transport(name, transport, config.tool_timeout(limits.tool_timeout));

        let outcome = tokio::time::timeout(startup, client.handshake(startup)).await;
        let error = match outcome {
            Ok(Ok(())) => {
                info!(
                    server = %name,
                    "Connected to MCP server '{}' with {} tools",
                    name,
                    client.tools.read().len()
                );
                return Ok(client);
            }
            Ok(Err(Error::ToolTimeout { .. })) | Err(_) => Error::StartupTimeout {
                server: name.to_string(),
                timeout_ms: startup.as_millis() as u64,
            },
            Ok(Err(e)) => e,
        };

        warn!(server = %name, "MCP server failed to start: {}", error);
        client.close().await;
        Err(error)
    }

    /// 이미 열린 전송으로 클라이언트 생성 (상태: Starting)
    pub fn with_transport(
        name: impl Into<String>,
        transport: Box<dyn McpTransport>,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            transport,
            state: RwLock::new(SessionState::Starting),
            server_info: RwLock::new(ServerInfo::default()),
            list_changed: RwLock::new(false),
            tools: RwLock::new(Vec::new()),
            tool_timeout,
        }
    }

    /// MCP initialize 핸드셰이크 + 첫 도구 목록
    pub async fn handshake(&self, timeout: Duration) -> Result<()> {
        let params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "clientInfo": {
                "name": "anvil",
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {}
        });

        let result = self
            .transport
            .request("initialize", Some(params), timeout)
            .await?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| Error::Mcp(format!("Invalid initialize response: {}", e)))?;

        if init.protocol_version != MCP_PROTOCOL_VERSION {
            debug!(
                server = %self.name,
                "Server negotiated protocol {} (requested {})",
                init.protocol_version,
                MCP_PROTOCOL_VERSION
            );
        }
        debug!(
            server = %self.name,
            "MCP server '{}' v{} initialized",
            init.server_info.name,
            init.server_info.version
        );

        *self.list_changed.write() = init
            .capabilities
            .pointer("/tools/listChanged")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        *self.server_info.write() = init.server_info;

        self.transport
            .notify("notifications/initialized", None)
            .await?;

        self.fetch_tools(timeout).await?;
        self.set_state(SessionState::Ready);
        Ok(())
    }

    /// 서버 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// 현재 상태 (전송이 끊겼으면 Closed)
    pub fn state(&self) -> SessionState {
        let state = *self.state.read();
        if state != SessionState::Starting && !self.transport.is_connected() {
            return SessionState::Closed;
        }
        state
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.write();
        if *state != next && *state != SessionState::Closed {
            debug!(server = %self.name, "Session state {} -> {}", *state, next);
            *state = next;
        }
    }

    pub fn server_info(&self) -> ServerInfo {
        self.server_info.read().clone()
    }

    /// 서버가 도구 목록 변경 알림을 보내는지
    pub fn supports_list_changed(&self) -> bool {
        *self.list_changed.read()
    }

    pub fn tool_timeout(&self) -> Duration {
        self.tool_timeout
    }

    /// 마지막으로 받은 도구 목록
    pub fn tools(&self) -> Vec<McpTool> {
        self.tools.read().clone()
    }

    /// 서버 알림 구독
    pub fn notifications(&self) -> Option<broadcast::Receiver<JsonRpcNotification>> {
        self.transport.notifications()
    }

    /// 도구 목록 새로고침
    pub async fn refresh_tools(&self) -> Result<Vec<McpTool>> {
        self.ensure_open()?;
        self.fetch_tools(self.tool_timeout).await
    }

    async fn fetch_tools(&self, timeout: Duration) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.transport.request("tools/list", params, timeout).await?;
            let page: ToolsListResult = serde_json::from_value(result)
                .map_err(|e| Error::Mcp(format!("Invalid tools/list response: {}", e)))?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(server = %self.name, "Listed {} tools", tools.len());
        *self.tools.write() = tools.clone();
        Ok(tools)
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state() {
            SessionState::Closed => Err(Error::TransportClosed(format!(
                "MCP server '{}' session is closed",
                self.name
            ))),
            _ => Ok(()),
        }
    }

    /// 도구 호출
    ///
    /// 타임아웃은 세션을 Degraded로, 끊김은 Closed로 바꿉니다.
    /// 서버가 `isError`를 보고한 경우는 Ok로 돌려주고 판단은 호출자에게 맡깁니다.
    pub async fn call_tool(&self, call: &McpToolCall, timeout: Option<Duration>) -> Result<McpToolResult> {
        self.ensure_open()?;
        let timeout = timeout.unwrap_or(self.tool_timeout);

        debug!(server = %self.name, tool = %call.name, "Calling MCP tool");
        let params = json!({
            "name": call.name,
            "arguments": call.arguments,
        });

        match self.transport.request("tools/call", Some(params), timeout).await {
            Ok(result) => {
                self.set_state(SessionState::Ready);
                let tool_result: McpToolResult = serde_json::from_value(result)
                    .map_err(|e| Error::Mcp(format!("Invalid tools/call response: {}", e)))?;
                if tool_result.is_error {
                    warn!(
                        server = %self.name,
                        tool = %call.name,
                        "MCP tool returned error: {:?}",
                        tool_result.text()
                    );
                }
                Ok(tool_result)
            }
            Err(Error::ToolTimeout { timeout_ms, .. }) => {
                self.set_state(SessionState::Degraded);
                Err(Error::ToolTimeout {
                    tool: call.name.clone(),
                    timeout_ms,
                })
            }
            Err(e) => {
                if e.is_transport_fatal() {
                    self.set_state(SessionState::Closed);
                }
                Err(e)
            }
        }
    }

    /// 연결 종료 (여러 번 호출해도 안전)
    pub async fn close(&self) {
        if let Err(e) = self.transport.close().await {
            warn!(server = %self.name, "Error closing MCP transport: {}", e);
        }
        *self.state.write() = SessionState::Closed;
        self.tools.write().clear();
        info!(server = %self.name, "Disconnected from MCP server");
    }
}

impl fmt::Debug for McpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpClient")
            .field("name", &self.name)
            .field("transport", &self.transport.kind())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 메서드별 응답을 미리 정해 두는 전송
    struct ScriptedTransport {
        connected: AtomicBool,
        calls: Mutex<Vec<String>>,
        on_call: fn(&str) -> Result<Value>,
    }

    impl ScriptedTransport {
        fn new(on_call: fn(&str) -> Result<Value>) -> Self {
            Self {
                connected: AtomicBool::new(true),
                calls: Mutex::new(Vec::new()),
                on_call,
            }
        }
    }

    #[async_trait]
    impl McpTransport for ScriptedTransport {
        fn kind(&self) -> TransportKind {
            TransportKind::Stdio
        }

        async fn request(&self, method: &str, _params: Option<Value>, _timeout: Duration) -> Result<Value> {
            self.calls.lock().push(method.to_string());
            (self.on_call)(method)
        }

        async fn notify(&self, method: &str, _params: Option<Value>) -> Result<()> {
            self.calls.lock().push(method.to_string());
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn notifications(&self) -> Option<broadcast::Receiver<JsonRpcNotification>> {
            None
        }
    }

    fn healthy(method: &str) -> Result<Value> {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "serverInfo": { "name": "mock", "version": "1.0" },
                "capabilities": { "tools": { "listChanged": true } }
            })),
            "tools/list" => Ok(json!({ "tools": [ { "name": "get", "annotations": { "readOnlyHint": true } } ] })),
            "tools/call" => Ok(json!({ "content": [ { "type": "text", "text": "ok" } ] })),
            other => Err(Error::Mcp(format!("unexpected {}", other))),
        }
    }

    fn slow_calls(method: &str) -> Result<Value> {
        match method {
            "tools/call" => Err(Error::ToolTimeout {
                tool: method.to_string(),
                timeout_ms: 10,
            }),
            other => healthy(other),
        }
    }

    #[tokio::test]
    async fn test_handshake_order_and_tools() {
        let client = McpClient::with_transport(
            "mock",
            Box::new(ScriptedTransport::new(healthy)),
            Duration::from_secs(1),
        );
        assert_eq!(client.state(), SessionState::Starting);

        client.handshake(Duration::from_secs(1)).await.unwrap();
        assert!(client.supports_list_changed());
        assert_eq!(client.server_info().name, "mock");
        assert_eq!(client.tools().len(), 1);
        assert_eq!(client.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_timeout_degrades_and_success_restores() {
        let client = McpClient::with_transport(
            "mock",
            Box::new(ScriptedTransport::new(slow_calls)),
            Duration::from_millis(10),
        );
        client.set_state(SessionState::Ready);

        let err = client
            .call_tool(&McpToolCall::new("get", json!({})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolTimeout { ref tool, .. } if tool == "get"));
        assert_eq!(client.state(), SessionState::Degraded);

        let client = McpClient::with_transport(
            "mock",
            Box::new(ScriptedTransport::new(healthy)),
            Duration::from_secs(1),
        );
        client.set_state(SessionState::Degraded);
        let result = client
            .call_tool(&McpToolCall::new("get", json!({})), None)
            .await
            .unwrap();
        assert_eq!(result.text(), Some("ok"));
        assert_eq!(client.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_closed_client_refuses_calls() {
        let client = McpClient::with_transport(
            "mock",
            Box::new(ScriptedTransport::new(healthy)),
            Duration::from_secs(1),
        );
        client.set_state(SessionState::Ready);
        client.close().await;

        assert_eq!(client.state(), SessionState::Closed);
        let err = client
            .call_tool(&McpToolCall::new("get", json!({})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransportClosed(_)));
    }
}
