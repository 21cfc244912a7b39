//! Streamable HTTP Transport
//!
//! 요청은 POST 한 번이고, 서버는 JSON 하나 또는 `text/event-stream`으로
//! 응답합니다. 스트림인 경우 같은 id의 JSON-RPC 응답(종료 이벤트)이 올
//! 때까지 기다립니다. 그 사이의 진행 알림은 구독자에게만 전달되고
//! 결과에는 포함되지 않습니다. 타임아웃이 나면 받은 것은 모두 버립니다.
//!
//! initialize 응답의 `Mcp-Session-Id` 헤더를 보관했다가 이후 요청마다
//! 붙입니다.

use super::{
    acquire_turn, classify, config_url, header_map, timeout_error, Incoming, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, McpTransport,
};
use anvil_foundation::{Error, McpServerConfig, Result, TransportKind};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 세션 헤더 이름
pub const SESSION_HEADER: &str = "mcp-session-id";

const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// Streamable HTTP Transport
pub struct StreamableHttpTransport {
    server: String,
    url: String,
    client: reqwest::Client,
    request_id: AtomicU64,
    connected: AtomicBool,
    session_id: RwLock<Option<String>>,
    serial: Option<tokio::sync::Mutex<()>>,
    notifications: broadcast::Sender<JsonRpcNotification>,
}

impl StreamableHttpTransport {
    pub fn new(server: &str, config: &McpServerConfig) -> Result<Self> {
        let url = config_url(server, config)?;
        let client = reqwest::Client::builder()
            .default_headers(header_map(server, config)?)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        let (notifications, _) = broadcast::channel(64);

        info!(server = %server, "Using streamable HTTP MCP endpoint {}", url);
        Ok(Self {
            server: server.to_string(),
            url,
            client,
            request_id: AtomicU64::new(1),
            connected: AtomicBool::new(true),
            session_id: RwLock::new(None),
            serial: (!config.multiplexing).then(|| tokio::sync::Mutex::new(())),
            notifications,
        })
    }

    /// 서버가 발급한 세션 ID
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    fn closed_error(&self, detail: &str) -> Error {
        Error::TransportClosed(format!("{}: {}", self.server, detail))
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_connect() {
            self.closed_error(&e.to_string())
        } else {
            Error::from(e)
        }
    }

    fn post(&self) -> reqwest::RequestBuilder {
        let builder = self.client.post(&self.url).header(ACCEPT, ACCEPT_BOTH);
        match self.session_id() {
            Some(id) => builder.header(SESSION_HEADER, id),
            None => builder,
        }
    }

    fn check_status(&self, status: reqwest::StatusCode, body: String) -> Error {
        if status == reqwest::StatusCode::NOT_FOUND && self.session_id().is_some() {
            // 세션 만료
            self.connected.store(false, Ordering::SeqCst);
            return self.closed_error("session expired");
        }
        Error::Http(format!("{} returned {}: {}", self.server, status, body))
    }

    /// 일반 POST: 헤더에서 세션 ID를 읽고 본문(JSON 또는 SSE)에서 응답을 찾음
    async fn post_plain(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let response = self
            .post()
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            debug!(server = %self.server, "MCP session id: {}", id);
            *self.session_id.write() = Some(id.to_string());
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.check_status(status, body));
        }

        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |ct| ct.starts_with("text/event-stream"));
        let body = response.text().await?;

        if is_stream {
            self.find_response_in_sse(&body, request.id)
        } else {
            Ok(serde_json::from_str(&body)?)
        }
    }

    fn find_response_in_sse(&self, body: &str, id: u64) -> Result<JsonRpcResponse> {
        for data in body.lines().filter_map(|l| l.strip_prefix("data:")) {
            match classify(data.trim()) {
                Incoming::Response(response) if response.id == Some(id) => return Ok(response),
                Incoming::Notification(notification) => {
                    let _ = self.notifications.send(notification);
                }
                _ => {}
            }
        }
        Err(self.closed_error("event stream ended without a response"))
    }

    /// 스트리밍 POST: 종료 이벤트까지 소비
    async fn post_streaming(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let mut source = EventSource::new(self.post().json(request))
            .map_err(|e| Error::Internal(format!("Failed to open event stream: {}", e)))?;
        source.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

        let mut progress = 0usize;
        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => debug!(server = %self.server, "Event stream opened for #{}", request.id),
                Ok(Event::Message(message)) => match classify(&message.data) {
                    Incoming::Response(response) if response.id == Some(request.id) => {
                        source.close();
                        return Ok(response);
                    }
                    Incoming::Notification(notification) => {
                        progress += 1;
                        let _ = self.notifications.send(notification);
                    }
                    _ => debug!(server = %self.server, "Ignoring event: {}", message.data),
                },
                // 서버가 SSE 대신 JSON 하나로 응답한 경우
                Err(reqwest_eventsource::Error::InvalidContentType(_, response)) => {
                    source.close();
                    return Ok(response.json::<JsonRpcResponse>().await?);
                }
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    source.close();
                    let body = response.text().await.unwrap_or_default();
                    return Err(self.check_status(status, body));
                }
                Err(reqwest_eventsource::Error::Transport(e)) => {
                    source.close();
                    return Err(self.map_send_error(e));
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    source.close();
                    return Err(Error::Mcp(format!("{}: event stream error: {}", self.server, e)));
                }
            }
        }

        warn!(
            server = %self.server,
            "Event stream for #{} ended after {} progress event(s) without a response",
            request.id,
            progress
        );
        Err(self.closed_error("event stream ended without a response"))
    }
}

#[async_trait]
impl McpTransport for StreamableHttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::StreamableHttp
    }

    async fn request(&self, method: &str, params: Option<Value>, timeout: Duration) -> Result<Value> {
        if !self.is_connected() {
            return Err(self.closed_error("session is closed"));
        }
        let deadline = Instant::now() + timeout;
        let _turn = acquire_turn(&self.serial, deadline, method, timeout).await?;

        let request = JsonRpcRequest::new(self.next_id(), method, params);
        let exchange = async {
            if method == "initialize" {
                self.post_plain(&request).await
            } else {
                self.post_streaming(&request).await
            }
        };

        // 타임아웃 시 future가 drop되면서 부분 출력도 함께 버려짐
        match tokio::time::timeout_at(deadline, exchange).await {
            Ok(response) => response?.into_result(),
            Err(_) => Err(timeout_error(method, timeout)),
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if !self.is_connected() {
            return Err(self.closed_error("session is closed"));
        }
        let response = self
            .post()
            .json(&JsonRpcNotification::new(method, params))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        if !response.status().is_success() {
            warn!(server = %self.server, "Notification {} returned {}", method, response.status());
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let session = self.session_id.write().take();
        if let Some(id) = session {
            let result = self
                .client
                .delete(&self.url)
                .header(SESSION_HEADER, id)
                .send()
                .await;
            if let Err(e) = result {
                debug!(server = %self.server, "Session DELETE failed: {}", e);
            }
        }
        info!(server = %self.server, "Closed streamable HTTP transport");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn notifications(&self) -> Option<broadcast::Receiver<JsonRpcNotification>> {
        Some(self.notifications.subscribe())
    }
}
