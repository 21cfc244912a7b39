//! HTTP Transport - 호출마다 JSON-RPC POST 한 번
//!
//! 연결 재사용은 reqwest 클라이언트에 맡깁니다. 응답 본문은 JSON-RPC
//! 응답 하나여야 합니다.

use super::{
    acquire_turn, config_url, header_map, timeout_error, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, McpTransport,
};
use anvil_foundation::{Error, McpServerConfig, Result, TransportKind};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// HTTP Transport
pub struct HttpTransport {
    server: String,
    url: String,
    client: reqwest::Client,
    request_id: AtomicU64,
    connected: AtomicBool,
    serial: Option<tokio::sync::Mutex<()>>,
}

impl HttpTransport {
    pub fn new(server: &str, config: &McpServerConfig) -> Result<Self> {
        let url = config_url(server, config)?;
        let client = reqwest::Client::builder()
            .default_headers(header_map(server, config)?)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(server = %server, "Using HTTP MCP endpoint {}", url);
        Ok(Self {
            server: server.to_string(),
            url,
            client,
            request_id: AtomicU64::new(1),
            connected: AtomicBool::new(true),
            serial: (!config.multiplexing).then(|| tokio::sync::Mutex::new(())),
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    fn closed_error(&self) -> Error {
        Error::TransportClosed(format!("HTTP session for '{}' is closed", self.server))
    }

    async fn post(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http(format!("{} returned {}: {}", self.server, status, body)));
        }

        Ok(response.json::<JsonRpcResponse>().await?)
    }

    /// 연결 자체가 실패하면 세션을 닫힌 것으로 봄
    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_connect() {
            Error::TransportClosed(format!("{}: {}", self.server, e))
        } else {
            Error::from(e)
        }
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn request(&self, method: &str, params: Option<Value>, timeout: Duration) -> Result<Value> {
        if !self.is_connected() {
            return Err(self.closed_error());
        }
        let deadline = Instant::now() + timeout;
        let _turn = acquire_turn(&self.serial, deadline, method, timeout).await?;

        let request = JsonRpcRequest::new(self.next_id(), method, params);
        debug!(server = %self.server, "POST {} ({})", self.url, method);

        match tokio::time::timeout_at(deadline, self.post(&request)).await {
            Ok(response) => response?.into_result(),
            Err(_) => Err(timeout_error(method, timeout)),
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if !self.is_connected() {
            return Err(self.closed_error());
        }
        self.client
            .post(&self.url)
            .json(&JsonRpcNotification::new(method, params))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
