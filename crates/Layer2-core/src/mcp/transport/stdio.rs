//! Stdio Transport - 프로세스 기반 통신
//!
//! 자식 프로세스의 stdin/stdout으로 줄 단위 JSON-RPC를 주고받습니다.
//! stdout이 닫히면 (프로세스 종료, 크래시) 연결 상태를 먼저 내리고
//! 대기 중인 요청을 모두 정리하므로 호출자는 `TransportClosed`를 받습니다.

use super::{
    acquire_turn, classify, timeout_error, Incoming, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, McpTransport,
};
use anvil_foundation::{Error, McpServerConfig, Result, TransportKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// Stdio Transport
pub struct StdioTransport {
    server: String,

    /// 요청 ID 카운터
    request_id: AtomicU64,

    /// 자식 프로세스
    child: tokio::sync::Mutex<Option<Child>>,

    /// stdin writer
    stdin_tx: mpsc::Sender<String>,

    /// 대기 중인 요청들 (id -> response sender)
    pending: PendingMap,

    /// 연결 상태
    connected: Arc<AtomicBool>,

    /// 다중화를 선언하지 않은 서버는 요청을 하나씩만 보냄
    serial: Option<tokio::sync::Mutex<()>>,

    notifications: broadcast::Sender<JsonRpcNotification>,
}

impl StdioTransport {
    /// 프로세스 시작 (준비 완료는 initialize 응답으로 판단)
    pub fn spawn(server: &str, config: &McpServerConfig) -> Result<Self> {
        let command = config
            .command
            .as_deref()
            .ok_or_else(|| Error::Config(format!("{}: stdio server requires 'command'", server)))?;

        info!(server = %server, "Spawning MCP process: {} {:?}", command, config.args);

        let mut cmd = Command::new(command);
        cmd.args(&config.args)
            .envs(config.expand_env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            Error::McpConnection(format!("failed to spawn '{}' for {}: {}", command, server, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Internal("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("Failed to capture stdout".to_string()))?;
        let stderr = child.stderr.take();

        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(32);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));
        let (notifications, _) = broadcast::channel(16);

        // stdin writer task
        let connected_for_writer = Arc::clone(&connected);
        let mut stdin_writer = stdin;
        tokio::spawn(async move {
            while let Some(msg) = stdin_rx.recv().await {
                let written = async {
                    stdin_writer.write_all(msg.as_bytes()).await?;
                    stdin_writer.write_all(b"\n").await?;
                    stdin_writer.flush().await
                };
                if let Err(e) = written.await {
                    error!("Failed to write to MCP stdin: {}", e);
                    connected_for_writer.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });

        // stdout reader task
        let pending_for_reader = Arc::clone(&pending);
        let connected_for_reader = Arc::clone(&connected);
        let notify_tx = notifications.clone();
        let server_name = server.to_string();
        let mut reader = BufReader::new(stdout).lines();
        tokio::spawn(async move {
            loop {
                match reader.next_line().await {
                    Ok(Some(line)) => match classify(&line) {
                        Incoming::Response(response) => {
                            let sender = response.id.and_then(|id| pending_for_reader.lock().remove(&id));
                            match sender {
                                Some(sender) => {
                                    let _ = sender.send(response);
                                }
                                None => debug!(server = %server_name, "Dropping late response {:?}", response.id),
                            }
                        }
                        Incoming::Notification(notification) => {
                            debug!(server = %server_name, "MCP notification: {}", notification.method);
                            let _ = notify_tx.send(notification);
                        }
                        Incoming::Other => debug!(server = %server_name, "MCP stdout: {}", line),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!(server = %server_name, "MCP stdout read error: {}", e);
                        break;
                    }
                }
            }

            // 상태를 먼저 내려야 새 요청이 pending에 남지 않음
            connected_for_reader.store(false, Ordering::SeqCst);
            let dropped: Vec<_> = pending_for_reader.lock().drain().collect();
            if !dropped.is_empty() {
                warn!(
                    server = %server_name,
                    "MCP process exited with {} request(s) in flight",
                    dropped.len()
                );
            }
            info!(server = %server_name, "MCP stdout reader finished");
        });

        // stderr는 로그로만 흘려보냄
        if let Some(stderr) = stderr {
            let server_name = server.to_string();
            let mut lines = BufReader::new(stderr).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = %server_name, "MCP stderr: {}", line);
                }
            });
        }

        Ok(Self {
            server: server.to_string(),
            request_id: AtomicU64::new(1),
            child: tokio::sync::Mutex::new(Some(child)),
            stdin_tx,
            pending,
            connected,
            serial: (!config.multiplexing).then(|| tokio::sync::Mutex::new(())),
            notifications,
        })
    }

    /// 다음 요청 ID 생성
    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    fn closed_error(&self) -> Error {
        Error::TransportClosed(format!("MCP server '{}' is not running", self.server))
    }

    async fn send_line(&self, line: String) -> Result<()> {
        self.stdin_tx
            .send(line)
            .await
            .map_err(|_| self.closed_error())
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    async fn request(&self, method: &str, params: Option<Value>, timeout: Duration) -> Result<Value> {
        let deadline = Instant::now() + timeout;
        let _turn = acquire_turn(&self.serial, deadline, method, timeout).await?;

        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if !self.is_connected() {
            self.pending.lock().remove(&id);
            return Err(self.closed_error());
        }

        let msg = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;
        debug!(server = %self.server, "Sending MCP request: {}", msg);
        if let Err(e) = self.send_line(msg).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(response)) => response.into_result(),
            // reader가 pending을 비움 = 프로세스 종료
            Ok(Err(_)) => Err(self.closed_error()),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(timeout_error(method, timeout))
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if !self.is_connected() {
            return Err(self.closed_error());
        }
        let msg = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.send_line(msg).await
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.pending.lock().clear();

        let mut child_guard = self.child.lock().await;
        if let Some(mut child) = child_guard.take() {
            if let Err(e) = child.kill().await {
                debug!(server = %self.server, "MCP process already exited: {}", e);
            }
        }
        info!(server = %self.server, "Closed stdio transport");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn notifications(&self) -> Option<broadcast::Receiver<JsonRpcNotification>> {
        Some(self.notifications.subscribe())
    }
}
