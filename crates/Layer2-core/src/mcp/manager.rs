//! MCP Manager - 서버 연결과 레지스트리 동기화
//!
//! 세션 스냅샷의 MCP 서버들을 띄우고, 각 서버의 도구를
//! `{server}_{tool}` 이름으로 ToolRegistry에 등록합니다.
//!
//! ## 기능
//! - **동시 연결**: 서버마다 독립적으로 연결, 실패해도 다른 서버는 계속
//! - **도구 필터**: `enabledTools` / `disabledTools` 패턴 적용
//! - **목록 갱신**: `notifications/tools/list_changed` 수신 시 자동 재등록
//! - **상태 조회**: 서버별 세션 상태와 도구 수

use super::client::{McpClient, SessionState};
use super::transport::TOOLS_LIST_CHANGED;
use crate::tool::{ToolEntry, ToolRegistry};
use anvil_foundation::{Error, Limits, McpServerConfig, Result, SessionSnapshot, TransportKind};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 연결된 서버
struct ServerHandle {
    config: McpServerConfig,
    client: Arc<McpClient>,
    /// list_changed 감시 태스크
    watcher: Option<JoinHandle<()>>,
}

/// 서버 상태 요약
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub transport: TransportKind,
    pub state: SessionState,
    pub tool_count: usize,
    /// 연결 실패 사유
    pub error: Option<String>,
}

/// MCP 서버 관리자
pub struct McpManager {
    registry: Arc<ToolRegistry>,
    servers: RwLock<BTreeMap<String, ServerHandle>>,
    /// 연결에 실패한 서버 (이름 → (transport, 사유))
    failures: RwLock<BTreeMap<String, (TransportKind, String)>>,
    limits: Limits,
}

impl McpManager {
    pub fn new(registry: Arc<ToolRegistry>, limits: Limits) -> Self {
        Self {
            registry,
            servers: RwLock::new(BTreeMap::new()),
            failures: RwLock::new(BTreeMap::new()),
            limits,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// 스냅샷의 활성 서버를 모두 연결
    ///
    /// 서버마다 독립적으로 실패합니다. 연결된 서버 수를 반환.
    pub async fn connect_all(&self, snapshot: &SessionSnapshot) -> usize {
        let attempts = snapshot
            .enabled_servers()
            .map(|(name, config)| async move { self.connect(name, config).await.is_ok() });

        let connected = join_all(attempts).await.into_iter().filter(|ok| *ok).count();
        info!(
            "Connected {}/{} MCP servers",
            connected,
            snapshot.enabled_servers().count()
        );
        connected
    }

    /// 서버 하나 연결 후 도구 등록. 등록된 도구 수를 반환.
    pub async fn connect(&self, name: &str, config: &McpServerConfig) -> Result<usize> {
        if self.servers.read().await.contains_key(name) {
            self.disconnect(name).await;
        }

        let client = match McpClient::connect(name, config, &self.limits).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                error!(server = %name, "Failed to connect MCP server: {}", e);
                self.record_failure(name, config.transport, &e).await;
                return Err(e);
            }
        };

        self.attach(name, config.clone(), client).await
    }

    /// 핸드셰이크가 끝난 클라이언트를 등록
    pub async fn attach(
        &self,
        name: &str,
        config: McpServerConfig,
        client: Arc<McpClient>,
    ) -> Result<usize> {
        let count = match sync_tools(&self.registry, &client, &config) {
            Ok(count) => count,
            Err(e) => {
                error!(server = %name, "Rejected MCP server tools: {}", e);
                client.close().await;
                self.record_failure(name, client.transport_kind(), &e).await;
                return Err(e);
            }
        };

        let watcher = spawn_watcher(self.registry.clone(), &client, config.clone());
        self.failures.write().await.remove(name);

        let previous = self.servers.write().await.insert(
            name.to_string(),
            ServerHandle {
                config,
                client,
                watcher,
            },
        );
        if let Some(previous) = previous {
            stop(previous).await;
        }

        info!(server = %name, "Registered {} MCP tools", count);
        Ok(count)
    }

    /// 도구 목록 다시 받아서 교체
    pub async fn refresh(&self, name: &str) -> Result<usize> {
        let (client, config) = {
            let servers = self.servers.read().await;
            let handle = servers
                .get(name)
                .ok_or_else(|| Error::McpServerNotFound(name.to_string()))?;
            (handle.client.clone(), handle.config.clone())
        };

        client.refresh_tools().await?;
        sync_tools(&self.registry, &client, &config)
    }

    pub async fn client(&self, name: &str) -> Option<Arc<McpClient>> {
        self.servers.read().await.get(name).map(|h| h.client.clone())
    }

    pub async fn server_names(&self) -> Vec<String> {
        self.servers.read().await.keys().cloned().collect()
    }

    /// 연결된 서버와 실패한 서버의 상태
    pub async fn status(&self) -> Vec<ServerStatus> {
        let mut statuses: Vec<ServerStatus> = self
            .servers
            .read()
            .await
            .iter()
            .map(|(name, handle)| ServerStatus {
                name: name.clone(),
                transport: handle.client.transport_kind(),
                state: handle.client.state(),
                tool_count: self.registry.server_tool_count(name),
                error: None,
            })
            .collect();

        statuses.extend(
            self.failures
                .read()
                .await
                .iter()
                .map(|(name, (transport, reason))| ServerStatus {
                    name: name.clone(),
                    transport: *transport,
                    state: SessionState::Closed,
                    tool_count: 0,
                    error: Some(reason.clone()),
                }),
        );
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// 서버 연결 종료 및 도구 제거
    pub async fn disconnect(&self, name: &str) -> bool {
        let handle = self.servers.write().await.remove(name);
        match handle {
            Some(handle) => {
                let removed = self.registry.remove_server(name);
                debug!(server = %name, "Removed {} tools", removed);
                stop(handle).await;
                true
            }
            None => false,
        }
    }

    /// 모든 서버 종료
    pub async fn shutdown(&self) {
        let handles: Vec<(String, ServerHandle)> =
            std::mem::take(&mut *self.servers.write().await).into_iter().collect();
        for (name, handle) in handles {
            self.registry.remove_server(&name);
            stop(handle).await;
        }
    }

    async fn record_failure(&self, name: &str, transport: TransportKind, error: &Error) {
        self.failures
            .write()
            .await
            .insert(name.to_string(), (transport, error.to_string()));
    }
}

/// 클라이언트의 도구 목록을 레지스트리에 반영
fn sync_tools(registry: &ToolRegistry, client: &Arc<McpClient>, config: &McpServerConfig) -> Result<usize> {
    let server = client.name();
    let transport = client.transport_kind();

    let entries: Vec<ToolEntry> = client
        .tools()
        .into_iter()
        .filter(|tool| {
            let exposed = config.exposes_tool(&tool.name);
            if !exposed {
                debug!(server = %server, tool = %tool.name, "Tool filtered out by server config");
            }
            exposed
        })
        .map(|tool| ToolEntry::remote(tool.descriptor(server, transport), client.clone()))
        .collect();

    registry.replace_server_tools(server, entries)
}

/// `tools/list_changed` 알림을 받아 도구를 다시 등록하는 태스크
///
/// 클라이언트는 약한 참조로만 잡아서, 클라이언트가 사라지면 채널이 닫히고
/// 태스크도 끝납니다.
fn spawn_watcher(
    registry: Arc<ToolRegistry>,
    client: &Arc<McpClient>,
    config: McpServerConfig,
) -> Option<JoinHandle<()>> {
    let mut notifications = client.notifications()?;
    let weak: Weak<McpClient> = Arc::downgrade(client);

    Some(tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) if notification.method == TOOLS_LIST_CHANGED => {
                    let Some(client) = weak.upgrade() else {
                        break;
                    };
                    match client.refresh_tools().await {
                        Ok(_) => match sync_tools(&registry, &client, &config) {
                            Ok(count) => {
                                info!(server = %client.name(), "Tool list changed, {} tools", count)
                            }
                            Err(e) => warn!(server = %client.name(), "Tool refresh rejected: {}", e),
                        },
                        Err(e) => warn!(server = %client.name(), "Tool refresh failed: {}", e),
                    }
                }
                Ok(notification) => {
                    debug!("Ignoring MCP notification {}", notification.method);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Notification watcher lagged by {}", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }))
}

async fn stop(handle: ServerHandle) {
    if let Some(watcher) = handle.watcher {
        watcher.abort();
    }
    handle.client.close().await;
}
