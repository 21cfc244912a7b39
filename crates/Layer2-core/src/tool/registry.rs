//! Tool Registry - 도구 등록 및 관리
//!
//! 로컬 도구와 MCP 서버에서 발견한 원격 도구를 한 곳에서 관리합니다.
//!
//! ## 규칙
//! - 원격 도구 이름은 `{server}_{tool}`
//! - 서버의 도구 목록은 한 번의 쓰기 잠금 안에서 통째로 교체됨 (중간 상태 없음)
//! - 이름 충돌은 등록 시점에 `Error::Config`로 거부 (조용한 덮어쓰기 없음)
//!
//! ```ignore
//! let registry = Arc::new(ToolRegistry::with_builtins());
//! manager.connect_all(&snapshot).await;   // 원격 도구 동기화
//! let entry = registry.lookup("fetch_get")?;
//! ```

use super::builtin;
use super::delegate;
use crate::mcp::McpClient;
use anvil_foundation::{Error, Result, Tool, ToolDescriptor, ToolPattern};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// 실행 경로 (닫힌 집합)
#[derive(Clone)]
pub enum ToolHandler {
    /// 로컬 함수
    Local(Arc<dyn Tool>),
    /// MCP 서버 호출 (서버가 알고 있는 이름은 descriptor.origin에 있음)
    Remote(Arc<McpClient>),
    /// 서브에이전트 위임
    Delegate,
}

impl fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolHandler::Local(tool) => write!(f, "Local({})", tool.name()),
            ToolHandler::Remote(client) => write!(f, "Remote({})", client.name()),
            ToolHandler::Delegate => write!(f, "Delegate"),
        }
    }
}

/// 레지스트리 항목
#[derive(Debug, Clone)]
pub struct ToolEntry {
    pub descriptor: ToolDescriptor,
    pub handler: ToolHandler,
}

impl ToolEntry {
    pub fn local(tool: Arc<dyn Tool>) -> Self {
        Self {
            descriptor: tool.descriptor(),
            handler: ToolHandler::Local(tool),
        }
    }

    pub fn remote(descriptor: ToolDescriptor, client: Arc<McpClient>) -> Self {
        Self {
            descriptor,
            handler: ToolHandler::Remote(client),
        }
    }

    /// 위임 도구 (`task`)
    pub fn delegate() -> Self {
        Self {
            descriptor: delegate::descriptor(),
            handler: ToolHandler::Delegate,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// 도구 레지스트리
#[derive(Default)]
pub struct ToolRegistry {
    entries: RwLock<BTreeMap<String, ToolEntry>>,
}

impl ToolRegistry {
    /// 빈 레지스트리 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// Builtin 도구들을 포함한 레지스트리 생성 (`task` 제외)
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        {
            let mut entries = registry.entries.write();
            for tool in builtin::all_tools() {
                let entry = ToolEntry::local(tool);
                entries.insert(entry.name().to_string(), entry);
            }
        }
        registry
    }

    /// 항목 등록 (같은 이름이 있으면 거부)
    pub fn register(&self, entry: ToolEntry) -> Result<()> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(entry.name()) {
            return Err(collision(&entry.descriptor, &existing.descriptor));
        }
        debug!(tool = %entry.name(), "Registered tool");
        entries.insert(entry.name().to_string(), entry);
        Ok(())
    }

    /// 로컬 도구 등록
    pub fn register_local(&self, tool: Arc<dyn Tool>) -> Result<()> {
        self.register(ToolEntry::local(tool))
    }

    /// 서버의 도구 목록을 통째로 교체
    ///
    /// 다른 출처의 도구와 이름이 겹치면 아무것도 바꾸지 않고 에러.
    pub fn replace_server_tools(&self, server: &str, tools: Vec<ToolEntry>) -> Result<usize> {
        let mut entries = self.entries.write();

        let mut incoming: BTreeMap<String, ToolEntry> = BTreeMap::new();
        for entry in tools {
            if entry.descriptor.server() != Some(server) {
                return Err(Error::Config(format!(
                    "tool '{}' does not belong to server '{}'",
                    entry.name(),
                    server
                )));
            }
            if let Some(existing) = entries.get(entry.name()) {
                if existing.descriptor.server() != Some(server) {
                    return Err(collision(&entry.descriptor, &existing.descriptor));
                }
            }
            if let Some(previous) = incoming.get(entry.name()) {
                return Err(collision(&entry.descriptor, &previous.descriptor));
            }
            incoming.insert(entry.name().to_string(), entry);
        }

        entries.retain(|_, e| e.descriptor.server() != Some(server));
        let count = incoming.len();
        entries.extend(incoming);

        info!(server = %server, "Synced {} remote tools", count);
        Ok(count)
    }

    /// 서버의 도구 모두 제거
    pub fn remove_server(&self, server: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.descriptor.server() != Some(server));
        before - entries.len()
    }

    /// 이름으로 조회
    pub fn lookup(&self, name: &str) -> Result<ToolEntry> {
        self.get(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<ToolEntry> {
        self.entries.read().get(name).cloned()
    }

    /// 도구 존재 여부
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// 패턴과 일치하는 도구 (이름순)
    pub fn list_matching(&self, pattern: &ToolPattern) -> Vec<ToolDescriptor> {
        self.entries
            .read()
            .values()
            .filter(|e| pattern.matches(e.name()))
            .map(|e| e.descriptor.clone())
            .collect()
    }

    /// 모든 도구 descriptor (이름순)
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.entries
            .read()
            .values()
            .map(|e| e.descriptor.clone())
            .collect()
    }

    /// 모든 도구 이름
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// 서버별 원격 도구 수
    pub fn server_tool_count(&self, server: &str) -> usize {
        self.entries
            .read()
            .values()
            .filter(|e| e.descriptor.server() == Some(server))
            .count()
    }

    /// 조건을 만족하는 항목만 담은 새 레지스트리 (지금 시점의 복사본)
    pub fn filtered<F>(&self, keep: F) -> ToolRegistry
    where
        F: Fn(&ToolDescriptor) -> bool,
    {
        let entries = self
            .entries
            .read()
            .iter()
            .filter(|(_, e)| keep(&e.descriptor))
            .map(|(name, e)| (name.clone(), e.clone()))
            .collect();
        ToolRegistry {
            entries: RwLock::new(entries),
        }
    }

    /// 도구 개수
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// 비어있는지 확인
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

fn origin_label(descriptor: &ToolDescriptor) -> String {
    match descriptor.server() {
        Some(server) => format!("MCP server '{}'", server),
        None => "local tools".to_string(),
    }
}

fn collision(incoming: &ToolDescriptor, existing: &ToolDescriptor) -> Error {
    Error::Config(format!(
        "tool name '{}' from {} collides with {}",
        incoming.name,
        origin_label(incoming),
        origin_label(existing)
    ))
}
