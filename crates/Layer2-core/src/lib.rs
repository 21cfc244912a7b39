//! anvil-core: Core Runtime for Anvil
//!
//! Layer2 - 도구 실행 레이어
//!
//! # 주요 모듈
//!
//! - `mcp`: MCP (Model Context Protocol) 클라이언트, 전송 계층, 서버 관리자
//! - `tool`: Tool 레지스트리, Builtin 도구, Dispatcher
//!
//! # 사용 예시
//!
//! ```ignore
//! use anvil_core::{Dispatcher, McpManager, ToolRegistry};
//! use anvil_foundation::{Budget, SettingsLoader};
//! use std::sync::Arc;
//!
//! let snapshot = SettingsLoader::new(".").load()?;
//! let registry = Arc::new(ToolRegistry::with_builtins());
//!
//! // MCP 서버 연결 ({server}_{tool} 도구 등록)
//! let manager = McpManager::new(registry.clone(), snapshot.limits().clone());
//! manager.connect_all(&snapshot).await;
//!
//! // 도구 실행
//! let budget = Arc::new(Budget::new(snapshot.limits().budget_limits()));
//! let dispatcher = Dispatcher::with_working_dir(
//!     registry,
//!     Arc::new(snapshot.resolver()?),
//!     budget,
//!     snapshot.working_dir(),
//! );
//! let result = dispatcher.dispatch(&call).await;
//! ```

pub mod mcp;
pub mod tool;

// Re-exports: MCP
pub use mcp::{
    McpClient, McpContent, McpManager, McpTool, McpToolCall, McpToolResult, McpTransport,
    ServerStatus, SessionState,
};

// Re-exports: Tool
pub use tool::{
    builtin, DelegationReport, Delegator, Dispatcher, RuntimeContext, TaskInput, ToolEntry,
    ToolHandler, ToolRegistry,
};

// Re-exports: Layer1
pub use anvil_foundation::{
    Error, Result, Tool, ToolCall, ToolContext, ToolDescriptor, ToolResult, ToolStatus,
};
