//! # anvil-foundation
//!
//! Foundation layer for Anvil:
//! - Core: 핵심 타입과 Trait (ToolCall, ToolResult, ToolDescriptor, Tool, Provider, PermissionDelegate)
//! - Permission: 패턴 기반 권한 결정 (exact / glob / regex, 신뢰 경계)
//! - Budget: 세션 전체가 공유하는 턴/비용/깊이 한도
//! - Config: settings.json 로드와 세션 스냅샷
//! - Event: dispatch 이벤트 버스
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Tool Registry (Layer2)                                 │
//! │  ├── Local Tools (bash, read, write, glob, task)        │
//! │  └── MCP Tools ({server}_{tool})                        │
//! │                     │                                   │
//! │                     ▼                                   │
//! │       PermissionResolver (Always / Ask / Deny)          │
//! │                     │                                   │
//! │                     ▼                                   │
//! │            Budget (shared, atomic)                      │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod budget;
pub mod config;
pub mod core;
pub mod error;
pub mod event;
pub mod permission;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Core (핵심 Trait 및 타입)
// ============================================================================
pub use core::{
    remote_tool_name,
    // Types
    Capabilities,
    FailureKind,
    Message,
    MessageRole,
    Requester,
    TokenUsage,
    ToolCall,
    ToolDescriptor,
    ToolOrigin,
    ToolResult,
    ToolResultMessage,
    ToolStatus,
    TransportKind,
    // Traits
    ChatRequest,
    ChatResponse,
    PermissionDelegate,
    PermissionResponse,
    Provider,
    Tool,
    ToolContext,
    ToolExecutionResult,
    ToolMeta,
};

// ============================================================================
// Permission
// ============================================================================
pub use permission::{
    Disposition, PermissionResolver, Resolution, ResolutionSource, RuleConfig, RuleScope,
    ToolPattern,
};

// ============================================================================
// Budget
// ============================================================================
pub use budget::{Budget, BudgetKind, BudgetLimits, BudgetUsage};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    AskPolicy, Limits, McpServerConfig, SessionSnapshot, Settings, SettingsLoader,
    SubagentProfileConfig,
};

// ============================================================================
// Event
// ============================================================================
pub use event::{DispatchEvent, DispatchEventKind, EventBus};
