//! Core Module - 핵심 인터페이스 및 타입
//!
//! ## 타입 계층
//!
//! - `types.rs`: 데이터 타입 (Message, ToolCall, ToolResult, ToolDescriptor 등)
//! - `traits.rs`: 인터페이스 (Tool, Provider, PermissionDelegate)
//!
//! ## 도구 흐름
//!
//! ```text
//! ToolCall ──► Registry lookup ──► Permission ──► Budget ──► Execute
//!                                                              │
//!                         ┌────────────────┬───────────────────┤
//!                         ▼                ▼                   ▼
//!                    Local Tool      MCP Transport        Delegation
//! ```

pub mod traits;
pub mod types;

// ============================================================================
// Types - 데이터 타입 (types.rs)
// ============================================================================

pub use types::{
    remote_tool_name, Capabilities, FailureKind, Message, MessageRole, Requester, TokenUsage,
    ToolCall, ToolDescriptor, ToolOrigin, ToolResult, ToolResultMessage, ToolStatus,
    TransportKind,
};

// ============================================================================
// Traits - 인터페이스 (traits.rs)
// ============================================================================

pub use traits::{
    ChatRequest, ChatResponse, PermissionDelegate, PermissionResponse, Provider, Tool,
    ToolContext, ToolExecutionResult, ToolMeta,
};
