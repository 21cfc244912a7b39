//! Core Traits - 핵심 인터페이스 정의
//!
//! Layer2 이상에서 구현해야 하는 핵심 trait들을 정의합니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Layer4-CLI                                                 │
//! │  └── PermissionDelegate 구현 (승인 프롬프트)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Layer3-Agent                                               │
//! │  ├── Turn engine (Provider 호출 + 도구 dispatch)             │
//! │  └── Delegation (서브에이전트)                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Layer2-Core                                                │
//! │  ├── Tool trait 구현 (bash, read, write, glob)              │
//! │  └── MCP transport (stdio, http, streamable-http)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Layer1-Foundation (이 레이어)                              │
//! │  └── Trait 정의 (Tool, Provider, PermissionDelegate)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use super::types::{Capabilities, Message, TokenUsage, ToolCall, ToolDescriptor};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

// ============================================================================
// Tool Trait - 로컬 도구 인터페이스
// ============================================================================

/// 도구 메타데이터
#[derive(Debug, Clone)]
pub struct ToolMeta {
    /// 도구 이름 (고유 식별자)
    pub name: String,
    /// 표시 이름
    pub display_name: String,
    /// 설명
    pub description: String,
    /// 카테고리 (filesystem, execute 등)
    pub category: String,
    /// 능력 플래그
    pub capabilities: Capabilities,
}

impl ToolMeta {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: String::new(),
            category: "general".to_string(),
            capabilities: Capabilities::default(),
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn category(mut self, cat: impl Into<String>) -> Self {
        self.category = cat.into();
        self
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// 도구 실행 결과 (Tool trait용)
///
/// dispatch 결과인 `ToolResult`와는 다릅니다 (types.rs 참조).
#[derive(Debug, Clone)]
pub struct ToolExecutionResult {
    /// 성공 여부
    pub success: bool,
    /// 출력 내용
    pub output: String,
    /// 에러 메시지 (실패 시)
    pub error: Option<String>,
    /// 추가 메타데이터
    pub metadata: HashMap<String, Value>,
}

impl ToolExecutionResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message.into()),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// 도구 실행 컨텍스트
pub trait ToolContext: Send + Sync {
    /// 세션 ID
    fn session_id(&self) -> &str;

    /// 작업 디렉토리
    fn working_dir(&self) -> &Path;

    /// 추가 환경 변수
    fn env_vars(&self) -> &HashMap<String, String>;
}

/// 로컬 도구 인터페이스
#[async_trait]
pub trait Tool: Send + Sync {
    /// 도구 메타데이터
    fn meta(&self) -> ToolMeta;

    /// 도구 이름
    fn name(&self) -> &str;

    /// 입력 JSON Schema
    fn schema(&self) -> Value;

    /// 도구 실행
    async fn execute(&self, input: Value, context: &dyn ToolContext) -> Result<ToolExecutionResult>;

    /// 레지스트리 등록용 descriptor
    fn descriptor(&self) -> ToolDescriptor {
        let meta = self.meta();
        ToolDescriptor::local(meta.name, meta.description, self.schema())
            .with_capabilities(meta.capabilities)
    }
}

// ============================================================================
// Provider Trait - 모델 협력자
// ============================================================================

/// 채팅 요청
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
}

/// 채팅 응답 (파싱된 형태만 소비)
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
    /// 이 응답의 비용 (USD)
    pub cost: f64,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            ..Self::default()
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// LLM 프로바이더 인터페이스
///
/// wire 포맷과 재시도는 구현체의 책임입니다.
#[async_trait]
pub trait Provider: Send + Sync {
    /// 프로바이더 이름
    fn name(&self) -> &str;

    /// 채팅 완료
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}

// ============================================================================
// Permission Delegate - 승인 협력자
// ============================================================================

/// 승인 요청 응답
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionResponse {
    Approve,
    Reject,
}

/// 승인 UI 델리게이트
///
/// Ask disposition에 대해서만 호출됩니다. 해당 호출만 대기하고
/// 다른 동시 호출은 막지 않습니다.
#[async_trait]
pub trait PermissionDelegate: Send + Sync {
    async fn request_permission(&self, tool_name: &str, arguments: &Value) -> PermissionResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_meta_builder() {
        let meta = ToolMeta::new("bash")
            .display_name("Bash Shell")
            .description("Execute shell commands")
            .category("execute")
            .capabilities(Capabilities::process_exec());

        assert_eq!(meta.name, "bash");
        assert_eq!(meta.display_name, "Bash Shell");
        assert_eq!(meta.category, "execute");
        assert!(meta.capabilities.executes_process);
    }

    #[test]
    fn test_tool_execution_result() {
        let result =
            ToolExecutionResult::success("output").with_metadata("key", serde_json::json!("value"));
        assert!(result.success);
        assert_eq!(result.output, "output");
        assert!(result.metadata.contains_key("key"));

        let err = ToolExecutionResult::error("nope");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("nope"));
    }

    #[test]
    fn test_chat_response_helpers() {
        let resp = ChatResponse::text("done").with_cost(0.25);
        assert!(!resp.has_tool_calls());
        assert_eq!(resp.cost, 0.25);
    }
}
