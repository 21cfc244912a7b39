//! Core Types - 공용 타입 정의
//!
//! 모든 레이어에서 공통으로 사용하는 타입들

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Message - LLM 대화 메시지
// ============================================================================

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: Uuid,

    /// Role of this message
    pub role: MessageRole,

    /// Text content
    pub content: String,

    /// Tool calls made by assistant (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Tool result (if this is a tool response message)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResultMessage>,
}

impl Message {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            tool_calls: None,
            tool_result: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    /// Assistant message carrying the calls the model requested
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::with_role(MessageRole::Assistant, content);
        msg.tool_calls = Some(tool_calls);
        msg
    }

    /// Tool result message built from a dispatch outcome
    pub fn tool_result(result: &ToolResult) -> Self {
        let mut msg = Self::with_role(MessageRole::Tool, String::new());
        msg.tool_result = Some(ToolResultMessage {
            tool_call_id: result.call_id.clone(),
            content: result.model_text(),
            is_error: !result.is_success(),
        });
        msg
    }
}

/// LLM에 전달되는 도구 결과 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}

/// 토큰 사용량
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

// ============================================================================
// Tool Call - 모델이 요청한 도구 호출
// ============================================================================

/// 도구 호출 요청자
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Requester {
    /// 최상위 에이전트
    #[default]
    TopLevel,
    /// 위임된 서브에이전트
    Subagent { task_id: String, depth: u32 },
}

impl Requester {
    pub fn depth(&self) -> u32 {
        match self {
            Requester::TopLevel => 0,
            Requester::Subagent { depth, .. } => *depth,
        }
    }
}

impl fmt::Display for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requester::TopLevel => write!(f, "top-level"),
            Requester::Subagent { task_id, depth } => write!(f, "subagent:{}@{}", task_id, depth),
        }
    }
}

/// A tool call requested by the model. Never mutated after the turn engine stamps it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call (per turn)
    pub id: String,

    /// Name of the tool to call
    pub name: String,

    /// Arguments as JSON
    pub arguments: Value,

    #[serde(default)]
    pub requester: Requester,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            requester: Requester::TopLevel,
        }
    }

    pub fn with_requester(mut self, requester: Requester) -> Self {
        self.requester = requester;
        self
    }
}

// ============================================================================
// Tool Result - dispatch 결과
// ============================================================================

/// 실패 분류
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "inner", rename_all = "snake_case")]
pub enum FailureKind {
    UnknownTool,
    StartupTimeout,
    ToolTimeout,
    TransportClosed,
    BudgetExceeded,
    DelegationFailed(Box<FailureKind>),
    /// 도구가 실행되었으나 실패를 보고함 (MCP isError 등)
    ExecutionError,
    /// 취소 신호 이후 dispatch 거부
    Cancelled,
    InternalFault,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::UnknownTool => write!(f, "UnknownTool"),
            FailureKind::StartupTimeout => write!(f, "StartupTimeout"),
            FailureKind::ToolTimeout => write!(f, "ToolTimeout"),
            FailureKind::TransportClosed => write!(f, "TransportClosed"),
            FailureKind::BudgetExceeded => write!(f, "BudgetExceeded"),
            FailureKind::DelegationFailed(inner) => write!(f, "DelegationFailed({})", inner),
            FailureKind::ExecutionError => write!(f, "ExecutionError"),
            FailureKind::Cancelled => write!(f, "Cancelled"),
            FailureKind::InternalFault => write!(f, "InternalFault"),
        }
    }
}

/// 결과 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Failed { kind: FailureKind },
    Denied,
    TimedOut,
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStatus::Success => write!(f, "success"),
            ToolStatus::Failed { kind } => write!(f, "failed({})", kind),
            ToolStatus::Denied => write!(f, "denied"),
            ToolStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// One result per ToolCall, produced by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub status: ToolStatus,
    /// 성공 시 출력
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// 실패 시 상세
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl ToolResult {
    fn base(call: &ToolCall, status: ToolStatus) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            status,
            payload: None,
            error: None,
            duration_ms: 0,
            metadata: HashMap::new(),
        }
    }

    pub fn success(call: &ToolCall, payload: impl Into<String>) -> Self {
        let mut result = Self::base(call, ToolStatus::Success);
        result.payload = Some(payload.into());
        result
    }

    pub fn failed(call: &ToolCall, kind: FailureKind, error: impl Into<String>) -> Self {
        let mut result = Self::base(call, ToolStatus::Failed { kind });
        result.error = Some(error.into());
        result
    }

    pub fn denied(call: &ToolCall, reason: impl Into<String>) -> Self {
        let mut result = Self::base(call, ToolStatus::Denied);
        result.error = Some(reason.into());
        result
    }

    /// Timed out. Partial output is never attached.
    pub fn timed_out(call: &ToolCall, timeout_ms: u64) -> Self {
        let mut result = Self::base(call, ToolStatus::TimedOut);
        result.error = Some(format!("{} timed out after {}ms", call.name, timeout_ms));
        result
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    pub fn failure_kind(&self) -> Option<&FailureKind> {
        match &self.status {
            ToolStatus::Failed { kind } => Some(kind),
            _ => None,
        }
    }

    /// 모델에게 보여줄 텍스트
    pub fn model_text(&self) -> String {
        match (&self.status, &self.payload, &self.error) {
            (ToolStatus::Success, Some(payload), _) => payload.clone(),
            (ToolStatus::Success, None, _) => String::new(),
            (status, _, Some(error)) => format!("[{}] {}", status, error),
            (status, _, None) => format!("[{}]", status),
        }
    }
}

// ============================================================================
// Tool Descriptor - 레지스트리 항목
// ============================================================================

/// Transport 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    #[default]
    Stdio,
    Http,
    StreamableHttp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stdio => write!(f, "stdio"),
            TransportKind::Http => write!(f, "http"),
            TransportKind::StreamableHttp => write!(f, "streamable-http"),
        }
    }
}

/// 도구 출처
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolOrigin {
    Local,
    Remote {
        server: String,
        /// 서버가 알고 있는 원래 이름
        remote_name: String,
        transport: TransportKind,
    },
}

/// 도구 능력 플래그
///
/// 서브에이전트 허용 여부와 신뢰 경계 검사가 이 플래그로 결정됩니다.
/// 새 도구는 기본적으로 서브에이전트에서 제외됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub writes_filesystem: bool,
    pub executes_process: bool,
    pub prompts_user: bool,
    pub delegates: bool,
    pub delegation_safe: bool,
}

impl Capabilities {
    pub fn read_only() -> Self {
        Self {
            delegation_safe: true,
            ..Self::default()
        }
    }

    pub fn filesystem_write() -> Self {
        Self {
            writes_filesystem: true,
            ..Self::default()
        }
    }

    pub fn process_exec() -> Self {
        Self {
            executes_process: true,
            ..Self::default()
        }
    }

    /// 신뢰되지 않은 디렉토리에서 Always가 될 수 없는 도구
    pub fn is_trust_guarded(&self) -> bool {
        self.writes_filesystem || self.executes_process
    }

    /// 서브에이전트의 제한된 레지스트리에 포함될 수 있는지
    pub fn allowed_in_subagent(&self) -> bool {
        self.delegation_safe && !self.writes_filesystem && !self.prompts_user
    }
}

/// 레지스트리에 등록된 도구 설명. 등록 후 불변.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub origin: ToolOrigin,
    pub capabilities: Capabilities,
}

impl ToolDescriptor {
    pub fn local(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            origin: ToolOrigin::Local,
            capabilities: Capabilities::default(),
        }
    }

    /// 원격 도구 (`{server}_{tool}` 이름 규칙)
    pub fn remote(
        server: impl Into<String>,
        tool: impl Into<String>,
        transport: TransportKind,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        let server = server.into();
        let tool = tool.into();
        Self {
            name: remote_tool_name(&server, &tool),
            description: description.into(),
            input_schema,
            origin: ToolOrigin::Remote {
                server,
                remote_name: tool,
                transport,
            },
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.origin, ToolOrigin::Remote { .. })
    }

    pub fn server(&self) -> Option<&str> {
        match &self.origin {
            ToolOrigin::Remote { server, .. } => Some(server),
            ToolOrigin::Local => None,
        }
    }
}

/// 원격 도구의 외부 이름
pub fn remote_tool_name(server: &str, tool: &str) -> String {
    format!("{}_{}", server, tool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_naming() {
        let desc = ToolDescriptor::remote("fetch", "get", TransportKind::Http, "", json!({}));
        assert_eq!(desc.name, "fetch_get");
        assert_eq!(desc.server(), Some("fetch"));
        assert!(desc.is_remote());
    }

    #[test]
    fn test_capability_gates() {
        assert!(Capabilities::read_only().allowed_in_subagent());
        assert!(!Capabilities::filesystem_write().allowed_in_subagent());
        assert!(!Capabilities::default().allowed_in_subagent());
        assert!(Capabilities::process_exec().is_trust_guarded());
        assert!(!Capabilities::read_only().is_trust_guarded());
    }

    #[test]
    fn test_model_text() {
        let call = ToolCall::new("c1", "read", json!({}));
        assert_eq!(ToolResult::success(&call, "ok").model_text(), "ok");

        let failed = ToolResult::failed(&call, FailureKind::UnknownTool, "no such tool");
        assert_eq!(failed.model_text(), "[failed(UnknownTool)] no such tool");
        assert!(!failed.is_success());
    }

    #[test]
    fn test_failure_kind_display() {
        let kind = FailureKind::DelegationFailed(Box::new(FailureKind::ToolTimeout));
        assert_eq!(kind.to_string(), "DelegationFailed(ToolTimeout)");
    }
}
