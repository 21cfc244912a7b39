//! Error types for Anvil
//!
//! 모든 에러를 중앙에서 관리하고, dispatch 경로의 에러는
//! `FailureKind`로 변환되어 모델에게 일반 도구 결과로 전달됩니다.

use crate::core::FailureKind;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Anvil 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 권한 관련
    // ========================================================================
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // ========================================================================
    // Provider 관련 (외부 협력자 에러는 그대로 상위로 전달)
    // ========================================================================
    #[error("Provider error: {0}")]
    Provider(String),

    // ========================================================================
    // MCP / Transport 관련
    // ========================================================================
    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("MCP server not found: {0}")]
    McpServerNotFound(String),

    #[error("MCP connection error: {0}")]
    McpConnection(String),

    #[error("Startup timeout: {server} did not become ready within {timeout_ms}ms")]
    StartupTimeout { server: String, timeout_ms: u64 },

    #[error("Transport closed: {0}")]
    TransportClosed(String),

    // ========================================================================
    // Tool 관련
    // ========================================================================
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool} - {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool timeout: {tool} exceeded {timeout_ms}ms")]
    ToolTimeout { tool: String, timeout_ms: u64 },

    // ========================================================================
    // Budget / Delegation 관련
    // ========================================================================
    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("Delegation failed ({kind}): {message}")]
    Delegation { kind: FailureKind, message: String },

    // ========================================================================
    // 실행 관련
    // ========================================================================
    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 재시도 가능한 에러인지 확인
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ToolTimeout { .. } | Error::McpConnection(_) | Error::Http(_)
        )
    }

    /// Transport 세션이 더 이상 쓸 수 없는 상태인지
    pub fn is_transport_fatal(&self) -> bool {
        matches!(self, Error::TransportClosed(_) | Error::StartupTimeout { .. })
    }

    /// dispatch 결과 분류로 변환
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::ToolNotFound(_) => FailureKind::UnknownTool,
            Error::StartupTimeout { .. } => FailureKind::StartupTimeout,
            Error::ToolTimeout { .. } => FailureKind::ToolTimeout,
            Error::TransportClosed(_) => FailureKind::TransportClosed,
            Error::BudgetExceeded(_) => FailureKind::BudgetExceeded,
            Error::Delegation { kind, .. } => FailureKind::DelegationFailed(Box::new(kind.clone())),
            Error::Cancelled => FailureKind::Cancelled,
            Error::ToolExecution { .. }
            | Error::InvalidInput(_)
            | Error::PermissionDenied(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Mcp(_)
            | Error::McpConnection(_)
            | Error::McpServerNotFound(_)
            | Error::Http(_) => FailureKind::ExecutionError,
            Error::Config(_) | Error::Provider(_) | Error::Internal(_) => {
                FailureKind::InternalFault
            }
        }
    }

    /// Tool 실행 에러 생성 헬퍼
    pub fn tool_execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Delegation 에러 생성 헬퍼
    pub fn delegation(kind: FailureKind, message: impl Into<String>) -> Self {
        Error::Delegation {
            kind,
            message: message.into(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            Error::McpConnection(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            Error::ToolNotFound("x".into()).failure_kind(),
            FailureKind::UnknownTool
        );
        assert_eq!(
            Error::TransportClosed("pipe".into()).failure_kind(),
            FailureKind::TransportClosed
        );
        assert_eq!(
            Error::delegation(FailureKind::BudgetExceeded, "depth").failure_kind(),
            FailureKind::DelegationFailed(Box::new(FailureKind::BudgetExceeded))
        );
        assert_eq!(
            Error::Internal("boom".into()).failure_kind(),
            FailureKind::InternalFault
        );
    }

    #[test]
    fn test_transport_fatal() {
        assert!(Error::TransportClosed("x".into()).is_transport_fatal());
        assert!(!Error::Mcp("x".into()).is_transport_fatal());
    }
}
