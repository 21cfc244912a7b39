//! Delegation seam - `task` 도구
//!
//! 실제 서브에이전트 실행은 Layer3의 DelegationManager가 담당합니다.
//! 이 레이어는 descriptor와 dispatcher가 호출할 trait만 정의합니다.

use anvil_foundation::{Capabilities, Result, ToolCall, ToolDescriptor};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// 위임 도구 이름
pub const NAME: &str = "task";

/// `task` 도구 입력
#[derive(Debug, Clone, Deserialize)]
pub struct TaskInput {
    /// 짧은 작업 설명 (3-5 단어)
    #[serde(default)]
    pub description: String,

    /// 서브에이전트에게 줄 지시
    pub prompt: String,

    /// 사용할 프로필 (기본: explore)
    #[serde(default)]
    pub subagent_type: Option<String>,
}

impl TaskInput {
    pub fn parse(arguments: &Value) -> Result<Self> {
        serde_json::from_value(arguments.clone()).map_err(|e| {
            anvil_foundation::Error::InvalidInput(format!("invalid task input: {}", e))
        })
    }
}

/// 부모에게 돌아가는 것: 최종 텍스트와 사용량
#[derive(Debug, Clone, PartialEq)]
pub struct DelegationReport {
    pub text: String,
    pub turns: u32,
    pub cost: f64,
    pub profile: String,
}

/// 서브에이전트 실행기
///
/// 실패는 `Error::Delegation { kind, .. }`로 돌려주면 dispatcher가
/// `Failed(DelegationFailed(kind))`로 변환합니다.
///
/// `cancel`은 이 호출을 dispatch한 세션의 토큰입니다. 중첩 엔진은 이
/// 토큰의 자식으로 취소를 받아야 합니다.
#[async_trait]
pub trait Delegator: Send + Sync {
    async fn delegate(&self, call: &ToolCall, cancel: &CancellationToken)
        -> Result<DelegationReport>;
}

/// `task` descriptor
///
/// 재귀 위임을 허용하므로 delegation-safe로 표시합니다 (깊이는 Budget이 제한).
pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor::local(
        NAME,
        "Launch a subagent with a restricted, read-only tool set to work on a \
         self-contained task. Returns only the subagent's final answer.",
        schema(),
    )
    .with_capabilities(Capabilities {
        delegates: true,
        delegation_safe: true,
        ..Capabilities::default()
    })
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "description": {
                "type": "string",
                "description": "A short (3-5 word) description of the task"
            },
            "prompt": {
                "type": "string",
                "description": "The task for the subagent to perform"
            },
            "subagent_type": {
                "type": "string",
                "description": "Profile to use (default: explore)"
            }
        },
        "required": ["prompt"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor() {
        let d = descriptor();
        assert_eq!(d.name, NAME);
        assert!(d.capabilities.delegates);
        assert!(d.capabilities.allowed_in_subagent());
        assert!(!d.capabilities.is_trust_guarded());
    }

    #[test]
    fn test_parse_input() {
        let input = TaskInput::parse(&json!({ "prompt": "find the config loader" })).unwrap();
        assert_eq!(input.prompt, "find the config loader");
        assert!(input.subagent_type.is_none());

        assert!(TaskInput::parse(&json!({ "description": "no prompt" })).is_err());
    }
}
