//! Settings - 설정 파일 구조
//!
//! `settings.json` 하나에 권한 규칙, MCP 서버, 한도, 신뢰 디렉토리,
//! 서브에이전트 프로필이 들어갑니다.

use super::mcp::McpServerConfig;
use crate::budget::BudgetLimits;
use crate::permission::RuleConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// 설정 파일명
pub const SETTINGS_FILE: &str = "settings.json";

/// 설정 폴더 이름
pub const CONFIG_DIR_NAME: &str = ".anvil";

/// 한 scope의 설정 파일
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub permissions: PermissionSettings,

    #[serde(default)]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,

    #[serde(default)]
    pub limits: LimitsConfig,

    /// 신뢰 디렉토리 (global scope에서만 유효)
    #[serde(default)]
    pub trusted_directories: Vec<PathBuf>,

    #[serde(default)]
    pub non_interactive: NonInteractiveConfig,

    #[serde(default)]
    pub subagents: BTreeMap<String, SubagentProfileConfig>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| crate::Error::Config(format!("invalid settings: {}", e)))
    }
}

/// 권한 규칙 (선언 순서 유지)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionSettings {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

// ============================================================================
// Limits
// ============================================================================

/// 한도 설정 (scope 병합용, 모두 optional)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsConfig {
    pub max_turns: Option<u32>,
    pub max_cost_usd: Option<f64>,
    pub max_delegation_depth: Option<u32>,
    pub tool_timeout_secs: Option<u64>,
    pub startup_timeout_secs: Option<u64>,
    pub approval_timeout_secs: Option<u64>,
    pub max_parallel_tools: Option<usize>,
}

impl LimitsConfig {
    /// other 값이 우선
    pub fn merge(self, other: LimitsConfig) -> Self {
        Self {
            max_turns: other.max_turns.or(self.max_turns),
            max_cost_usd: other.max_cost_usd.or(self.max_cost_usd),
            max_delegation_depth: other.max_delegation_depth.or(self.max_delegation_depth),
            tool_timeout_secs: other.tool_timeout_secs.or(self.tool_timeout_secs),
            startup_timeout_secs: other.startup_timeout_secs.or(self.startup_timeout_secs),
            approval_timeout_secs: other.approval_timeout_secs.or(self.approval_timeout_secs),
            max_parallel_tools: other.max_parallel_tools.or(self.max_parallel_tools),
        }
    }

    pub fn resolve(&self) -> Limits {
        let defaults = Limits::default();
        Limits {
            max_turns: self.max_turns.unwrap_or(defaults.max_turns),
            max_cost_usd: self.max_cost_usd.or(defaults.max_cost_usd),
            max_delegation_depth: self
                .max_delegation_depth
                .unwrap_or(defaults.max_delegation_depth),
            tool_timeout: self
                .tool_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.tool_timeout),
            startup_timeout: self
                .startup_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.startup_timeout),
            approval_timeout: self
                .approval_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.approval_timeout),
            max_parallel_tools: self
                .max_parallel_tools
                .unwrap_or(defaults.max_parallel_tools)
                .max(1),
        }
    }
}

/// 확정된 한도
#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    pub max_turns: u32,
    pub max_cost_usd: Option<f64>,
    pub max_delegation_depth: u32,
    pub tool_timeout: Duration,
    pub startup_timeout: Duration,
    pub approval_timeout: Duration,
    pub max_parallel_tools: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_turns: 50,
            max_cost_usd: None,
            max_delegation_depth: 2,
            tool_timeout: Duration::from_secs(60),
            startup_timeout: Duration::from_secs(10),
            approval_timeout: Duration::from_secs(300),
            max_parallel_tools: 8,
        }
    }
}

impl Limits {
    pub fn budget_limits(&self) -> BudgetLimits {
        BudgetLimits {
            max_turns: Some(self.max_turns),
            max_cost: self.max_cost_usd,
            max_depth: self.max_delegation_depth,
        }
    }
}

// ============================================================================
// Non-interactive policy
// ============================================================================

/// 승인 협력자가 없을 때 Ask 처리 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AskPolicy {
    /// 자동 승인 (이벤트로 기록)
    #[default]
    Approve,
    /// 거부
    Deny,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonInteractiveConfig {
    #[serde(default)]
    pub ask_policy: Option<AskPolicy>,
}

// ============================================================================
// Subagent profiles
// ============================================================================

/// 서브에이전트 프로필 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentProfileConfig {
    #[serde(default)]
    pub description: String,

    /// 시스템 프롬프트
    #[serde(default)]
    pub instructions: String,

    /// 이 프로필의 턴 상한 (공유 Budget과 별개)
    #[serde(default)]
    pub max_turns: Option<u32>,

    /// 추가로 좁힐 도구 패턴 (비어 있으면 능력 필터만 적용)
    #[serde(default)]
    pub tools: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::Disposition;

    #[test]
    fn test_parse_full_settings() {
        let json = r#"{
            "permissions": {
                "rules": [
                    { "pattern": "read", "disposition": "always" },
                    { "pattern": "bash*", "disposition": "ask" }
                ]
            },
            "mcpServers": {
                "fetch": { "type": "http", "url": "http://localhost:9000/mcp" }
            },
            "limits": { "maxTurns": 12, "maxCostUsd": 2.5 },
            "trustedDirectories": ["/home/dev"],
            "nonInteractive": { "askPolicy": "deny" },
            "subagents": {
                "explore": { "description": "read-only search", "tools": ["read", "glob"] }
            }
        }"#;
        let settings = Settings::from_json(json).unwrap();
        assert_eq!(settings.permissions.rules.len(), 2);
        assert_eq!(settings.permissions.rules[0].disposition, Disposition::Always);
        assert!(settings.mcp_servers.contains_key("fetch"));
        assert_eq!(settings.limits.max_turns, Some(12));
        assert_eq!(settings.non_interactive.ask_policy, Some(AskPolicy::Deny));
        assert_eq!(settings.subagents["explore"].tools.len(), 2);
    }

    #[test]
    fn test_limits_merge_and_defaults() {
        let global = LimitsConfig {
            max_turns: Some(10),
            tool_timeout_secs: Some(30),
            ..LimitsConfig::default()
        };
        let project = LimitsConfig {
            max_turns: Some(20),
            ..LimitsConfig::default()
        };
        let limits = global.merge(project).resolve();
        assert_eq!(limits.max_turns, 20);
        assert_eq!(limits.tool_timeout, Duration::from_secs(30));
        assert_eq!(limits.startup_timeout, Duration::from_secs(10));
        assert_eq!(limits.max_cost_usd, None);
    }

    #[test]
    fn test_empty_settings() {
        let settings = Settings::from_json("{}").unwrap();
        assert!(settings.permissions.rules.is_empty());
        assert!(settings.mcp_servers.is_empty());
    }
}
