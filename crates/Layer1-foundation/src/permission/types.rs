//! Permission Types - 규칙과 결정 타입

use super::pattern::{Specificity, ToolPattern};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 권한 결정
///
/// 순서는 허용 범위 기준 (Deny < Ask < Always).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// 항상 거부
    Deny,
    /// 사용자 확인
    Ask,
    /// 항상 허용
    Always,
}

impl Default for Disposition {
    fn default() -> Self {
        Self::Ask
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Deny => write!(f, "deny"),
            Disposition::Ask => write!(f, "ask"),
            Disposition::Always => write!(f, "always"),
        }
    }
}

/// 규칙 범위 (project가 global보다 우선)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    Global,
    Project,
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleScope::Global => write!(f, "global"),
            RuleScope::Project => write!(f, "project"),
        }
    }
}

/// 설정 파일의 규칙 항목
///
/// ```json
/// { "pattern": "bash*", "disposition": "always", "reason": "trusted repo" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub pattern: String,
    pub disposition: Disposition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RuleConfig {
    pub fn new(pattern: impl Into<String>, disposition: Disposition) -> Self {
        Self {
            pattern: pattern.into(),
            disposition,
            reason: None,
        }
    }

    pub fn always(pattern: impl Into<String>) -> Self {
        Self::new(pattern, Disposition::Always)
    }

    pub fn ask(pattern: impl Into<String>) -> Self {
        Self::new(pattern, Disposition::Ask)
    }

    pub fn deny(pattern: impl Into<String>) -> Self {
        Self::new(pattern, Disposition::Deny)
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// 컴파일된 권한 규칙
#[derive(Debug, Clone)]
pub struct PermissionRule {
    pub pattern: ToolPattern,
    pub disposition: Disposition,
    pub scope: RuleScope,
    /// 해당 scope 안에서의 선언 순서
    pub index: usize,
    pub reason: Option<String>,
}

impl PermissionRule {
    pub fn compile(config: &RuleConfig, scope: RuleScope, index: usize) -> Result<Self> {
        Ok(Self {
            pattern: ToolPattern::parse(&config.pattern)?,
            disposition: config.disposition,
            scope,
            index,
            reason: config.reason.clone(),
        })
    }

    /// 정렬 키: 구체성 > scope > 선언 순서 (모두 클수록 우선)
    pub fn rank(&self) -> (Specificity, RuleScope, usize) {
        (self.pattern.specificity(), self.scope, self.index)
    }

    pub fn matches(&self, tool_name: &str) -> bool {
        self.pattern.matches(tool_name)
    }
}

/// 결정 근거
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    /// 규칙 일치
    Rule {
        pattern: String,
        scope: RuleScope,
        index: usize,
    },
    /// 일치하는 규칙 없음
    Default,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSource::Rule {
                pattern,
                scope,
                index,
            } => write!(f, "{} rule #{} '{}'", scope, index, pattern),
            ResolutionSource::Default => write!(f, "default"),
        }
    }
}

/// resolve 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub disposition: Disposition,
    pub source: ResolutionSource,
    /// 신뢰 경계로 인해 Always가 막힌 도구인지
    pub trust_guarded: bool,
    /// 신뢰 경계가 결과를 낮췄는지
    pub capped: bool,
}

impl Resolution {
    pub fn explain(&self) -> String {
        if self.capped {
            format!(
                "{} (from {}, capped by untrusted working directory)",
                self.disposition, self.source
            )
        } else {
            format!("{} (from {})", self.disposition, self.source)
        }
    }
}
