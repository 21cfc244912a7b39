//! Permission Resolver - 도구 호출 권한 결정
//!
//! 세션 동안 불변입니다. 설정 스냅샷에서 한 번 만들고, 규칙이 바뀌면
//! 새 resolver를 만듭니다.
//!
//! 결정 순서:
//! 1. 신뢰 경계 (신뢰되지 않은 작업 디렉토리에서는 write/exec 도구가 최대 `Ask`)
//! 2. 구체성 순 규칙: exact > glob > regex, 그다음 project > global,
//!    그다음 나중에 선언된 규칙 > 먼저 선언된 규칙
//! 3. 기본값 `Ask`

use super::types::{
    Disposition, PermissionRule, Resolution, ResolutionSource, RuleConfig, RuleScope,
};
use crate::core::{Requester, ToolDescriptor};
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::trace;

/// 작업 디렉토리가 신뢰 목록 아래에 있는지
pub fn is_trusted_directory(working_dir: &Path, trusted: &[PathBuf]) -> bool {
    trusted.iter().any(|root| working_dir.starts_with(root))
}

/// 권한 결정기
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    /// rank 내림차순 정렬됨
    rules: Vec<PermissionRule>,
    trusted_directory: bool,
}

impl PermissionResolver {
    pub fn new(mut rules: Vec<PermissionRule>, trusted_directory: bool) -> Self {
        rules.sort_by(|a, b| b.rank().cmp(&a.rank()));
        Self {
            rules,
            trusted_directory,
        }
    }

    /// global/project 규칙 목록에서 생성
    pub fn from_configs(
        global: &[RuleConfig],
        project: &[RuleConfig],
        trusted_directory: bool,
    ) -> Result<Self> {
        let mut rules = Vec::with_capacity(global.len() + project.len());
        for (index, config) in global.iter().enumerate() {
            rules.push(PermissionRule::compile(config, RuleScope::Global, index)?);
        }
        for (index, config) in project.iter().enumerate() {
            rules.push(PermissionRule::compile(config, RuleScope::Project, index)?);
        }
        Ok(Self::new(rules, trusted_directory))
    }

    pub fn is_trusted_directory(&self) -> bool {
        self.trusted_directory
    }

    pub fn rules(&self) -> &[PermissionRule] {
        &self.rules
    }

    /// 이름에 가장 우선하는 규칙
    pub fn matching_rule(&self, tool_name: &str) -> Option<&PermissionRule> {
        self.rules.iter().find(|rule| rule.matches(tool_name))
    }

    /// 도구 호출에 대한 disposition 결정
    pub fn resolve(&self, tool: &ToolDescriptor, requester: &Requester) -> Resolution {
        // 신뢰 경계는 규칙보다 먼저 결정
        let trust_guarded = !self.trusted_directory && tool.capabilities.is_trust_guarded();
        let ceiling = if trust_guarded {
            Disposition::Ask
        } else {
            Disposition::Always
        };

        let (disposition, source) = match self.matching_rule(&tool.name) {
            Some(rule) => (
                rule.disposition,
                ResolutionSource::Rule {
                    pattern: rule.pattern.as_str(),
                    scope: rule.scope,
                    index: rule.index,
                },
            ),
            None => (Disposition::Ask, ResolutionSource::Default),
        };

        let capped = disposition > ceiling;
        let resolution = Resolution {
            disposition: disposition.min(ceiling),
            source,
            trust_guarded,
            capped,
        };

        trace!(
            tool = %tool.name,
            requester = %requester,
            disposition = %resolution.disposition,
            "permission resolved: {}",
            resolution.explain()
        );

        resolution
    }
}
