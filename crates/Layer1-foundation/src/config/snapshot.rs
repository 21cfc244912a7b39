//! Session Snapshot - 세션 시작 시 고정되는 설정
//!
//! 세션 중 설정 파일이 바뀌어도 이미 만들어진 스냅샷과 resolver는
//! 바뀌지 않습니다. 변경을 반영하려면 새 스냅샷을 만들어야 합니다.

use super::mcp::McpServerConfig;
use super::settings::{AskPolicy, Limits, Settings, SubagentProfileConfig};
use crate::permission::{is_trusted_directory, PermissionResolver, RuleConfig, RuleScope};
use crate::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// 세션 설정 스냅샷
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    working_dir: PathBuf,
    rules: Vec<(RuleScope, RuleConfig)>,
    servers: BTreeMap<String, McpServerConfig>,
    limits: Limits,
    trusted: bool,
    ask_policy: AskPolicy,
    subagents: BTreeMap<String, SubagentProfileConfig>,
}

impl SessionSnapshot {
    /// 빈 스냅샷 (기본 한도, 신뢰되지 않은 디렉토리)
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            rules: Vec::new(),
            servers: BTreeMap::new(),
            limits: Limits::default(),
            trusted: false,
            ask_policy: AskPolicy::default(),
            subagents: BTreeMap::new(),
        }
    }

    /// global + project 설정 병합
    ///
    /// - 권한 규칙은 scope와 선언 순서를 유지한 채 모두 보관
    /// - 신뢰 디렉토리는 global 설정만 사용
    /// - 신뢰되지 않은 디렉토리에서는 project가 정의한 MCP 서버를 띄우지 않음
    pub fn from_layers(working_dir: &Path, global: Settings, project: Settings) -> Result<Self> {
        let trusted = is_trusted_directory(working_dir, &global.trusted_directories);
        if !project.trusted_directories.is_empty() {
            warn!("Ignoring trustedDirectories from project settings");
        }

        let mut rules = Vec::new();
        rules.extend(global.permissions.rules.into_iter().map(|r| (RuleScope::Global, r)));
        rules.extend(project.permissions.rules.into_iter().map(|r| (RuleScope::Project, r)));

        let mut servers = global.mcp_servers;
        for (name, server) in project.mcp_servers {
            if trusted {
                servers.insert(name, server);
            } else {
                warn!(
                    server = %name,
                    "Skipping project MCP server in untrusted directory {}",
                    working_dir.display()
                );
            }
        }
        for (name, server) in &servers {
            server.validate(name)?;
        }

        let mut subagents = global.subagents;
        subagents.extend(project.subagents);

        let snapshot = Self {
            working_dir: working_dir.to_path_buf(),
            rules,
            servers,
            limits: global.limits.merge(project.limits).resolve(),
            trusted,
            ask_policy: project
                .non_interactive
                .ask_policy
                .or(global.non_interactive.ask_policy)
                .unwrap_or_default(),
            subagents,
        };

        // 규칙 패턴 검증
        snapshot.resolver()?;
        Ok(snapshot)
    }

    // === Builder methods (프로그래밍 방식 구성) ===

    pub fn with_rule(mut self, scope: RuleScope, rule: RuleConfig) -> Self {
        self.rules.push((scope, rule));
        self
    }

    pub fn with_server(mut self, name: impl Into<String>, config: McpServerConfig) -> Self {
        self.servers.insert(name.into(), config);
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }

    pub fn with_ask_policy(mut self, policy: AskPolicy) -> Self {
        self.ask_policy = policy;
        self
    }

    pub fn with_subagent(mut self, name: impl Into<String>, profile: SubagentProfileConfig) -> Self {
        self.subagents.insert(name.into(), profile);
        self
    }

    // === Accessors ===

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn rules(&self) -> &[(RuleScope, RuleConfig)] {
        &self.rules
    }

    pub fn servers(&self) -> &BTreeMap<String, McpServerConfig> {
        &self.servers
    }

    /// 활성화된 서버만
    pub fn enabled_servers(&self) -> impl Iterator<Item = (&String, &McpServerConfig)> {
        self.servers.iter().filter(|(_, s)| s.enabled)
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    pub fn ask_policy(&self) -> AskPolicy {
        self.ask_policy
    }

    pub fn subagents(&self) -> &BTreeMap<String, SubagentProfileConfig> {
        &self.subagents
    }

    /// 이 스냅샷으로 resolver 생성
    pub fn resolver(&self) -> Result<PermissionResolver> {
        let global: Vec<_> = self
            .rules
            .iter()
            .filter(|(scope, _)| *scope == RuleScope::Global)
            .map(|(_, r)| r.clone())
            .collect();
        let project: Vec<_> = self
            .rules
            .iter()
            .filter(|(scope, _)| *scope == RuleScope::Project)
            .map(|(_, r)| r.clone())
            .collect();
        PermissionResolver::from_configs(&global, &project, self.trusted)
    }
}
