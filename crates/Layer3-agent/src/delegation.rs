//! Delegation Manager - `task` 도구로 서브에이전트 실행
//!
//! 서브에이전트는 중첩된 [`TurnEngine`]입니다.
//!
//! - 레지스트리는 능력 플래그로 걸러진 복사본 (이름 목록이 아님)
//! - resolver, Budget, 이벤트 버스, 승인 협력자는 부모와 공유
//! - 깊이는 공유 Budget의 `max_depth`로 제한
//! - 취소는 `task` 호출을 dispatch한 토큰에서 상속
//! - 부모에게는 최종 텍스트와 턴/비용 카운터만 돌아감

use crate::cancel::CancelHandle;
use crate::engine::{TerminalState, TurnEngine};
use crate::history::MessageHistory;
use anvil_core::tool::delegate;
use anvil_core::{DelegationReport, Delegator, Dispatcher, TaskInput, ToolEntry, ToolRegistry};
use anvil_foundation::permission::any_matches;
use anvil_foundation::{
    Error, FailureKind, Provider, Requester, Result, SessionSnapshot, SubagentProfileConfig,
    ToolCall, ToolDescriptor, ToolPattern,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ============================================================================
// Subagent Profile
// ============================================================================

/// 서브에이전트 프로필
#[derive(Debug, Clone)]
pub struct SubagentProfile {
    pub name: String,
    pub description: String,
    /// 서브에이전트 시스템 프롬프트
    pub instructions: String,
    /// 프로필 자체의 턴 상한
    pub max_turns: Option<u32>,
    /// 능력 필터 위에 추가로 적용되는 허용 패턴 (비어 있으면 전부)
    pub tools: Vec<ToolPattern>,
}

impl SubagentProfile {
    /// 기본 프로필 이름
    pub const EXPLORE: &'static str = "explore";

    /// 내장 `explore` 프로필
    pub fn explore() -> Self {
        Self {
            name: Self::EXPLORE.to_string(),
            description: "Read-only codebase exploration".to_string(),
            instructions: "You are a read-only exploration agent. Use the available tools to \
                           investigate the task, then reply with a concise final answer. \
                           You cannot modify files or run commands."
                .to_string(),
            max_turns: Some(20),
            tools: Vec::new(),
        }
    }

    /// 설정에서 프로필 생성 (패턴 검증 포함)
    pub fn from_config(name: &str, config: &SubagentProfileConfig) -> Result<Self> {
        let tools = config
            .tools
            .iter()
            .map(|raw| ToolPattern::parse(raw))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: name.to_string(),
            description: config.description.clone(),
            instructions: config.instructions.clone(),
            max_turns: config.max_turns,
            tools,
        })
    }

    /// 이 프로필의 서브에이전트가 이 도구를 볼 수 있는지
    pub fn allows(&self, descriptor: &ToolDescriptor) -> bool {
        descriptor.capabilities.allowed_in_subagent()
            && (self.tools.is_empty() || any_matches(&self.tools, &descriptor.name))
    }
}

// ============================================================================
// Delegation Manager
// ============================================================================

/// 서브에이전트 실행기
///
/// ```ignore
/// let manager = DelegationManager::from_snapshot(provider.clone(), dispatcher, &snapshot)?;
/// let dispatcher = manager.install()?;
/// let engine = TurnEngine::new(provider, dispatcher);
/// ```
pub struct DelegationManager {
    provider: Arc<dyn Provider>,
    /// 전체 레지스트리를 가진 부모 dispatcher (delegator 없음)
    dispatcher: Dispatcher,
    profiles: BTreeMap<String, SubagentProfile>,
    max_parallel: usize,
    this: Weak<DelegationManager>,
}

impl DelegationManager {
    const DEFAULT_MAX_PARALLEL: usize = 8;

    /// `explore` 외 프로필은 같은 이름이면 덮어씀
    pub fn new(
        provider: Arc<dyn Provider>,
        dispatcher: Dispatcher,
        profiles: Vec<SubagentProfile>,
    ) -> Arc<Self> {
        Self::build(provider, dispatcher, profiles, Self::DEFAULT_MAX_PARALLEL)
    }

    /// 세션 스냅샷의 서브에이전트 설정과 병렬 한도 사용
    pub fn from_snapshot(
        provider: Arc<dyn Provider>,
        dispatcher: Dispatcher,
        snapshot: &SessionSnapshot,
    ) -> Result<Arc<Self>> {
        let profiles = snapshot
            .subagents()
            .iter()
            .map(|(name, config)| SubagentProfile::from_config(name, config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::build(
            provider,
            dispatcher,
            profiles,
            snapshot.limits().max_parallel_tools,
        ))
    }

    fn build(
        provider: Arc<dyn Provider>,
        dispatcher: Dispatcher,
        profiles: Vec<SubagentProfile>,
        max_parallel: usize,
    ) -> Arc<Self> {
        let mut map = BTreeMap::new();
        map.insert(SubagentProfile::EXPLORE.to_string(), SubagentProfile::explore());
        for profile in profiles {
            map.insert(profile.name.clone(), profile);
        }

        Arc::new_cyclic(|this| Self {
            provider,
            dispatcher,
            profiles: map,
            max_parallel,
            this: this.clone(),
        })
    }

    /// `task` 도구를 레지스트리에 등록하고 위임이 연결된 dispatcher 반환
    pub fn install(self: &Arc<Self>) -> Result<Dispatcher> {
        let registry = self.dispatcher.registry();
        if !registry.contains(delegate::NAME) {
            registry.register(ToolEntry::delegate())?;
        }
        Ok(self.dispatcher.clone().with_delegator(self.clone()))
    }

    pub fn profile(&self, name: &str) -> Option<&SubagentProfile> {
        self.profiles.get(name)
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// 프로필이 볼 수 있는 도구만 담은 레지스트리 (지금 시점의 복사본)
    pub fn restricted_registry(&self, profile: &SubagentProfile) -> ToolRegistry {
        self.dispatcher.registry().filtered(|d| profile.allows(d))
    }

    fn unknown_profile(&self, name: &str) -> Error {
        Error::InvalidInput(format!(
            "unknown subagent type '{}' (available: {})",
            name,
            self.profile_names().join(", ")
        ))
    }
}

#[async_trait]
impl Delegator for DelegationManager {
    async fn delegate(
        &self,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> Result<DelegationReport> {
        let input = TaskInput::parse(&call.arguments)?;
        let profile_name = input
            .subagent_type
            .as_deref()
            .unwrap_or(SubagentProfile::EXPLORE);
        let profile = self
            .profiles
            .get(profile_name)
            .ok_or_else(|| self.unknown_profile(profile_name))?;

        let depth = call.requester.depth() + 1;
        self.dispatcher
            .budget()
            .check_depth(depth)
            .map_err(|e| Error::delegation(FailureKind::BudgetExceeded, e.to_string()))?;

        let this = self
            .this
            .upgrade()
            .ok_or_else(|| Error::Internal("delegation manager dropped".to_string()))?;
        let registry = Arc::new(self.restricted_registry(profile));
        let tool_count = registry.len();
        let dispatcher = self.dispatcher.restricted(registry).with_delegator(this);

        let mut engine = TurnEngine::new(self.provider.clone(), dispatcher)
            .with_requester(Requester::Subagent {
                task_id: call.id.clone(),
                depth,
            })
            .with_system_prompt(profile.instructions.clone())
            .with_max_parallel(self.max_parallel);
        if let Some(max) = profile.max_turns {
            engine = engine.with_max_turns(max);
        }

        info!(
            task = %call.id,
            profile = %profile.name,
            depth,
            tools = tool_count,
            "Starting subagent: {}",
            input.description
        );

        let mut history = MessageHistory::new();
        let outcome = engine
            .run(&mut history, input.prompt, &CancelHandle::child_of(cancel))
            .await;

        match outcome.state {
            TerminalState::Completed => Ok(DelegationReport {
                text: outcome.final_text,
                turns: outcome.turns,
                cost: outcome.cost,
                profile: profile.name.clone(),
            }),
            TerminalState::Interrupted(kind) => {
                warn!(task = %call.id, "Subagent interrupted: {} budget exhausted", kind);
                Err(Error::delegation(
                    FailureKind::BudgetExceeded,
                    format!(
                        "subagent '{}' stopped after {} turns: {} budget exhausted",
                        profile.name, outcome.turns, kind
                    ),
                ))
            }
            TerminalState::Cancelled => Err(Error::delegation(
                FailureKind::Cancelled,
                format!("subagent '{}' was cancelled", profile.name),
            )),
            TerminalState::Failed(reason) => Err(Error::delegation(
                FailureKind::InternalFault,
                format!("subagent '{}' failed: {}", profile.name, reason),
            )),
        }
    }
}
