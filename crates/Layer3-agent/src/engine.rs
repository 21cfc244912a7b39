//! Turn Engine - 모델 응답과 도구 dispatch를 번갈아 실행하는 루프
//!
//! 한 턴: `AwaitingModelResponse → (ToolCallsRequested | FinalAnswer)`
//!
//! - 한 응답에 담긴 도구 호출은 동시에 dispatch 되지만, 결과는 항상
//!   모델이 요청한 순서대로 히스토리에 들어갑니다.
//! - 턴 수와 비용은 dispatcher가 가진 공유 [`Budget`](anvil_foundation::Budget)에 기록됩니다.
//! - 취소는 다음 모델 호출 전, 새 dispatch 전에 반영됩니다.

use crate::cancel::CancelHandle;
use crate::events::AgentEvent;
use crate::history::MessageHistory;
use anvil_core::Dispatcher;
use anvil_foundation::{
    BudgetKind, ChatRequest, Limits, Provider, Requester, TokenUsage, ToolCall, ToolResult,
};
use futures::future::join_all;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// ============================================================================
// Terminal state
// ============================================================================

/// 엔진 종료 상태
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum TerminalState {
    /// 모델이 최종 답변을 냄
    Completed,
    /// 턴 또는 비용 한도 소진
    Interrupted(BudgetKind),
    /// 외부 취소 신호
    Cancelled,
    /// 모델 프로바이더 실패 (복구 불가)
    Failed(String),
}

impl TerminalState {
    pub fn is_completed(&self) -> bool {
        matches!(self, TerminalState::Completed)
    }

    /// 자동화용 종료 코드
    pub fn exit_code(&self) -> i32 {
        match self {
            TerminalState::Completed => 0,
            TerminalState::Failed(_) => 1,
            TerminalState::Interrupted(_) => 2,
            TerminalState::Cancelled => 130,
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalState::Completed => write!(f, "completed"),
            TerminalState::Interrupted(kind) => write!(f, "interrupted({})", kind),
            TerminalState::Cancelled => write!(f, "cancelled"),
            TerminalState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// 한 번의 엔진 실행 결과
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: TerminalState,
    /// 마지막 모델 응답 텍스트
    pub final_text: String,
    /// 이 엔진이 시작한 턴 수
    pub turns: u32,
    /// 이 엔진이 기록한 비용 (USD)
    pub cost: f64,
    pub usage: TokenUsage,
}

// ============================================================================
// Turn Engine
// ============================================================================

/// Turn engine
///
/// 최상위 엔진과 서브에이전트 엔진 모두 같은 타입이며, 차이는
/// dispatcher의 레지스트리와 `requester`뿐입니다.
pub struct TurnEngine {
    provider: Arc<dyn Provider>,
    dispatcher: Dispatcher,
    requester: Requester,
    system_prompt: Option<String>,
    /// 공유 Budget과 별개인 이 엔진만의 턴 상한
    max_turns: Option<u32>,
    parallel: Arc<Semaphore>,
    event_tx: Option<mpsc::Sender<AgentEvent>>,
}

impl TurnEngine {
    const DEFAULT_MAX_PARALLEL: usize = 8;

    pub fn new(provider: Arc<dyn Provider>, dispatcher: Dispatcher) -> Self {
        Self {
            provider,
            dispatcher,
            requester: Requester::TopLevel,
            system_prompt: None,
            max_turns: None,
            parallel: Arc::new(Semaphore::new(Self::DEFAULT_MAX_PARALLEL)),
            event_tx: None,
        }
    }

    // === Builder methods ===

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// 이 엔진이 만드는 모든 호출에 찍힐 요청자
    pub fn with_requester(mut self, requester: Requester) -> Self {
        self.requester = requester;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// 한 턴 안에서 동시에 실행될 수 있는 도구 수
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.parallel = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    pub fn with_limits(self, limits: &Limits) -> Self {
        self.with_max_parallel(limits.max_parallel_tools)
    }

    pub fn with_events(mut self, tx: mpsc::Sender<AgentEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    // === Run ===

    /// 사용자 메시지를 추가하고 종료 상태까지 실행
    pub async fn run(
        &self,
        history: &mut MessageHistory,
        prompt: impl Into<String>,
        cancel: &CancelHandle,
    ) -> RunOutcome {
        history.add_user(prompt);
        self.run_history(history, cancel).await
    }

    /// 현재 히스토리에서 이어서 실행
    pub async fn run_history(&self, history: &mut MessageHistory, cancel: &CancelHandle) -> RunOutcome {
        if history.system_prompt().is_none() {
            if let Some(prompt) = &self.system_prompt {
                history.set_system_prompt(prompt.clone());
            }
        }

        let budget = self.dispatcher.budget().clone();
        let mut turns = 0u32;
        let mut cost = 0.0;
        let mut usage = TokenUsage::default();
        let mut final_text = String::new();

        let state = loop {
            if cancel.is_cancelled() {
                break TerminalState::Cancelled;
            }
            if let Some(max) = self.max_turns {
                if turns >= max {
                    debug!(requester = %self.requester, max, "Local turn limit reached");
                    break TerminalState::Interrupted(BudgetKind::Turns);
                }
            }
            if let Err(kind) = budget.try_begin_turn() {
                break TerminalState::Interrupted(kind);
            }
            turns += 1;
            debug!(
                requester = %self.requester,
                turn = turns,
                history_tokens = history.estimate_tokens(),
                "Requesting model response"
            );
            self.emit(AgentEvent::TurnStarted {
                requester: self.requester.clone(),
                turn: turns,
            })
            .await;

            let request = ChatRequest {
                system_prompt: history.system_prompt().map(str::to_string),
                messages: history.to_messages(),
                tools: self.dispatcher.registry().descriptors(),
            };

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => break TerminalState::Cancelled,
                response = self.provider.chat(request) => response,
            };
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    error!(provider = %self.provider.name(), "Model call failed: {}", e);
                    break TerminalState::Failed(e.to_string());
                }
            };

            cost += response.cost;
            if let Some(u) = response.usage {
                usage.input_tokens += u.input_tokens;
                usage.output_tokens += u.output_tokens;
                self.emit(AgentEvent::Usage {
                    input_tokens: u.input_tokens,
                    output_tokens: u.output_tokens,
                    cost: response.cost,
                })
                .await;
            }
            let exceeded = budget.record_cost(response.cost);

            self.emit(AgentEvent::ModelResponse {
                text: response.content.clone(),
                tool_calls: response.tool_calls.len(),
            })
            .await;
            final_text = response.content.clone();

            if !response.has_tool_calls() {
                history.add_assistant(&response.content);
                break TerminalState::Completed;
            }
            if let Some(kind) = exceeded {
                warn!(requester = %self.requester, turn = turns, "Budget exhausted after model response");
                break TerminalState::Interrupted(kind);
            }

            let calls: Vec<ToolCall> = response
                .tool_calls
                .into_iter()
                .map(|call| self.stamp(call))
                .collect();
            history.add_assistant_with_tools(&response.content, calls.clone());

            for result in self.dispatch_all(&calls, cancel).await {
                history.add_tool_result(&result);
            }
        };

        info!(
            requester = %self.requester,
            turns,
            cost,
            "Turn engine finished: {}",
            state
        );
        self.emit(AgentEvent::Done {
            state: state.clone(),
            final_text: final_text.clone(),
        })
        .await;

        RunOutcome {
            state,
            final_text,
            turns,
            cost,
            usage,
        }
    }

    /// 요청자 표시와 누락된 ID 보충. 이후 호출은 바뀌지 않습니다.
    fn stamp(&self, mut call: ToolCall) -> ToolCall {
        if call.id.is_empty() {
            call.id = format!("call_{}", Uuid::new_v4().simple());
        }
        call.with_requester(self.requester.clone())
    }

    /// 한 턴의 호출들을 동시에 실행하고 요청 순서대로 결과 반환
    async fn dispatch_all(&self, calls: &[ToolCall], cancel: &CancelHandle) -> Vec<ToolResult> {
        let pending = calls.iter().map(|call| async move {
            // 세마포어는 닫지 않으므로 실패하지 않음
            let _permit = self.parallel.acquire().await.ok();
            self.emit(AgentEvent::ToolStart {
                tool_name: call.name.clone(),
                tool_call_id: call.id.clone(),
            })
            .await;

            let result = self.dispatcher.dispatch_with_cancel(call, cancel.token()).await;

            self.emit(AgentEvent::ToolComplete {
                tool_name: call.name.clone(),
                tool_call_id: call.id.clone(),
                status: result.status.clone(),
                duration_ms: result.duration_ms,
            })
            .await;
            result
        });

        join_all(pending).await
    }

    async fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_core::ToolRegistry;
    use anvil_foundation::{Budget, ChatResponse, PermissionResolver, Result};
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
            let last = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(ChatResponse::text(format!("echo: {}", last)).with_cost(0.01))
        }
    }

    fn engine(dir: &std::path::Path) -> TurnEngine {
        let resolver = PermissionResolver::from_configs(&[], &[], true).unwrap();
        let dispatcher = Dispatcher::with_working_dir(
            Arc::new(ToolRegistry::new()),
            Arc::new(resolver),
            Arc::new(Budget::unlimited()),
            dir,
        );
        TurnEngine::new(Arc::new(EchoProvider), dispatcher)
    }

    #[test]
    fn test_terminal_state_exit_codes() {
        assert_eq!(TerminalState::Completed.exit_code(), 0);
        assert_eq!(TerminalState::Failed("x".into()).exit_code(), 1);
        assert_eq!(TerminalState::Interrupted(BudgetKind::Cost).exit_code(), 2);
        assert_eq!(TerminalState::Cancelled.exit_code(), 130);
        assert_eq!(
            TerminalState::Interrupted(BudgetKind::Turns).to_string(),
            "interrupted(turns)"
        );
    }

    #[test]
    fn test_stamp_sets_requester_and_id() {
        let dir = tempfile::tempdir().unwrap();
        let requester = Requester::Subagent {
            task_id: "t1".into(),
            depth: 1,
        };
        let engine = engine(dir.path()).with_requester(requester.clone());

        let stamped = engine.stamp(ToolCall::new("", "read", json!({})));
        assert!(stamped.id.starts_with("call_"));
        assert_eq!(stamped.requester, requester);

        let kept = engine.stamp(ToolCall::new("abc", "read", json!({})));
        assert_eq!(kept.id, "abc");
    }

    #[tokio::test]
    async fn test_final_answer_completes() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let engine = engine(dir.path())
            .with_system_prompt("be brief")
            .with_events(tx);
        let mut history = MessageHistory::new();

        let outcome = engine.run(&mut history, "hi", &CancelHandle::new()).await;
        assert_eq!(outcome.state, TerminalState::Completed);
        assert_eq!(outcome.final_text, "echo: hi");
        assert_eq!(outcome.turns, 1);
        assert_eq!(history.system_prompt(), Some("be brief"));
        assert_eq!(history.len(), 2);

        let mut saw_done = false;
        while let Ok(event) = rx.try_recv() {
            if let AgentEvent::Done { state, .. } = event {
                saw_done = state.is_completed();
            }
        }
        assert!(saw_done);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_turn() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let cancel = CancelHandle::new();
        cancel.cancel();

        let mut history = MessageHistory::new();
        let outcome = engine.run(&mut history, "hi", &cancel).await;
        assert_eq!(outcome.state, TerminalState::Cancelled);
        assert_eq!(outcome.turns, 0);
        assert_eq!(engine.dispatcher().budget().usage().consumed_turns, 0);
    }
}
