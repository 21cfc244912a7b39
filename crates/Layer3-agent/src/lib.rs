//! # anvil-agent
//!
//! Agent layer for Anvil - 모델 응답과 도구 실행을 번갈아 돌리는 turn engine과
//! 서브에이전트 위임을 제공합니다.
//!
//! ## 핵심 컴포넌트
//!
//! - **TurnEngine**: 턴 루프 (동시 dispatch, 요청 순서대로 결과 조립, Budget, 취소)
//! - **DelegationManager**: `task` 도구 → 능력 필터된 레지스트리를 가진 중첩 엔진
//! - **MessageHistory**: 모델에게 전달되는 대화 기록
//! - **CancelHandle**: 부모/자식 취소 전파
//!
//! ## 사용 예
//!
//! ```ignore
//! use anvil_agent::{CancelHandle, DelegationManager, MessageHistory, TurnEngine};
//!
//! let cancel = CancelHandle::new();
//! let manager = DelegationManager::from_snapshot(provider.clone(), dispatcher, &snapshot)?;
//! let engine = TurnEngine::new(provider, manager.install()?)
//!     .with_limits(snapshot.limits());
//!
//! let mut history = MessageHistory::new();
//! let outcome = engine.run(&mut history, "Find the config loader", &cancel).await;
//! println!("{}: {}", outcome.state, outcome.final_text);
//! ```

pub mod cancel;
pub mod delegation;
pub mod engine;
pub mod events;
pub mod history;

pub use cancel::CancelHandle;
pub use delegation::{DelegationManager, SubagentProfile};
pub use engine::{RunOutcome, TerminalState, TurnEngine};
pub use events::AgentEvent;
pub use history::MessageHistory;
