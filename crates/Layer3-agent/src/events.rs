//! Events emitted by the turn engine during execution

use crate::engine::TerminalState;
use anvil_foundation::{Requester, ToolStatus};

/// Turn engine events
///
/// `mpsc` 채널이 연결된 경우에만 전송되며, 수신 측이 없어도 엔진은 계속 진행합니다.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A new turn started (turn number within this engine run)
    TurnStarted { requester: Requester, turn: u32 },

    /// Parsed model response
    ModelResponse { text: String, tool_calls: usize },

    /// Tool dispatch started
    ToolStart {
        tool_name: String,
        tool_call_id: String,
    },

    /// Tool dispatch completed
    ToolComplete {
        tool_name: String,
        tool_call_id: String,
        status: ToolStatus,
        duration_ms: u64,
    },

    /// Token usage and cost of one model response
    Usage {
        input_tokens: u32,
        output_tokens: u32,
        cost: f64,
    },

    /// Engine reached a terminal state
    Done {
        state: TerminalState,
        final_text: String,
    },
}
