//! Event Types - dispatch 이벤트 정의

use crate::core::{Requester, ToolStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 이벤트 ID
pub type EventId = Uuid;

/// 이벤트 종류
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEventKind {
    /// dispatch 시작
    Started,
    /// 승인 협력자에게 요청 중
    ApprovalRequested,
    /// 비대화형 정책에 의한 자동 승인
    AutoApproved,
    /// dispatch 종료 (결과와 무관하게 항상 발생)
    Finished { status: ToolStatus, duration_ms: u64 },
}

/// dispatch 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEvent {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub call_id: String,
    pub tool: String,
    pub requester: Requester,
    pub kind: DispatchEventKind,
}

impl DispatchEvent {
    pub fn new(
        call_id: impl Into<String>,
        tool: impl Into<String>,
        requester: Requester,
        kind: DispatchEventKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            call_id: call_id.into(),
            tool: tool.into(),
            requester,
            kind,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.kind, DispatchEventKind::Finished { .. })
    }

    /// 이벤트 타입 문자열 (로그용)
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            DispatchEventKind::Started => "tool.started",
            DispatchEventKind::ApprovalRequested => "tool.approval_requested",
            DispatchEventKind::AutoApproved => "tool.auto_approved",
            DispatchEventKind::Finished { .. } => "tool.finished",
        }
    }
}
