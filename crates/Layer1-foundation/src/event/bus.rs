//! Event Bus - 이벤트 브로드캐스트 시스템
//!
//! dispatch 이벤트를 broadcast 구독자에게 전달하고 최근 이벤트를
//! 보관합니다. 전역 버스는 없고 dispatcher마다 하나씩 가집니다.

use super::types::DispatchEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

// ============================================================================
// EventBus
// ============================================================================

/// 이벤트 버스 설정
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// 브로드캐스트 채널 용량
    pub channel_capacity: usize,

    /// 이벤트 히스토리 보관 개수
    pub history_size: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            history_size: 256,
        }
    }
}

/// 이벤트 버스
pub struct EventBus {
    config: EventBusConfig,
    sender: broadcast::Sender<DispatchEvent>,
    history: RwLock<VecDeque<DispatchEvent>>,
    event_count: AtomicU64,
}

impl EventBus {
    /// 기본 설정으로 이벤트 버스 생성
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// 커스텀 설정으로 이벤트 버스 생성
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));

        Self {
            config,
            sender,
            history: RwLock::new(VecDeque::new()),
            event_count: AtomicU64::new(0),
        }
    }

    /// 이벤트 발행
    pub async fn publish(&self, event: DispatchEvent) {
        let count = self.event_count.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(
            event_id = %event.id,
            event_type = event.event_type(),
            tool = %event.tool,
            "Publishing event #{}", count
        );

        {
            let mut history = self.history.write().await;
            history.push_back(event.clone());
            while history.len() > self.config.history_size {
                history.pop_front();
            }
        }

        // 수신자가 없으면 send 실패는 정상
        let _ = self.sender.send(event);
    }

    /// 브로드캐스트 수신자 생성 (스트림 방식)
    pub fn receiver(&self) -> broadcast::Receiver<DispatchEvent> {
        self.sender.subscribe()
    }

    /// 최근 이벤트 (오래된 순)
    pub async fn history(&self) -> Vec<DispatchEvent> {
        self.history.read().await.iter().cloned().collect()
    }

    /// 특정 호출의 이벤트
    pub async fn events_for_call(&self, call_id: &str) -> Vec<DispatchEvent> {
        self.history
            .read()
            .await
            .iter()
            .filter(|e| e.call_id == call_id)
            .cloned()
            .collect()
    }

    /// 총 발행된 이벤트 수
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 테스트
// ============================================================================
