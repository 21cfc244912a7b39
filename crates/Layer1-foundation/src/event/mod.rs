//! Event System - dispatch 이벤트 발행/구독
//!
//! ## 아키텍처
//!
//! ```text
//! Dispatcher ── publish(DispatchEvent) ──► EventBus
//!                                            ├── broadcast::Receiver (스트림)
//!                                            └── history (최근 N개)
//! ```
//!
//! 모든 dispatch는 결과와 상관없이 `Started`와 `Finished`를 한 번씩 발행합니다.

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventBusConfig};
pub use types::{DispatchEvent, DispatchEventKind, EventId};
