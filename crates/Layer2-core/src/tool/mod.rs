//! Tool System - 도구 등록과 실행
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ToolRegistry                                                │
//! │  ├── Local(Arc<dyn Tool>)   - builtin 도구                   │
//! │  ├── Remote(Arc<McpClient>) - {server}_{tool}                │
//! │  └── Delegate               - task (서브에이전트)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Dispatcher                                                  │
//! │  ├── lookup → resolve → approve → budget → execute           │
//! │  └── DispatchEvent 발행 (Started / Finished)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RuntimeContext (ToolContext 구현)                           │
//! │  └── 세션 ID, 작업 디렉토리, 환경 변수                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 사용법
//!
//! ```ignore
//! use anvil_core::tool::{Dispatcher, ToolRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ToolRegistry::with_builtins());
//! let resolver = Arc::new(snapshot.resolver()?);
//! let dispatcher = Dispatcher::with_working_dir(registry, resolver, budget, snapshot.working_dir())
//!     .with_limits(snapshot.limits());
//!
//! let result = dispatcher.dispatch(&call).await;
//! ```

pub mod builtin;
mod context;
pub mod delegate;
mod dispatcher;
mod registry;

pub use context::{resolve_path, RuntimeContext};
pub use delegate::{DelegationReport, Delegator, TaskInput};
pub use dispatcher::Dispatcher;
pub use registry::{ToolEntry, ToolHandler, ToolRegistry};
