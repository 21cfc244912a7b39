//! Tool Dispatcher - 도구 호출 하나를 끝까지 처리
//!
//! ```text
//! ToolCall ─► lookup ─► resolve ─► (approve) ─► budget ─► execute ─► ToolResult
//!               │          │           │           │          │
//!          UnknownTool   Denied     Denied   BudgetExceeded  Failed / TimedOut
//! ```
//!
//! `dispatch()`는 에러를 반환하지 않습니다. 실행 중 발생한 에러와 panic은
//! 모두 `ToolResult`로 변환되어 모델에게 돌아갑니다. 결과와 상관없이
//! `Started`/`Finished` 이벤트가 한 번씩 발행됩니다.

use super::context::RuntimeContext;
use super::delegate::Delegator;
use super::registry::{ToolEntry, ToolHandler, ToolRegistry};
use crate::mcp::McpToolCall;
use anvil_foundation::{
    AskPolicy, Budget, DispatchEvent, DispatchEventKind, Disposition, Error, EventBus, FailureKind,
    Limits, PermissionDelegate, PermissionResolver, PermissionResponse, Resolution, ToolCall,
    ToolContext, ToolOrigin, ToolResult,
};
use futures::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 실행 단계의 결과 (이벤트 발행 전)
enum Outcome {
    Done(ToolResult),
    Err(Error),
    TimedOut(Duration),
}

/// 도구 dispatcher
///
/// 레지스트리, resolver, Budget, 이벤트 버스를 묶어 호출 하나를 처리합니다.
/// 서브에이전트용 dispatcher는 [`Dispatcher::restricted`]로 만들며
/// resolver, Budget, 승인 협력자를 그대로 공유합니다.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    resolver: Arc<PermissionResolver>,
    budget: Arc<Budget>,
    context: Arc<dyn ToolContext>,
    events: Arc<EventBus>,
    approver: Option<Arc<dyn PermissionDelegate>>,
    delegator: Option<Arc<dyn Delegator>>,
    ask_policy: AskPolicy,
    tool_timeout: Duration,
    approval_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        resolver: Arc<PermissionResolver>,
        budget: Arc<Budget>,
        context: Arc<dyn ToolContext>,
    ) -> Self {
        let limits = Limits::default();
        Self {
            registry,
            resolver,
            budget,
            context,
            events: Arc::new(EventBus::new()),
            approver: None,
            delegator: None,
            ask_policy: AskPolicy::default(),
            tool_timeout: limits.tool_timeout,
            approval_timeout: limits.approval_timeout,
        }
    }

    /// 작업 디렉토리만으로 기본 컨텍스트 구성
    pub fn with_working_dir(
        registry: Arc<ToolRegistry>,
        resolver: Arc<PermissionResolver>,
        budget: Arc<Budget>,
        working_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        let context = RuntimeContext::new(uuid::Uuid::new_v4().to_string(), working_dir);
        Self::new(registry, resolver, budget, Arc::new(context))
    }

    // === Builder methods ===

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// 대화형 승인 협력자
    pub fn with_approver(mut self, approver: Arc<dyn PermissionDelegate>) -> Self {
        self.approver = Some(approver);
        self
    }

    /// `task` 실행기
    pub fn with_delegator(mut self, delegator: Arc<dyn Delegator>) -> Self {
        self.delegator = Some(delegator);
        self
    }

    pub fn with_ask_policy(mut self, policy: AskPolicy) -> Self {
        self.ask_policy = policy;
        self
    }

    /// 로컬 도구 타임아웃과 승인 타임아웃 적용
    pub fn with_limits(mut self, limits: &Limits) -> Self {
        self.tool_timeout = limits.tool_timeout;
        self.approval_timeout = limits.approval_timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    /// 같은 정책을 공유하고 레지스트리만 다른 dispatcher
    pub fn restricted(&self, registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            ..self.clone()
        }
    }

    // === Accessors ===

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<PermissionResolver> {
        &self.resolver
    }

    pub fn budget(&self) -> &Arc<Budget> {
        &self.budget
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn context(&self) -> &Arc<dyn ToolContext> {
        &self.context
    }

    // === Dispatch ===

    /// 취소 신호 없이 dispatch
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        self.dispatch_with_cancel(call, &CancellationToken::new()).await
    }

    /// 호출 하나를 처리
    ///
    /// 취소 신호는 시작 전과 승인 대기 중에만 반영됩니다. 이미 실행 중인
    /// 도구는 끝나거나 타임아웃될 때까지 기다립니다.
    pub async fn dispatch_with_cancel(&self, call: &ToolCall, cancel: &CancellationToken) -> ToolResult {
        let start = Instant::now();
        self.emit(call, DispatchEventKind::Started).await;

        let result = self.run(call, cancel).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        let result = result.with_duration(duration_ms);

        debug!(
            tool = %call.name,
            call_id = %call.id,
            status = %result.status,
            duration_ms,
            "Dispatch finished"
        );
        self.emit(
            call,
            DispatchEventKind::Finished {
                status: result.status.clone(),
                duration_ms,
            },
        )
        .await;

        result
    }

    async fn run(&self, call: &ToolCall, cancel: &CancellationToken) -> ToolResult {
        if cancel.is_cancelled() {
            return ToolResult::failed(call, FailureKind::Cancelled, "session cancelled");
        }

        let entry = match self.registry.lookup(&call.name) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(tool = %call.name, requester = %call.requester, "Unknown tool requested");
                return ToolResult::failed(call, FailureKind::UnknownTool, e.to_string());
            }
        };

        let resolution = self.resolver.resolve(&entry.descriptor, &call.requester);
        match resolution.disposition {
            Disposition::Deny => {
                info!(tool = %call.name, "Denied: {}", resolution.explain());
                return ToolResult::denied(call, format!("denied by {}", resolution.source));
            }
            Disposition::Ask => {
                if let Err(reason) = self.approve(call, &resolution, cancel).await {
                    info!(tool = %call.name, "Denied: {}", reason);
                    return ToolResult::denied(call, reason);
                }
            }
            Disposition::Always => {}
        }

        if let Err(e) = self.budget.check() {
            return ToolResult::failed(call, FailureKind::BudgetExceeded, e.to_string());
        }

        match self.execute(call, &entry, cancel).await {
            Outcome::Done(result) => result,
            Outcome::TimedOut(timeout) => {
                warn!(tool = %call.name, timeout_ms = timeout.as_millis() as u64, "Tool timed out");
                ToolResult::timed_out(call, timeout.as_millis() as u64)
            }
            Outcome::Err(Error::ToolTimeout { timeout_ms, .. }) => {
                warn!(tool = %call.name, timeout_ms, "Tool timed out");
                ToolResult::timed_out(call, timeout_ms)
            }
            Outcome::Err(e) => {
                warn!(tool = %call.name, "Tool failed: {}", e);
                ToolResult::failed(call, e.failure_kind(), e.to_string())
            }
        }
    }

    /// Ask 처리. Err는 거부 사유.
    async fn approve(
        &self,
        call: &ToolCall,
        resolution: &Resolution,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), String> {
        if let Some(approver) = &self.approver {
            self.emit(call, DispatchEventKind::ApprovalRequested).await;

            let request = tokio::time::timeout(
                self.approval_timeout,
                approver.request_permission(&call.name, &call.arguments),
            );
            return tokio::select! {
                response = request => match response {
                    Ok(PermissionResponse::Approve) => Ok(()),
                    Ok(PermissionResponse::Reject) => Err("rejected by user".to_string()),
                    Err(_) => Err(format!(
                        "approval timed out after {}s",
                        self.approval_timeout.as_secs()
                    )),
                },
                _ = cancel.cancelled() => Err("cancelled while awaiting approval".to_string()),
            };
        }

        if resolution.trust_guarded {
            return Err(format!(
                "{} requires approval in an untrusted working directory",
                call.name
            ));
        }

        match self.ask_policy {
            AskPolicy::Approve => {
                info!(
                    tool = %call.name,
                    requester = %call.requester,
                    "Auto-approved by non-interactive policy ({})",
                    resolution.explain()
                );
                self.emit(call, DispatchEventKind::AutoApproved).await;
                Ok(())
            }
            AskPolicy::Deny => Err("approval required but no approver is available".to_string()),
        }
    }

    /// 실행 (panic과 타임아웃 포함)
    async fn execute(&self, call: &ToolCall, entry: &ToolEntry, cancel: &CancellationToken) -> Outcome {
        let guarded = AssertUnwindSafe(self.execute_handler(call, entry, cancel)).catch_unwind();
        match guarded.await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Outcome::Done(ToolResult::failed(
                    call,
                    FailureKind::InternalFault,
                    format!("tool panicked: {}", message),
                ))
            }
        }
    }

    async fn execute_handler(
        &self,
        call: &ToolCall,
        entry: &ToolEntry,
        cancel: &CancellationToken,
    ) -> Outcome {
        match &entry.handler {
            ToolHandler::Local(tool) => {
                let timeout = self.tool_timeout;
                let run = tool.execute(call.arguments.clone(), self.context.as_ref());
                match tokio::time::timeout(timeout, run).await {
                    Err(_) => Outcome::TimedOut(timeout),
                    Ok(Err(e)) => Outcome::Err(e),
                    Ok(Ok(output)) if output.success => {
                        let mut result = ToolResult::success(call, output.output);
                        result.metadata = output.metadata;
                        Outcome::Done(result)
                    }
                    Ok(Ok(output)) => {
                        let error = output
                            .error
                            .unwrap_or_else(|| "tool reported failure".to_string());
                        let mut result = ToolResult::failed(call, FailureKind::ExecutionError, error);
                        result.metadata = output.metadata;
                        Outcome::Done(result)
                    }
                }
            }
            ToolHandler::Remote(client) => {
                let remote_name = match &entry.descriptor.origin {
                    ToolOrigin::Remote { remote_name, .. } => remote_name.clone(),
                    ToolOrigin::Local => call.name.clone(),
                };
                let request = McpToolCall::new(remote_name, call.arguments.clone());
                match client.call_tool(&request, Some(client.tool_timeout())).await {
                    Ok(output) if output.is_error => Outcome::Done(ToolResult::failed(
                        call,
                        FailureKind::ExecutionError,
                        output.render(),
                    )),
                    Ok(output) => Outcome::Done(
                        ToolResult::success(call, output.render())
                            .with_metadata("server", json!(client.name())),
                    ),
                    Err(e) => Outcome::Err(e),
                }
            }
            ToolHandler::Delegate => {
                let Some(delegator) = &self.delegator else {
                    return Outcome::Done(ToolResult::failed(
                        call,
                        FailureKind::InternalFault,
                        "delegation is not configured for this session",
                    ));
                };
                match delegator.delegate(call, cancel).await {
                    Ok(report) => Outcome::Done(
                        ToolResult::success(call, report.text)
                            .with_metadata("profile", json!(report.profile))
                            .with_metadata("turns", json!(report.turns))
                            .with_metadata("cost", json!(report.cost)),
                    ),
                    Err(e) => Outcome::Err(e),
                }
            }
        }
    }

    async fn emit(&self, call: &ToolCall, kind: DispatchEventKind) {
        self.events
            .publish(DispatchEvent::new(
                call.id.clone(),
                call.name.clone(),
                call.requester.clone(),
                kind,
            ))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::delegate::DelegationReport;
    use anvil_foundation::{
        BudgetLimits, Capabilities, Requester, RuleConfig, Tool, ToolExecutionResult, ToolMeta,
        ToolStatus,
    };
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 호출 횟수를 세는 도구
    struct CountingTool {
        name: &'static str,
        capabilities: Capabilities,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl CountingTool {
        fn new(name: &'static str, capabilities: Capabilities) -> Self {
            Self {
                name,
                capabilities,
                calls: Arc::new(AtomicUsize::new(0)),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn meta(&self) -> ToolMeta {
            ToolMeta::new(self.name).capabilities(self.capabilities)
        }

        fn name(&self) -> &str {
            self.name
        }

        fn schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn execute(&self, _input: Value, _ctx: &dyn ToolContext) -> anvil_foundation::Result<ToolExecutionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(ToolExecutionResult::success("ok"))
        }
    }

    struct PanicTool;

    #[async_trait]
    impl Tool for PanicTool {
        fn meta(&self) -> ToolMeta {
            ToolMeta::new("boom").capabilities(Capabilities::read_only())
        }

        fn name(&self) -> &str {
            "boom"
        }

        fn schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn execute(&self, _input: Value, _ctx: &dyn ToolContext) -> anvil_foundation::Result<ToolExecutionResult> {
            panic!("tool exploded");
        }
    }

    struct FixedApprover(PermissionResponse);

    #[async_trait]
    impl PermissionDelegate for FixedApprover {
        async fn request_permission(&self, _tool: &str, _args: &Value) -> PermissionResponse {
            self.0
        }
    }

    struct EchoDelegator;

    #[async_trait]
    impl Delegator for EchoDelegator {
        async fn delegate(
            &self,
            call: &ToolCall,
            _cancel: &CancellationToken,
        ) -> anvil_foundation::Result<DelegationReport> {
            Ok(DelegationReport {
                text: format!("done: {}", call.arguments["prompt"].as_str().unwrap_or("")),
                turns: 2,
                cost: 0.5,
                profile: "explore".to_string(),
            })
        }
    }

    /// 취소될 때까지 대기하는 위임
    struct WaitingDelegator;

    #[async_trait]
    impl Delegator for WaitingDelegator {
        async fn delegate(
            &self,
            _call: &ToolCall,
            cancel: &CancellationToken,
        ) -> anvil_foundation::Result<DelegationReport> {
            tokio::select! {
                _ = cancel.cancelled() => Err(anvil_foundation::Error::Cancelled),
                _ = tokio::time::sleep(Duration::from_secs(5)) => Err(anvil_foundation::Error::delegation(
                    FailureKind::InternalFault,
                    "never cancelled",
                )),
            }
        }
    }

    fn dispatcher(tools: Vec<Arc<dyn Tool>>, rules: Vec<RuleConfig>, trusted: bool) -> Dispatcher {
        let registry = ToolRegistry::new();
        for tool in tools {
            registry.register_local(tool).unwrap();
        }
        let resolver = PermissionResolver::from_configs(&rules, &[], trusted).unwrap();
        Dispatcher::with_working_dir(
            Arc::new(registry),
            Arc::new(resolver),
            Arc::new(Budget::unlimited()),
            std::env::temp_dir(),
        )
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let d = dispatcher(vec![], vec![], true);
        let result = d.dispatch(&ToolCall::new("1", "missing", json!({}))).await;
        assert_eq!(result.failure_kind(), Some(&FailureKind::UnknownTool));
    }

    #[tokio::test]
    async fn test_deny_never_invokes() {
        let tool = CountingTool::new("probe", Capabilities::read_only());
        let calls = tool.calls.clone();
        let d = dispatcher(vec![Arc::new(tool)], vec![RuleConfig::deny("probe")], true);

        let result = d.dispatch(&ToolCall::new("1", "probe", json!({}))).await;
        assert_eq!(result.status, ToolStatus::Denied);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_always_runs() {
        let tool = CountingTool::new("probe", Capabilities::read_only());
        let calls = tool.calls.clone();
        let d = dispatcher(vec![Arc::new(tool)], vec![RuleConfig::always("probe")], true);

        let result = d.dispatch(&ToolCall::new("1", "probe", json!({}))).await;
        assert!(result.is_success());
        assert_eq!(result.payload.as_deref(), Some("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ask_uses_approver() {
        let tool = CountingTool::new("probe", Capabilities::read_only());
        let calls = tool.calls.clone();
        let d = dispatcher(vec![Arc::new(tool)], vec![], true)
            .with_approver(Arc::new(FixedApprover(PermissionResponse::Reject)));

        let result = d.dispatch(&ToolCall::new("1", "probe", json!({}))).await;
        assert_eq!(result.status, ToolStatus::Denied);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let events = d.events().events_for_call("1").await;
        assert!(events
            .iter()
            .any(|e| e.kind == DispatchEventKind::ApprovalRequested));
    }

    #[tokio::test]
    async fn test_ask_auto_approved_is_recorded() {
        let tool = CountingTool::new("probe", Capabilities::read_only());
        let d = dispatcher(vec![Arc::new(tool)], vec![], true);

        let result = d.dispatch(&ToolCall::new("1", "probe", json!({}))).await;
        assert!(result.is_success());
        let events = d.events().events_for_call("1").await;
        assert!(events.iter().any(|e| e.kind == DispatchEventKind::AutoApproved));
    }

    #[tokio::test]
    async fn test_ask_policy_deny() {
        let tool = CountingTool::new("probe", Capabilities::read_only());
        let d = dispatcher(vec![Arc::new(tool)], vec![], true).with_ask_policy(AskPolicy::Deny);

        let result = d.dispatch(&ToolCall::new("1", "probe", json!({}))).await;
        assert_eq!(result.status, ToolStatus::Denied);
    }

    #[tokio::test]
    async fn test_untrusted_guarded_tool_not_auto_approved() {
        let tool = CountingTool::new("bash_run", Capabilities::process_exec());
        let calls = tool.calls.clone();
        let d = dispatcher(vec![Arc::new(tool)], vec![RuleConfig::always("bash*")], false);

        let result = d.dispatch(&ToolCall::new("1", "bash_run", json!({}))).await;
        assert_eq!(result.status, ToolStatus::Denied);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let tool = CountingTool::new("probe", Capabilities::read_only());
        let calls = tool.calls.clone();
        let registry = ToolRegistry::new();
        registry.register_local(Arc::new(tool)).unwrap();
        let budget = Arc::new(Budget::new(BudgetLimits::unlimited().max_turns(1)));
        budget.try_begin_turn().unwrap();
        assert!(budget.try_begin_turn().is_err());

        let resolver = PermissionResolver::from_configs(&[RuleConfig::always("probe")], &[], true).unwrap();
        let d = Dispatcher::with_working_dir(Arc::new(registry), Arc::new(resolver), budget, std::env::temp_dir());

        let result = d.dispatch(&ToolCall::new("1", "probe", json!({}))).await;
        assert_eq!(result.failure_kind(), Some(&FailureKind::BudgetExceeded));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut tool = CountingTool::new("slow", Capabilities::read_only());
        tool.delay = Duration::from_secs(5);
        let d = dispatcher(vec![Arc::new(tool)], vec![RuleConfig::always("slow")], true)
            .with_tool_timeout(Duration::from_millis(50));

        let result = d.dispatch(&ToolCall::new("1", "slow", json!({}))).await;
        assert_eq!(result.status, ToolStatus::TimedOut);
        assert!(result.payload.is_none());
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_fault() {
        let d = dispatcher(vec![Arc::new(PanicTool)], vec![RuleConfig::always("boom")], true);
        let result = d.dispatch(&ToolCall::new("1", "boom", json!({}))).await;
        assert_eq!(result.failure_kind(), Some(&FailureKind::InternalFault));
        assert!(result.error.unwrap().contains("tool exploded"));
    }

    #[tokio::test]
    async fn test_events_for_every_outcome() {
        let d = dispatcher(vec![], vec![], true);
        d.dispatch(&ToolCall::new("a", "missing", json!({}))).await;

        let events = d.events().events_for_call("a").await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, DispatchEventKind::Started);
        assert!(matches!(
            &events[1].kind,
            DispatchEventKind::Finished { status: ToolStatus::Failed { .. }, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let tool = CountingTool::new("probe", Capabilities::read_only());
        let calls = tool.calls.clone();
        let d = dispatcher(vec![Arc::new(tool)], vec![RuleConfig::always("probe")], true);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = d
            .dispatch_with_cancel(&ToolCall::new("1", "probe", json!({})), &cancel)
            .await;
        assert_eq!(result.failure_kind(), Some(&FailureKind::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delegate_without_delegator() {
        let registry = ToolRegistry::new();
        registry.register(ToolEntry::delegate()).unwrap();
        let resolver = PermissionResolver::from_configs(&[RuleConfig::always("task")], &[], true).unwrap();
        let d = Dispatcher::with_working_dir(
            Arc::new(registry),
            Arc::new(resolver),
            Arc::new(Budget::unlimited()),
            std::env::temp_dir(),
        );

        let call = ToolCall::new("1", "task", json!({ "description": "d", "prompt": "p" }));
        let result = d.dispatch(&call).await;
        assert_eq!(result.failure_kind(), Some(&FailureKind::InternalFault));

        let d = d.with_delegator(Arc::new(EchoDelegator));
        let result = d.dispatch(&call).await;
        assert!(result.is_success());
        assert_eq!(result.payload.as_deref(), Some("done: p"));
        assert_eq!(result.metadata["turns"], json!(2));
    }

    #[tokio::test]
    async fn test_delegation_receives_dispatch_token() {
        let registry = ToolRegistry::new();
        registry.register(ToolEntry::delegate()).unwrap();
        let resolver = PermissionResolver::from_configs(&[RuleConfig::always("task")], &[], true).unwrap();
        let d = Dispatcher::with_working_dir(
            Arc::new(registry),
            Arc::new(resolver),
            Arc::new(Budget::unlimited()),
            std::env::temp_dir(),
        )
        .with_delegator(Arc::new(WaitingDelegator));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let call = ToolCall::new("1", "task", json!({ "prompt": "p" }));
        let result = d.dispatch_with_cancel(&call, &cancel).await;
        assert_eq!(result.failure_kind(), Some(&FailureKind::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_restricted_shares_budget() {
        let d = dispatcher(vec![], vec![], true);
        let child = d.restricted(Arc::new(ToolRegistry::new()));
        assert!(Arc::ptr_eq(d.budget(), child.budget()));
        assert!(Arc::ptr_eq(d.events(), child.events()));

        let call = ToolCall::new("1", "read", json!({})).with_requester(Requester::Subagent {
            task_id: "t".to_string(),
            depth: 1,
        });
        let result = child.dispatch(&call).await;
        assert_eq!(result.failure_kind(), Some(&FailureKind::UnknownTool));
    }
}
