//! Shared fixtures: a scripted model provider and a slow read-only tool.

#![allow(dead_code)]

use anvil_core::{Dispatcher, ToolRegistry};
use anvil_foundation::{
    Budget, BudgetLimits, Capabilities, ChatRequest, ChatResponse, Error, PermissionResolver,
    Provider, Result, Tool, ToolCall, ToolContext, ToolExecutionResult, ToolMeta,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Scripted provider
// ============================================================================

/// Replies from a fixed script, then repeats `fallback` forever.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ChatResponse>>>,
    fallback: ChatResponse,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<ChatResponse>) -> Arc<Self> {
        Self::with_fallback(script, ChatResponse::text("done"))
    }

    pub fn with_fallback(script: Vec<ChatResponse>, fallback: ChatResponse) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().map(Ok).collect()),
            fallback,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::from([Err(Error::Provider(message.to_string()))])),
            fallback: ChatResponse::text("unreachable"),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().push(request);
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall::new(id, name, arguments)
}

pub fn sleep_call(id: &str, ms: u64) -> ToolCall {
    call(id, SleepTool::NAME, json!({ "ms": ms, "label": id }))
}

// ============================================================================
// Sleep tool
// ============================================================================

/// Read-only tool that sleeps for `ms` and echoes `label`.
#[derive(Default)]
pub struct SleepTool {
    pub finished: Arc<AtomicUsize>,
}

impl SleepTool {
    pub const NAME: &'static str = "sleep";

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for SleepTool {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Sleep, then echo a label")
            .capabilities(Capabilities::read_only())
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn schema(&self) -> Value {
        json!({ "type": "object" })
    }

    async fn execute(&self, input: Value, _context: &dyn ToolContext) -> Result<ToolExecutionResult> {
        let ms = input["ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(ToolExecutionResult::success(
            input["label"].as_str().unwrap_or_default(),
        ))
    }
}

// ============================================================================
// Dispatcher harness
// ============================================================================

/// Dispatcher in a trusted directory with builtins plus the given sleep tool.
pub fn dispatcher(dir: &Path, sleep: Arc<SleepTool>, limits: BudgetLimits) -> Dispatcher {
    let registry = ToolRegistry::with_builtins();
    registry.register_local(sleep).unwrap();
    let resolver = PermissionResolver::from_configs(&[], &[], true).unwrap();
    Dispatcher::with_working_dir(
        Arc::new(registry),
        Arc::new(resolver),
        Arc::new(Budget::new(limits)),
        dir,
    )
}
