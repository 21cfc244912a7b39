//! Message history management

use anvil_foundation::{Message, MessageRole, ToolCall, ToolResult};

/// Message history for one engine run
#[derive(Debug, Clone, Default)]
pub struct MessageHistory {
    /// Messages in order
    messages: Vec<Message>,

    /// System prompt
    system_prompt: Option<String>,
}

impl MessageHistory {
    /// Create a new empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a system prompt
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![],
            system_prompt: Some(prompt.into()),
        }
    }

    /// Set system prompt
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(prompt.into());
    }

    /// Get system prompt
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Add a user message
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Add an assistant message
    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Add an assistant message with tool calls
    pub fn add_assistant_with_tools(&mut self, content: impl Into<String>, tool_calls: Vec<ToolCall>) {
        self.messages
            .push(Message::assistant_with_tools(content, tool_calls));
    }

    /// Add a tool result
    pub fn add_tool_result(&mut self, result: &ToolResult) {
        self.messages.push(Message::tool_result(result));
    }

    /// Add a message directly
    pub fn add(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get messages as owned vec
    pub fn to_messages(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Get message count
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Get the last assistant message
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
    }

    /// Tool result messages in the order they were appended
    pub fn tool_results(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.tool_result.is_some())
    }

    /// Estimate token count (rough approximation)
    pub fn estimate_tokens(&self) -> usize {
        let mut tokens = 0;

        if let Some(ref prompt) = self.system_prompt {
            tokens += prompt.len() / 4;
        }

        for msg in &self.messages {
            tokens += msg.content.len() / 4;

            if let Some(ref tool_calls) = msg.tool_calls {
                for tc in tool_calls {
                    tokens += tc.name.len() / 4;
                    tokens += tc.arguments.to_string().len() / 4;
                }
            }

            if let Some(ref result) = msg.tool_result {
                tokens += result.content.len() / 4;
            }
        }

        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_foundation::FailureKind;
    use serde_json::json;

    #[test]
    fn test_tool_results_keep_append_order() {
        let mut history = MessageHistory::with_system_prompt("be brief");
        let a = ToolCall::new("a", "read", json!({}));
        let b = ToolCall::new("b", "glob", json!({}));

        history.add_user("look around");
        history.add_assistant_with_tools("", vec![a.clone(), b.clone()]);
        history.add_tool_result(&ToolResult::success(&a, "file body"));
        history.add_tool_result(&ToolResult::failed(&b, FailureKind::UnknownTool, "no such tool"));

        let ids: Vec<_> = history
            .tool_results()
            .filter_map(|m| m.tool_result.as_ref())
            .map(|r| (r.tool_call_id.clone(), r.is_error))
            .collect();
        assert_eq!(ids, vec![("a".to_string(), false), ("b".to_string(), true)]);
        assert_eq!(history.len(), 4);
        assert!(history.last_assistant().is_some());
    }

    #[test]
    fn test_estimate_tokens() {
        let mut history = MessageHistory::new();
        assert_eq!(history.estimate_tokens(), 0);
        history.add_user("x".repeat(400));
        assert_eq!(history.estimate_tokens(), 100);
    }
}
