//! Conversation state threaded across turns and runs.

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use lite_agent_model::{Message, Role, ToolCall, Usage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The mutable state of a conversation.
///
/// A context owns the ordered message log, the running token usage and an
/// open key/value map for caller-defined data. Messages are only ever
/// appended while a run is in progress. Cloning a context produces a fully
/// independent copy.
///
/// A context is not synchronized. Runs sharing one context must be
/// serialized by the caller, which `&mut` access enforces anyway.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Context {
    id: Uuid,
    created_at: DateTime<Utc>,
    last_agent: Option<String>,
    turn_count: u64,
    messages: Vec<Message>,
    usage: Usage,
    data: Map<String, Value>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates an empty context with a fresh identity.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            last_agent: None,
            turn_count: 0,
            messages: vec![],
            usage: Usage::default(),
            data: Map::new(),
        }
    }

    /// Returns the unique identifier of this context.
    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the time this context was created.
    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the name of the agent that last ran on this context.
    #[inline]
    pub fn last_agent(&self) -> Option<&str> {
        self.last_agent.as_deref()
    }

    /// Returns how many runs have completed on this context.
    #[inline]
    pub fn turn_count(&self) -> u64 {
        self.turn_count
    }

    /// Returns the accumulated token usage.
    #[inline]
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Returns the message log.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns a copy of the message log, ready to be sent to a model.
    pub fn messages_for_api(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Appends a message with the given role and content.
    pub fn add_message<S: Into<String>>(&mut self, role: Role, content: S) {
        self.messages.push(Message::new(role, Some(content)));
    }

    /// Appends a prepared message, e.g. one carrying extra fields.
    #[inline]
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Records a tool invocation and its result.
    ///
    /// Exactly two messages are appended: an assistant message carrying the
    /// call, followed by a tool message carrying `result`. Both share a
    /// freshly synthesized call id.
    pub fn add_tool_call<S: Into<String>>(
        &mut self,
        tool_name: &str,
        arguments: &Value,
        result: S,
    ) {
        let call_id = format!("call_{}", self.messages.len());
        let arguments = arguments.to_string();
        let call = ToolCall::function(call_id.as_str(), tool_name, arguments);
        self.messages.push(Message::tool_calls(vec![call]));
        self.messages.push(Message::tool_result(call_id, result));
    }

    /// Merges the usage of one model call into the running total.
    #[inline]
    pub fn add_usage(&mut self, usage: Usage) {
        self.usage += usage;
    }

    /// Sets a caller-defined value.
    #[inline]
    pub fn set_data<K: Into<String>, V: Into<Value>>(
        &mut self,
        key: K,
        value: V,
    ) {
        self.data.insert(key.into(), value.into());
    }

    /// Returns a caller-defined value.
    #[inline]
    pub fn get_data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns the caller-defined data for in-place editing.
    #[inline]
    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data
    }

    /// Drops every message. Identity, usage and data are kept.
    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    pub(crate) fn record_turn(&mut self, agent_name: &str) {
        self.last_agent = Some(agent_name.to_owned());
        self.turn_count += 1;
    }

    /// Returns a snapshot describing this context.
    pub fn summary(&self) -> ContextSummary {
        ContextSummary {
            id: self.id,
            created_at: self.created_at,
            last_agent: self.last_agent.clone(),
            turn_count: self.turn_count,
            message_count: self.messages.len(),
            total_tokens: self.usage.total_tokens,
        }
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Context({}, {} messages, {} tokens)",
            self.id,
            self.messages.len(),
            self.usage.total_tokens
        )
    }
}

/// A serializable overview of a [`Context`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSummary {
    /// See [`Context::id`].
    pub id: Uuid,
    /// See [`Context::created_at`].
    pub created_at: DateTime<Utc>,
    /// See [`Context::last_agent`].
    pub last_agent: Option<String>,
    /// See [`Context::turn_count`].
    pub turn_count: u64,
    /// Number of messages in the log.
    pub message_count: usize,
    /// Total tokens consumed so far.
    pub total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_fresh_context() {
        let ctx = Context::new();
        assert!(ctx.messages().is_empty());
        assert!(ctx.usage().is_zero());
        assert_eq!(ctx.turn_count(), 0);
        assert_ne!(ctx.id(), Context::new().id());
    }

    #[test]
    fn test_add_tool_call() {
        let mut ctx = Context::new();
        ctx.add_message(Role::User, "What is 2+2?");
        ctx.add_tool_call("calculate", &json!({ "expression": "2+2" }), "4");

        let messages = ctx.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, None);
        let call = messages[1].tool_calls[0].clone();
        assert_eq!(call.function.name, "calculate");
        assert_eq!(call.function.arguments, r#"{"expression":"2+2"}"#);
        assert_eq!(messages[2].role, Role::Tool);
        assert_eq!(messages[2].content.as_deref(), Some("4"));
        assert_eq!(messages[2].tool_call_id, Some(call.id.clone()));

        ctx.add_tool_call("calculate", &json!({ "expression": "3+3" }), "6");
        assert_ne!(ctx.messages()[3].tool_calls[0].id, call.id);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut ctx = Context::new();
        ctx.add_message(Role::User, "Hi");
        ctx.set_data("prefs", json!({ "tags": ["a"] }));

        let mut cloned = ctx.clone();
        cloned.data_mut()["prefs"]["tags"]
            .as_array_mut()
            .unwrap()
            .push(json!("b"));
        cloned.add_message(Role::Assistant, "Hello");

        assert_eq!(ctx.get_data("prefs"), Some(&json!({ "tags": ["a"] })));
        assert_eq!(ctx.messages().len(), 1);
        assert_eq!(cloned.messages().len(), 2);
    }

    #[test]
    fn test_messages_for_api_is_a_copy() {
        let mut ctx = Context::new();
        ctx.add_message(Role::User, "Hi");

        let mut messages = ctx.messages_for_api();
        messages.push(Message::assistant("injected"));
        messages[0].content = Some("changed".to_owned());

        assert_eq!(ctx.messages().len(), 1);
        assert_eq!(ctx.messages()[0].content.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_clear_messages_keeps_identity() {
        let mut ctx = Context::new();
        ctx.add_message(Role::User, "Hi");
        ctx.add_usage(Usage::new(1, 2, 3));
        ctx.set_data("user", "alice");
        ctx.record_turn("assistant");
        let id = ctx.id();

        ctx.clear_messages();
        assert!(ctx.messages().is_empty());
        assert_eq!(ctx.id(), id);
        assert_eq!(ctx.usage(), Usage::new(1, 2, 3));
        assert_eq!(ctx.get_data("user"), Some(&json!("alice")));
        assert_eq!(ctx.last_agent(), Some("assistant"));
        assert_eq!(ctx.turn_count(), 1);
    }

    #[test]
    fn test_usage_accumulates() {
        let mut ctx = Context::new();
        ctx.add_usage(Usage::new(10, 5, 15));
        ctx.add_usage(Usage::new(1, 1, 2));
        assert_eq!(ctx.usage(), Usage::new(11, 6, 17));
    }

    #[test]
    fn test_serde_and_summary() {
        let mut ctx = Context::new();
        ctx.add_message(Role::System, "Be brief.");
        ctx.add_message(Role::User, "Hi");
        ctx.add_usage(Usage::new(4, 2, 6));
        ctx.record_turn("helper");

        let json = serde_json::to_string(&ctx).unwrap();
        let restored: Context = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, ctx);

        let summary = ctx.summary();
        assert_eq!(summary.message_count, 2);
        assert_eq!(summary.total_tokens, 6);
        assert_eq!(summary.last_agent.as_deref(), Some("helper"));
        assert_eq!(summary.turn_count, 1);
    }
}
