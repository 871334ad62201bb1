//! Notification sinks for orchestration progress.
//!
//! The engine reports through three fire-and-forget callbacks and never
//! waits on them:
//! - `on_progress`       — short status text ("Iteration 3/20")
//! - `on_tool_execution` — a tool call and its result
//! - `on_message`        — a chat message for the transcript view
//!
//! [`OrchestrationEvent`] is the serializable form of the same stream, so a
//! caller can forward everything over an unbounded channel.

use actloop_core::message::Role;
use actloop_core::tool::{ToolCall, ToolResult};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Receives orchestration notifications. All methods default to no-ops.
pub trait OrchestrationSink: Send + Sync {
    fn on_progress(&self, _text: &str) {}

    fn on_tool_execution(&self, _call: &ToolCall, _result: &ToolResult) {}

    fn on_message(&self, _role: Role, _content: &str) {}
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OrchestrationSink for NullSink {}

/// Events emitted by the engine during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    /// Status text.
    Progress { text: String },

    /// A tool call completed.
    ToolExecution { call: ToolCall, result: ToolResult },

    /// A chat message (assistant reply, system diagnostic, reflection).
    Message { role: Role, content: String },
}

impl OrchestrationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::ToolExecution { .. } => "tool_execution",
            Self::Message { .. } => "message",
        }
    }
}

/// Forwards events over an unbounded channel. A closed receiver is ignored.
impl OrchestrationSink for UnboundedSender<OrchestrationEvent> {
    fn on_progress(&self, text: &str) {
        let _ = self.send(OrchestrationEvent::Progress { text: text.into() });
    }

    fn on_tool_execution(&self, call: &ToolCall, result: &ToolResult) {
        let _ = self.send(OrchestrationEvent::ToolExecution {
            call: call.clone(),
            result: result.clone(),
        });
    }

    fn on_message(&self, role: Role, content: &str) {
        let _ = self.send(OrchestrationEvent::Message {
            role,
            content: content.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_progress() {
        let event = OrchestrationEvent::Progress {
            text: "Iteration 1/20".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"progress""#));
        assert_eq!(event.event_type(), "progress");
    }

    #[test]
    fn event_serialization_message() {
        let event = OrchestrationEvent::Message {
            role: Role::System,
            content: "boom".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"message""#));
        assert!(json.contains(r#""role":"system""#));
    }

    #[test]
    fn event_serialization_tool_execution() {
        let event = OrchestrationEvent::ToolExecution {
            call: ToolCall::new("read_file", Default::default()),
            result: ToolResult::ok("data"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_execution""#));
        assert!(json.contains(r#""name":"read_file""#));
        let back: OrchestrationEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn channel_sink_forwards_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.on_progress("start");
        tx.on_message(Role::Assistant, "hi");
        assert_eq!(rx.try_recv().unwrap().event_type(), "progress");
        assert_eq!(rx.try_recv().unwrap().event_type(), "message");
    }

    #[test]
    fn channel_sink_ignores_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        tx.on_progress("nobody listening");
    }
}
