//! Shared test helpers for engine tests.

use crate::sink::{OrchestrationEvent, OrchestrationSink};
use actloop_core::error::ProviderError;
use actloop_core::message::{Message, Role};
use actloop_core::provider::{Provider, ProviderRequest, ProviderResponse};
use actloop_core::tool::{ToolCall, ToolExecutor, ToolResult};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub fn call(name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(name, args.as_object().cloned().unwrap_or_default())
}

pub fn reply(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        model: "mock-model".into(),
    }
}

/// A mock provider that returns a sequence of scripted replies.
///
/// Each call to `complete` pops the next entry. Panics if more calls are
/// made than entries provided.
pub struct SequentialMockProvider {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(reply(&text)),
            Some(Err(e)) => Err(e),
            None => panic!(
                "SequentialMockProvider: no more responses (call #{})",
                requests.len()
            ),
        }
    }
}

type ReplyFn = dyn Fn(&ProviderRequest) -> Result<String, ProviderError> + Send + Sync;

/// A provider whose reply is computed from the request.
pub struct FnProvider {
    reply: Box<ReplyFn>,
    calls: Mutex<usize>,
}

impl FnProvider {
    pub fn new(
        reply: impl Fn(&ProviderRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            reply: Box::new(reply),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for FnProvider {
    fn name(&self) -> &str {
        "fn_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        (self.reply)(&request).map(|text| reply(&text))
    }
}

/// The last message content of a request.
pub fn last_content(request: &ProviderRequest) -> &str {
    request
        .messages
        .last()
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

#[derive(Default)]
struct ExecutorLog {
    in_flight: usize,
    max_in_flight: usize,
    started: Vec<String>,
    completed: Vec<String>,
    calls: Vec<ToolCall>,
}

/// A tool executor with per-tool delays and scripted outcomes.
///
/// Unscripted tools succeed with `"<name> ok"`.
#[derive(Default)]
pub struct ScriptedExecutor {
    delays: HashMap<String, Duration>,
    scripted: Mutex<HashMap<String, VecDeque<ToolResult>>>,
    always_fail: HashMap<String, String>,
    log: Mutex<ExecutorLog>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, tool: &str, delay: Duration) -> Self {
        self.delays.insert(tool.into(), delay);
        self
    }

    /// Every call to `tool` fails with `error`.
    pub fn failing(mut self, tool: &str, error: &str) -> Self {
        self.always_fail.insert(tool.into(), error.into());
        self
    }

    /// Calls to `tool` pop these results in order, then fall back to default.
    pub fn with_results(self, tool: &str, results: Vec<ToolResult>) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .insert(tool.into(), results.into());
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.log.lock().unwrap().max_in_flight
    }

    pub fn started(&self) -> Vec<String> {
        self.log.lock().unwrap().started.clone()
    }

    pub fn completion_order(&self) -> Vec<String> {
        self.log.lock().unwrap().completed.clone()
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.log.lock().unwrap().calls.clone()
    }
}

#[async_trait::async_trait]
impl ToolExecutor for ScriptedExecutor {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        {
            let mut log = self.log.lock().unwrap();
            log.in_flight += 1;
            log.max_in_flight = log.max_in_flight.max(log.in_flight);
            log.started.push(call.name.clone());
            log.calls.push(call.clone());
        }

        if let Some(delay) = self.delays.get(&call.name) {
            tokio::time::sleep(*delay).await;
        }

        let result = if let Some(error) = self.always_fail.get(&call.name) {
            ToolResult::failure(error.clone())
        } else {
            self.scripted
                .lock()
                .unwrap()
                .get_mut(&call.name)
                .and_then(|queue| queue.pop_front())
                .unwrap_or_else(|| ToolResult::ok(format!("{} ok", call.name)))
        };

        let mut log = self.log.lock().unwrap();
        log.in_flight -= 1;
        log.completed.push(call.name.clone());
        result
    }
}

/// Records every notification for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<OrchestrationEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<OrchestrationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OrchestrationEvent::ToolExecution { call, .. } => Some(call.name),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self, role: Role) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OrchestrationEvent::Message { role: r, content } if r == role => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OrchestrationEvent::Progress { text } => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl OrchestrationSink for RecordingSink {
    fn on_progress(&self, text: &str) {
        self.events
            .lock()
            .unwrap()
            .push(OrchestrationEvent::Progress { text: text.into() });
    }

    fn on_tool_execution(&self, call: &ToolCall, result: &ToolResult) {
        self.events.lock().unwrap().push(OrchestrationEvent::ToolExecution {
            call: call.clone(),
            result: result.clone(),
        });
    }

    fn on_message(&self, role: Role, content: &str) {
        self.events.lock().unwrap().push(OrchestrationEvent::Message {
            role,
            content: content.into(),
        });
    }
}
