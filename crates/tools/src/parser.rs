//! Default tool-call parser.
//!
//! Models rarely emit perfectly framed calls, so three framings are
//! accepted, scanned in textual order:
//!
//! 1. `<tool_call>{...}</tool_call>` tags
//! 2. fenced ```` ```json ```` or ```` ```tool ```` blocks
//! 3. bare JSON objects or arrays anywhere in the text
//!
//! An object counts as a call when it carries a string `name` (or `tool`).
//! Arguments come from `arguments`, `parameters`, or `args`, either as an
//! object or as a string holding a JSON object. Anything else is skipped.
//!
//! Fenced and bare objects are ordinary JSON as often as they are calls
//! (a `package.json` shown in a final answer has a `name` too), so outside
//! `<tool_call>` tags an object must also name a known tool or carry an
//! arguments key.

use actloop_core::tool::{Arguments, ToolCall, ToolCallParser};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::ops::Range;
use tracing::debug;

const OPEN_TAG: &str = "<tool_call>";
const CLOSE_TAG: &str = "</tool_call>";
const FENCE: &str = "```";

const NAME_KEYS: [&str; 2] = ["name", "tool"];
const ARGUMENT_KEYS: [&str; 3] = ["arguments", "parameters", "args"];

/// How a region was framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Tagged,
    Loose,
}

#[derive(Debug, Default, Clone)]
pub struct JsonToolCallParser {
    known: HashSet<String>,
}

impl JsonToolCallParser {
    /// A parser that accepts loose objects naming any of `tools`.
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: tools.into_iter().map(Into::into).collect(),
        }
    }

    fn accepts(&self, framing: Framing, object: &Map<String, Value>, name: &str) -> bool {
        framing == Framing::Tagged
            || self.known.contains(name)
            || ARGUMENT_KEYS.iter().any(|key| object.contains_key(*key))
    }

    fn calls_from_str(&self, framing: Framing, body: &str) -> Vec<ToolCall> {
        match serde_json::from_str::<Value>(body.trim()) {
            Ok(value) => self.calls_from_value(framing, value),
            Err(e) => {
                debug!(error = %e, "Skipping malformed tool call block");
                Vec::new()
            }
        }
    }

    fn calls_from_value(&self, framing: Framing, value: Value) -> Vec<ToolCall> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| self.call_from_object(framing, item))
                .collect(),
            other => self.call_from_object(framing, other).into_iter().collect(),
        }
    }

    fn call_from_object(&self, framing: Framing, value: Value) -> Option<ToolCall> {
        let Value::Object(mut object) = value else {
            return None;
        };

        let name = NAME_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))?
            .trim()
            .to_string();
        if name.is_empty() {
            return None;
        }
        if !self.accepts(framing, &object, &name) {
            debug!(name = %name, "Skipping JSON object that is not a tool call");
            return None;
        }

        let arguments = ARGUMENT_KEYS
            .iter()
            .find_map(|key| object.remove(*key))
            .map(into_arguments)
            .unwrap_or_default();

        Some(ToolCall::new(name, arguments))
    }
}

impl ToolCallParser for JsonToolCallParser {
    fn parse(&self, text: &str) -> Vec<ToolCall> {
        let mut found: Vec<(usize, Vec<ToolCall>)> = Vec::new();
        let mut claimed: Vec<Range<usize>> = Vec::new();

        for (range, body) in tagged_regions(text) {
            found.push((range.start, self.calls_from_str(Framing::Tagged, body)));
            claimed.push(range);
        }

        for (range, body) in fenced_regions(text) {
            if overlaps(&claimed, &range) {
                continue;
            }
            found.push((range.start, self.calls_from_str(Framing::Loose, body)));
            claimed.push(range);
        }

        let mut i = 0;
        while i < text.len() {
            if let Some(end) = claimed.iter().find(|r| r.contains(&i)).map(|r| r.end) {
                i = end;
                continue;
            }
            let byte = text.as_bytes()[i];
            if byte == b'{' || byte == b'[' {
                let mut stream = serde_json::Deserializer::from_str(&text[i..]).into_iter::<Value>();
                if let Some(Ok(value)) = stream.next() {
                    let consumed = stream.byte_offset();
                    found.push((i, self.calls_from_value(Framing::Loose, value)));
                    i += consumed.max(1);
                    continue;
                }
            }
            i += 1;
        }

        found.sort_by_key(|(start, _)| *start);
        let calls: Vec<ToolCall> = found.into_iter().flat_map(|(_, calls)| calls).collect();
        debug!(count = calls.len(), "Parsed tool calls");
        calls
    }
}

/// `<tool_call>` regions: (whole range including tags, inner body).
fn tagged_regions(text: &str) -> Vec<(Range<usize>, &str)> {
    let mut regions = Vec::new();
    let mut cursor = 0;
    while let Some(open) = text[cursor..].find(OPEN_TAG) {
        let start = cursor + open;
        let body_start = start + OPEN_TAG.len();
        let Some(close) = text[body_start..].find(CLOSE_TAG) else {
            break;
        };
        let body_end = body_start + close;
        let end = body_end + CLOSE_TAG.len();
        regions.push((start..end, &text[body_start..body_end]));
        cursor = end;
    }
    regions
}

/// Fenced blocks tagged `json` or `tool`.
fn fenced_regions(text: &str) -> Vec<(Range<usize>, &str)> {
    let mut regions = Vec::new();
    let mut cursor = 0;
    while let Some(open) = text[cursor..].find(FENCE) {
        let start = cursor + open;
        let info_start = start + FENCE.len();
        let Some(newline) = text[info_start..].find('\n') else {
            break;
        };
        let info = text[info_start..info_start + newline].trim();
        let body_start = info_start + newline + 1;
        let Some(close) = text[body_start..].find(FENCE) else {
            break;
        };
        let body_end = body_start + close;
        let end = body_end + FENCE.len();
        if info.eq_ignore_ascii_case("json") || info.eq_ignore_ascii_case("tool") {
            regions.push((start..end, &text[body_start..body_end]));
        }
        cursor = end;
    }
    regions
}

fn overlaps(claimed: &[Range<usize>], range: &Range<usize>) -> bool {
    claimed
        .iter()
        .any(|r| r.start < range.end && range.start < r.end)
}

fn into_arguments(value: Value) -> Arguments {
    match value {
        Value::Object(map) => map,
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            _ => Arguments::new(),
        },
        _ => Arguments::new(),
    }
}
