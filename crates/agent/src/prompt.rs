//! System prompt construction.

use actloop_core::tool::ToolDefinition;

const PREAMBLE: &str = "You are actloop, an autonomous coding agent working inside a project workspace. \
You act by calling tools, observe their results, and keep going until the task is done.";

const CALL_FORMAT: &str = r#"## Calling tools

Emit each call on its own, wrapped in tags:

<tool_call>{"name": "read_file", "arguments": {"file_path": "package.json"}}</tool_call>

You may emit several calls in one reply. Read-only calls run together; the rest run in the order written.

## Planning

For multi-step work you may instead write a numbered plan:

PLAN:
1. <description> - <tool>(<arguments>)
2. <description> - <tool>

Steps run one per turn, in order, and are retried on failure.
When the task is finished, say so plainly without calling tools."#;

/// Build the system prompt for a tool catalog.
///
/// `identity` replaces the preamble when set.
pub fn system_prompt(definitions: &[ToolDefinition], identity: Option<&str>) -> String {
    let mut prompt = identity.unwrap_or(PREAMBLE).trim().to_string();
    prompt.push_str("\n\n## Tools\n");
    for def in definitions {
        prompt.push_str(&format!("\n### {}\n{}\n", def.name, def.description));
        if let Some(props) = def.parameters.get("properties").and_then(|p| p.as_object()) {
            let required: Vec<&str> = def
                .parameters
                .get("required")
                .and_then(|r| r.as_array())
                .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            for (name, schema) in props {
                let kind = schema.get("type").and_then(|t| t.as_str()).unwrap_or("any");
                let flag = if required.contains(&name.as_str()) { "" } else { ", optional" };
                let about = schema
                    .get("description")
                    .and_then(|d| d.as_str())
                    .map(|d| format!(": {d}"))
                    .unwrap_or_default();
                prompt.push_str(&format!("- `{name}` ({kind}{flag}){about}\n"));
            }
        }
    }
    prompt.push('\n');
    prompt.push_str(CALL_FORMAT);
    prompt
}
