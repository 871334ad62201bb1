//! Argument extraction and repair.
//!
//! Models routinely omit arguments or leave template tokens in them. Given a
//! tool name, an optional raw argument string, and the natural-language
//! description of what the call is for, [`extract`] produces a concrete
//! argument map, and [`repair`] fills the gaps of an existing call.
//!
//! Every heuristic is a small pattern matcher tried in order; the first
//! match wins and a miss falls through to a default. Nothing here fails.

use actloop_core::tool::{Arguments, ToolCall};
use regex_lite::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

/// Default file used when a write has no recognizable target.
pub const PLACEHOLDER_FILE: &str = "untitled.txt";

/// Default project name for generator commands.
const DEFAULT_PROJECT: &str = "my-app";

static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"`]([^'"`]+)['"`]"#).expect("quoted token regex must compile")
});

static QUOTED_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"`]([\w./-]+\.(?:tsx|ts|jsx|js|json|md|txt))['"`]"#)
        .expect("quoted filename regex must compile")
});

static BARE_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([\w./-]+\.(?:tsx|ts|jsx|js|json|md|txt))\b")
        .expect("bare filename regex must compile")
});

static BACKTICK_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("backtick regex must compile"));

static DIRECTORY_CREATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:create|make|mkdir|add|set\s+up)\b.*\b(?:directory|folder|dir)\b")
        .expect("directory creation regex must compile")
});

static DIRECTORY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:directory|folder|dir)\s+(?:called\s+|named\s+)?([\w./-]+)")
        .expect("directory name regex must compile")
});

static EXECUTE_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:execute|invoke)\s+(?:the\s+)?(?:command\s+)?(.+)$")
        .expect("execute object regex must compile")
});

static SEARCH_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bfor\s+(\S+)").expect("search subject regex must compile")
});

static PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*[:=]\s*(.*)$").expect("pair regex must compile")
});

fn has_word(text: &str, words: &[&str]) -> bool {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '-' && c != '.')
        .any(|token| words.contains(&token.trim_end_matches('.')))
}

/// Strip surrounding whitespace and one layer of matching quotes.
pub fn unquote(value: &str) -> &str {
    let trimmed = value.trim();
    for quote in ['"', '\'', '`'] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return inner.trim();
        }
    }
    trimmed
}

/// Keys holding file content or replacement text. An explicit empty
/// string or an ellipsis there is a real value.
const FREE_TEXT_KEYS: [&str; 3] = ["content", "search", "replace"];

/// Whether `value` is an un-substituted template token standing in for `key`.
///
/// Path and command keys also treat an empty value, a bare ellipsis, or the
/// key's own name (`command` for `command`) as unset.
pub fn is_placeholder(key: &str, value: &str) -> bool {
    let v = value.trim();
    let lower = v.to_lowercase();
    let whole_template = v.starts_with("{{") && v.ends_with("}}");
    if whole_template || lower == "placeholder" || lower == format!("<{key}>") {
        return true;
    }
    if FREE_TEXT_KEYS.contains(&key) {
        return false;
    }

    if v.is_empty() || lower == key || matches!(lower.as_str(), "..." | "…") {
        return true;
    }
    let single_token = !v.contains(char::is_whitespace);
    (v.starts_with("${") && v.ends_with('}'))
        || (single_token && v.starts_with('<') && v.ends_with('>'))
        || (single_token && lower.contains("placeholder"))
}

fn first_quoted(description: &str) -> Option<&str> {
    QUOTED
        .captures(description)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

fn filename_in(description: &str) -> Option<&str> {
    QUOTED_FILENAME
        .captures(description)
        .or_else(|| BARE_FILENAME.captures(description))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn project_name(description: &str) -> String {
    first_quoted(description)
        .filter(|name| !name.contains(char::is_whitespace))
        .unwrap_or(DEFAULT_PROJECT)
        .to_string()
}

/// Derive a shell command from a step description.
///
/// Ordered rules, first match wins:
/// 1. an explicit backticked command
/// 2. directory/folder creation → `mkdir -p <name>`
/// 3. a well-known project generator → its canonical invocation
/// 4. install / dependencies → `npm install`
/// 5. initialize / init → `npm init -y`
/// 6. build → `npm run build`
/// 7. test → `npm test`
/// 8. start / run / dev → `npm run dev`
/// 9. "execute X" → `X`
/// 10. otherwise a no-op `echo`
pub fn infer_command(description: &str) -> String {
    if let Some(cmd) = BACKTICK_COMMAND
        .captures(description)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|c| !c.is_empty())
    {
        return cmd.to_string();
    }

    if DIRECTORY_CREATION.is_match(description) {
        let name = first_quoted(description).map(String::from).or_else(|| {
            DIRECTORY_NAME
                .captures(description)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim_end_matches('.').to_string())
        });
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            return format!("mkdir -p {name}");
        }
    }

    let lower = description.to_lowercase();
    if lower.contains("create-react-app") || lower.contains("react app") {
        return format!("npx create-react-app {}", project_name(description));
    }
    if lower.contains("vite") {
        return format!(
            "npm create vite@latest {} -- --template react",
            project_name(description)
        );
    }
    if lower.contains("next.js") || lower.contains("nextjs") || lower.contains("next app") {
        return format!("npx create-next-app@latest {}", project_name(description));
    }
    if lower.contains("cargo") && has_word(description, &["new", "init", "create"]) {
        return format!("cargo new {}", project_name(description));
    }

    if has_word(description, &["install", "dependencies", "dependency"]) {
        return "npm install".into();
    }
    if has_word(description, &["initialize", "initialise", "init"]) {
        return "npm init -y".into();
    }
    if has_word(description, &["build"]) {
        return "npm run build".into();
    }
    if has_word(description, &["test", "tests"]) {
        return "npm test".into();
    }
    if has_word(description, &["start", "run", "dev"]) {
        return "npm run dev".into();
    }

    if let Some(object) = EXECUTE_OBJECT
        .captures(description)
        .and_then(|c| c.get(1))
        .map(|m| unquote(m.as_str()))
        .filter(|o| !o.is_empty())
    {
        return object.to_string();
    }

    format!("echo \"{}\"", description.trim().replace('"', "\\\""))
}

/// Build an argument map for `tool` from a raw argument string and the
/// description of the step.
pub fn extract(tool: &str, raw: Option<&str>, description: &str) -> Arguments {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty());

    if let Some(text) = raw
        && text.starts_with('{')
    {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => return fill_missing(tool, map, description),
            Ok(_) | Err(_) => debug!(tool, "Raw arguments are not a JSON object, parsing as text"),
        }
    }

    let mut args = Arguments::new();
    match tool {
        "run_command" => {
            if let Some(text) = raw.map(unquote).filter(|t| !is_placeholder("command", t)) {
                args.insert("command".into(), text.into());
            }
        }
        "write_file" => {
            if let Some(text) = raw {
                match text.split_once(',') {
                    Some((path, content)) => {
                        args.insert("file_path".into(), unquote(path).into());
                        args.insert("content".into(), unquote(content).into());
                    }
                    None => {
                        args.insert("file_path".into(), unquote(text).into());
                    }
                }
            }
        }
        "read_file" | "get_file_info" => {
            if let Some(text) = raw {
                args.insert("file_path".into(), unquote(text).into());
            }
        }
        "list_files" => {
            if let Some(text) = raw {
                args.insert("directory_path".into(), unquote(text).into());
            }
        }
        "search_files" => {
            if let Some(text) = raw {
                match text.split_once(',') {
                    Some((pattern, dir)) => {
                        args.insert("pattern".into(), unquote(pattern).into());
                        args.insert("directory_path".into(), unquote(dir).into());
                    }
                    None => {
                        args.insert("pattern".into(), unquote(text).into());
                    }
                }
            }
        }
        "search_replace" => {
            if let Some(text) = raw {
                let parts: Vec<&str> = text.splitn(3, ',').collect();
                for (key, part) in ["file_path", "search", "replace"].iter().zip(parts) {
                    args.insert((*key).into(), unquote(part).into());
                }
            }
        }
        other => {
            if let Some(text) = raw {
                split_pairs(other, text, &mut args);
            }
        }
    }

    fill_missing(tool, args, description)
}

/// Generic `key: value` / `key=value` splitting for tools without a table
/// entry. Bare values go to `file_path`, `command`, or `input` depending on
/// the tool name.
fn split_pairs(tool: &str, text: &str, args: &mut Arguments) {
    let bare_key = if tool.contains("file") {
        "file_path"
    } else if tool.contains("command") {
        "command"
    } else {
        "input"
    };

    for part in text.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match PAIR.captures(part) {
            Some(caps) => {
                let key = caps.get(1).map_or("", |m| m.as_str());
                let value = caps.get(2).map_or("", |m| unquote(m.as_str()));
                args.insert(key.into(), value.into());
            }
            None => {
                args.entry(bare_key.to_string())
                    .or_insert_with(|| unquote(part).into());
            }
        }
    }
}

fn missing(args: &Arguments, key: &str) -> bool {
    match args.get(key) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => is_placeholder(key, s),
        Some(_) => false,
    }
}

/// Fill required keys that are absent or hold placeholders, deriving them
/// from the description. Keys that already hold real values are kept.
fn fill_missing(tool: &str, mut args: Arguments, description: &str) -> Arguments {
    match tool {
        "run_command" => {
            if missing(&args, "command") {
                args.insert("command".into(), infer_command(description).into());
            }
            if missing(&args, "cwd") {
                args.insert("cwd".into(), ".".into());
            }
        }
        "write_file" => {
            if missing(&args, "file_path") {
                let path = filename_in(description).unwrap_or(PLACEHOLDER_FILE);
                args.insert("file_path".into(), path.into());
            }
            if missing(&args, "content") {
                args.insert("content".into(), format!("// {}", description.trim()).into());
            }
        }
        "read_file" | "get_file_info" => {
            if missing(&args, "file_path") {
                let path = first_quoted(description)
                    .or_else(|| filename_in(description))
                    .unwrap_or(".");
                args.insert("file_path".into(), path.into());
            }
        }
        "list_files" => {
            if missing(&args, "directory_path") {
                let path = first_quoted(description).unwrap_or(".");
                args.insert("directory_path".into(), path.into());
            }
        }
        "search_files" => {
            if missing(&args, "pattern") {
                let pattern = first_quoted(description)
                    .or_else(|| {
                        SEARCH_SUBJECT
                            .captures(description)
                            .and_then(|c| c.get(1))
                            .map(|m| m.as_str())
                    })
                    .unwrap_or(description.trim());
                args.insert("pattern".into(), pattern.into());
            }
            if missing(&args, "directory_path") {
                args.insert("directory_path".into(), ".".into());
            }
        }
        "search_replace" => {
            if missing(&args, "file_path")
                && let Some(path) = filename_in(description)
            {
                args.insert("file_path".into(), path.into());
            }
        }
        _ => {}
    }
    args
}

/// Re-validate a call immediately before execution, repairing missing or
/// placeholder arguments from `description`.
pub fn repair(call: &ToolCall, description: &str) -> ToolCall {
    let arguments = fill_missing(&call.name, call.arguments.clone(), description);
    if arguments != call.arguments {
        debug!(tool = %call.name, "Repaired tool arguments");
    }
    ToolCall::new(call.name.clone(), arguments)
}
