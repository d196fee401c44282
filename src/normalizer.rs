use crate::models::Provider;
use anyhow::Result;
use serde_json::Value;
use std::path::Path;

/// Bounds applied while building canonical text, so one giant transcript
/// cannot blow up the embedding request.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeLimits {
    pub max_messages: usize,
    pub max_chars: usize,
}

impl Default for NormalizeLimits {
    fn default() -> Self {
        Self {
            max_messages: 80,
            max_chars: 20_000,
        }
    }
}

/// Read a session log and reduce it to canonical text.
///
/// Unreadable files surface as an error; the indexer treats that as a
/// per-file skip.
pub fn canonical_text_for_file(
    path: &Path,
    provider: Provider,
    limits: NormalizeLimits,
) -> Result<String> {
    let raw = std::fs::read_to_string(path)?;
    Ok(canonical_text(provider, &raw, limits))
}

/// Normalize one provider's raw JSONL content into a bounded, role-labeled
/// text blob: one `"role: text"` line per extracted message, newline-joined,
/// hard-truncated at `max_chars` characters.
///
/// Malformed JSON lines and records that don't match a known shape for the
/// provider are skipped silently; partially-written logs are normal here.
pub fn canonical_text(provider: Provider, raw: &str, limits: NormalizeLimits) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut char_count = 0usize;

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Ok(entry) = serde_json::from_str::<Value>(line) else {
            continue;
        };

        let extracted = match provider {
            Provider::Claude => claude_message(&entry),
            Provider::Copilot => copilot_message(&entry),
            Provider::Codex => codex_message(&entry),
        };

        if let Some((role, text)) = extracted {
            let cleaned = collapse_whitespace(&text);
            if !cleaned.is_empty() {
                let formatted = format!("{role}: {cleaned}");
                char_count += formatted.chars().count() + 1;
                parts.push(formatted);
            }
        }

        if parts.len() >= limits.max_messages || char_count >= limits.max_chars {
            break;
        }
    }

    truncate_chars(parts.join("\n"), limits.max_chars)
}

/// Claude logs: `summary` records plus plain `user`/`assistant` turns with
/// content nested under `.message.content`.
fn claude_message(entry: &Value) -> Option<(&'static str, String)> {
    match entry.get("type").and_then(Value::as_str)? {
        "summary" => {
            let summary = entry.get("summary").and_then(Value::as_str)?;
            Some(("summary", summary.to_string()))
        }
        role @ ("user" | "assistant") => {
            let content = entry.get("message").and_then(|m| m.get("content"))?;
            let role = if role == "user" { "user" } else { "assistant" };
            Some((role, flatten_content(content)))
        }
        _ => None,
    }
}

/// Copilot logs: dotted event types with content under `.data.content`,
/// falling back to `.data.transformedContent`.
fn copilot_message(entry: &Value) -> Option<(&'static str, String)> {
    let kind = entry.get("type").and_then(Value::as_str)?;
    let role = match kind {
        "user.message" => "user",
        "assistant.message" => "assistant",
        _ => return None,
    };
    let data = entry.get("data")?;
    let content = data
        .get("content")
        .and_then(Value::as_str)
        .or_else(|| data.get("transformedContent").and_then(Value::as_str))
        .unwrap_or_default();
    Some((role, content.to_string()))
}

/// Codex logs: two event-line kinds. `response_item` wraps arbitrary payloads
/// of which only `message` ones matter; `event_msg` carries plain user or
/// assistant turns under `.payload.message`.
fn codex_message(entry: &Value) -> Option<(&'static str, String)> {
    match entry.get("type").and_then(Value::as_str)? {
        "response_item" => {
            let payload = entry.get("payload")?;
            if payload.get("type").and_then(Value::as_str) != Some("message") {
                return None;
            }
            let content = payload.get("content")?;
            Some(("assistant", flatten_content(content)))
        }
        "event_msg" => {
            let payload = entry.get("payload")?;
            let role = match payload.get("type").and_then(Value::as_str)? {
                "user_message" => "user",
                "assistant_message" => "assistant",
                _ => return None,
            };
            let message = payload.get("message").and_then(Value::as_str).unwrap_or_default();
            Some((role, message.to_string()))
        }
        _ => None,
    }
}

/// Flatten message content into plain text. Strings pass through, arrays are
/// joined item by item (string items verbatim, objects via their `text`
/// field, everything else serialized), other values are serialized as-is.
fn flatten_content(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let mut parts = Vec::new();
            for item in items {
                match item {
                    Value::Null => continue,
                    Value::String(s) => parts.push(s.clone()),
                    other => {
                        if let Some(text) = other.get("text").and_then(Value::as_str) {
                            parts.push(text.to_string());
                        } else if let Ok(raw) = serde_json::to_string(other) {
                            parts.push(raw);
                        }
                    }
                }
            }
            parts.join("\n")
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    text.chars().take(max_chars).collect()
}
