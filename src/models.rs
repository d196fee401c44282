use serde::{Deserialize, Serialize};

/// Transcript sources we know how to read. Each keeps its session logs in a
/// different JSONL event format under its own per-user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Codex,
    Claude,
    Copilot,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Codex, Provider::Claude, Provider::Copilot];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Codex => "codex",
            Provider::Claude => "claude",
            Provider::Copilot => "copilot",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity key used everywhere a session needs a stable name:
/// store keys, sort order, log lines.
pub fn record_key(provider: Provider, rel_path: &str) -> String {
    format!("{}:{}", provider.as_str(), rel_path)
}

/// One persisted line of the vector store. `(provider, relPath)` is the sole
/// identity; `sessionPath` is informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub provider: Provider,
    #[serde(rename = "relPath")]
    pub rel_path: String,
    #[serde(rename = "sessionPath")]
    pub session_path: String,
    /// Source file mtime at the moment of embedding, RFC 3339.
    pub updated_at: String,
    /// SHA-256 of the canonical text the embedding was computed from.
    pub content_hash: String,
    pub embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl EmbeddingRecord {
    pub fn key(&self) -> String {
        record_key(self.provider, &self.rel_path)
    }
}

/// Aggregate counters returned by an index pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub scanned: usize,
    pub embedded: usize,
    pub skipped: usize,
    pub errors: usize,
    pub wrote: usize,
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub provider: Provider,
    #[serde(rename = "relPath")]
    pub rel_path: String,
    #[serde(rename = "sessionPath")]
    pub session_path: String,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Provider::Claude).unwrap(), "\"claude\"");
        let p: Provider = serde_json::from_str("\"copilot\"").unwrap();
        assert_eq!(p, Provider::Copilot);
    }

    #[test]
    fn record_key_joins_provider_and_path() {
        assert_eq!(record_key(Provider::Codex, "2025/01/foo.jsonl"), "codex:2025/01/foo.jsonl");
    }

    #[test]
    fn record_round_trips_persisted_field_names() {
        let rec = EmbeddingRecord {
            provider: Provider::Claude,
            rel_path: "proj/session.jsonl".to_string(),
            session_path: "/home/u/.claude/projects/proj/session.jsonl".to_string(),
            updated_at: "2025-08-28T20:08:33.947Z".to_string(),
            content_hash: "abc123".to_string(),
            embedding: vec![0.25, -1.0],
            model: Some("text-embedding-3-small".to_string()),
        };
        let line = serde_json::to_string(&rec).unwrap();
        assert!(line.contains("\"relPath\""));
        assert!(line.contains("\"sessionPath\""));
        let back: EmbeddingRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back.key(), rec.key());
        assert_eq!(back.embedding, rec.embedding);
    }
}
