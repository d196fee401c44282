use crate::embeddings::{Embedder, truncate_chars};
use crate::fingerprint::content_hash;
use crate::models::{EmbeddingRecord, IndexStats, Provider, record_key};
use crate::normalizer::{NormalizeLimits, canonical_text_for_file};
use crate::store::VectorStore;
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Cap on per-file diagnostics; embed failures can carry large API bodies.
const MAX_DIAGNOSTIC_CHARS: usize = 500;

/// One provider root to scan.
#[derive(Debug, Clone)]
pub struct IndexSource {
    pub provider: Provider,
    pub root: PathBuf,
}

/// Brings the vector store up to date with the session files on disk,
/// embedding only files whose canonical text changed since the last pass.
pub struct SemanticIndexer<'a> {
    store: &'a VectorStore,
    sources: Vec<IndexSource>,
    limits: NormalizeLimits,
    embed_delay: Duration,
    embedder: &'a dyn Embedder,
}

impl<'a> SemanticIndexer<'a> {
    pub fn new(
        store: &'a VectorStore,
        sources: Vec<IndexSource>,
        limits: NormalizeLimits,
        embed_delay: Duration,
        embedder: &'a dyn Embedder,
    ) -> Self {
        Self {
            store,
            sources,
            limits,
            embed_delay,
            embedder,
        }
    }

    /// Run one full index pass. Per-file failures are counted and skipped;
    /// only store I/O aborts the pass. Safe to re-run at any time: unchanged
    /// files cost zero embedding calls.
    pub async fn run(&self) -> Result<IndexStats> {
        let mut index = self.store.load()?;
        let mut stats = IndexStats::default();

        for source in &self.sources {
            for path in list_session_files(&source.root) {
                stats.scanned += 1;

                let Ok(rel) = path.strip_prefix(&source.root) else {
                    continue;
                };
                let rel_path = rel.to_string_lossy().into_owned();
                let key = record_key(source.provider, &rel_path);

                let mtime = match file_mtime(&path) {
                    Ok(mtime) => mtime,
                    Err(e) => {
                        stats.errors += 1;
                        debug!("Stat failed for {key}: {e}");
                        continue;
                    }
                };

                let text = match canonical_text_for_file(&path, source.provider, self.limits) {
                    Ok(text) => text,
                    Err(e) => {
                        stats.errors += 1;
                        debug!("Normalize failed for {key}: {e}");
                        continue;
                    }
                };

                let hash = content_hash(&text);
                if index
                    .get(&key)
                    .is_some_and(|rec| rec.content_hash == hash)
                {
                    stats.skipped += 1;
                    continue;
                }

                match self.embedder.embed(std::slice::from_ref(&text)).await {
                    Ok(vectors) => {
                        let Some(embedding) = vectors.into_iter().next() else {
                            stats.errors += 1;
                            warn!("Embedding returned empty result for {key}");
                            continue;
                        };
                        index.insert(
                            key,
                            EmbeddingRecord {
                                provider: source.provider,
                                rel_path,
                                session_path: path.to_string_lossy().into_owned(),
                                updated_at: mtime.to_rfc3339_opts(SecondsFormat::Millis, true),
                                content_hash: hash,
                                embedding,
                                model: Some(self.embedder.model().to_string()),
                            },
                        );
                        stats.embedded += 1;
                        // Provider rate limits favor serialized, throttled
                        // calls; skipped files pay nothing.
                        if !self.embed_delay.is_zero() {
                            tokio::time::sleep(self.embed_delay).await;
                        }
                    }
                    Err(e) => {
                        stats.errors += 1;
                        warn!(
                            "Embed failed for {key}: {}",
                            truncate_chars(&e.to_string(), MAX_DIAGNOSTIC_CHARS)
                        );
                    }
                }
            }
        }

        stats.wrote = self.store.save(&index)?;
        info!(
            "Index pass complete: {} scanned, {} embedded, {} skipped, {} errors, {} written",
            stats.scanned, stats.embedded, stats.skipped, stats.errors, stats.wrote
        );
        Ok(stats)
    }
}

/// Recursively enumerate `.jsonl` session files under a provider root.
/// Directories named "archive" (any case) are pruned from traversal; an
/// unreadable or missing root yields no files.
pub fn list_session_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry.file_name().to_string_lossy().eq_ignore_ascii_case("archive"))
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "jsonl")
        })
        .map(|entry| entry.into_path())
        .collect()
}

fn file_mtime(path: &Path) -> std::io::Result<DateTime<Utc>> {
    Ok(std::fs::metadata(path)?.modified()?.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingError;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Deterministic stand-in for the embedding API; counts calls so tests
    /// can assert how many embeddings a pass actually paid for.
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model(&self) -> &str {
            "counting-test-model"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.chars().count() as f32, 1.0, 0.0])
                .collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model(&self) -> &str {
            "failing-test-model"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Api {
                status: 500,
                body: "boom".to_string(),
            })
        }
    }

    fn claude_session(text: &str) -> String {
        format!("{{\"type\":\"user\",\"message\":{{\"content\":\"{text}\"}}}}\n")
    }

    fn setup(dir: &TempDir) -> (VectorStore, Vec<IndexSource>) {
        let root = dir.path().join("claude");
        fs::create_dir_all(root.join("proj")).unwrap();
        fs::write(root.join("proj/one.jsonl"), claude_session("first session")).unwrap();
        fs::write(root.join("proj/two.jsonl"), claude_session("second session")).unwrap();
        let store = VectorStore::new(dir.path().join("session-embeddings.jsonl"));
        let sources = vec![IndexSource {
            provider: Provider::Claude,
            root,
        }];
        (store, sources)
    }

    fn indexer<'a>(
        store: &'a VectorStore,
        sources: &[IndexSource],
        embedder: &'a dyn Embedder,
    ) -> SemanticIndexer<'a> {
        SemanticIndexer::new(
            store,
            sources.to_vec(),
            NormalizeLimits::default(),
            Duration::ZERO,
            embedder,
        )
    }

    #[tokio::test]
    async fn first_pass_embeds_everything() {
        let dir = TempDir::new().unwrap();
        let (store, sources) = setup(&dir);
        let embedder = CountingEmbedder::new();

        let stats = indexer(&store, &sources, &embedder).run().await.unwrap();
        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.embedded, 2);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.wrote, 2);
        assert_eq!(embedder.call_count(), 2);

        let records = store.load().unwrap();
        let rec = records.get("claude:proj/one.jsonl").unwrap();
        assert_eq!(rec.model.as_deref(), Some("counting-test-model"));
        assert_eq!(rec.embedding.len(), 3);
    }

    #[tokio::test]
    async fn unchanged_rerun_embeds_nothing_and_rewrites_identically() {
        let dir = TempDir::new().unwrap();
        let (store, sources) = setup(&dir);
        let embedder = CountingEmbedder::new();

        indexer(&store, &sources, &embedder).run().await.unwrap();
        let first_bytes = fs::read(store.path()).unwrap();

        let stats = indexer(&store, &sources, &embedder).run().await.unwrap();
        assert_eq!(stats.embedded, 0);
        assert_eq!(stats.skipped, 2);
        assert_eq!(embedder.call_count(), 2, "second pass must not call the embedder");
        assert_eq!(fs::read(store.path()).unwrap(), first_bytes);
    }

    #[tokio::test]
    async fn only_the_changed_file_is_re_embedded() {
        let dir = TempDir::new().unwrap();
        let (store, sources) = setup(&dir);
        let embedder = CountingEmbedder::new();

        indexer(&store, &sources, &embedder).run().await.unwrap();
        fs::write(
            sources[0].root.join("proj/one.jsonl"),
            claude_session("first session, edited"),
        )
        .unwrap();

        let stats = indexer(&store, &sources, &embedder).run().await.unwrap();
        assert_eq!(stats.embedded, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(embedder.call_count(), 3);
    }

    #[tokio::test]
    async fn archive_directories_are_not_traversed() {
        let dir = TempDir::new().unwrap();
        let (store, sources) = setup(&dir);
        fs::create_dir_all(sources[0].root.join("Archive")).unwrap();
        fs::write(
            sources[0].root.join("Archive/old.jsonl"),
            claude_session("archived"),
        )
        .unwrap();
        let embedder = CountingEmbedder::new();

        let stats = indexer(&store, &sources, &embedder).run().await.unwrap();
        assert_eq!(stats.scanned, 2);
        assert!(!store.load().unwrap().keys().any(|k| k.contains("Archive")));
    }

    #[tokio::test]
    async fn unreadable_file_is_counted_and_skipped() {
        let dir = TempDir::new().unwrap();
        let (store, sources) = setup(&dir);
        // Invalid UTF-8 makes the normalizer's read fail for this one file.
        fs::write(sources[0].root.join("proj/bad.jsonl"), [0xff, 0xfe, 0x00]).unwrap();
        let embedder = CountingEmbedder::new();

        let stats = indexer(&store, &sources, &embedder).run().await.unwrap();
        assert_eq!(stats.scanned, 3);
        assert_eq!(stats.embedded, 2);
        assert_eq!(stats.errors, 1);
    }

    #[tokio::test]
    async fn one_embed_failure_never_aborts_the_pass() {
        let dir = TempDir::new().unwrap();
        let (store, sources) = setup(&dir);

        let stats = indexer(&store, &sources, &FailingEmbedder).run().await.unwrap();
        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.embedded, 0);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.wrote, 0);
        assert!(store.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_root_yields_empty_scan() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::new(dir.path().join("session-embeddings.jsonl"));
        let sources = vec![IndexSource {
            provider: Provider::Codex,
            root: dir.path().join("does-not-exist"),
        }];
        let embedder = CountingEmbedder::new();

        let stats = indexer(&store, &sources, &embedder).run().await.unwrap();
        assert_eq!(stats.scanned, 0);
        assert_eq!(embedder.call_count(), 0);
    }

    #[test]
    fn discovery_only_picks_up_jsonl_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("nested/a.jsonl"), "").unwrap();
        fs::write(root.join("nested/notes.txt"), "").unwrap();
        fs::write(root.join("b.jsonl"), "").unwrap();

        let files = list_session_files(&root);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(&root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.jsonl", "nested/a.jsonl"]);
    }
}
