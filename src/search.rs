use crate::embeddings::Embedder;
use crate::models::{EmbeddingRecord, SearchHit};
use crate::store::VectorStore;
use anyhow::{Result, anyhow};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

/// Cosine similarity over the overlapping dimension range of two vectors.
/// A zero norm on either side scores 0.0 rather than dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..n {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Score every record against a query vector and keep the top `limit`,
/// descending by similarity. The sort is stable, so ties keep storage order.
pub fn rank_by_similarity<'a>(
    records: impl Iterator<Item = &'a EmbeddingRecord>,
    query_vector: &[f32],
    limit: usize,
) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = records
        .map(|rec| SearchHit {
            provider: rec.provider,
            rel_path: rec.rel_path.clone(),
            session_path: rec.session_path.clone(),
            score: cosine_similarity(query_vector, &rec.embedding),
        })
        .collect();
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    hits
}

/// Rank all indexed sessions against a free-text query. Full linear scan;
/// a local session history is small enough that O(n) scoring is fine.
///
/// An empty store returns no results without calling the embedding provider.
/// A query-embedding failure is a hard error: there is no partial result.
pub async fn semantic_search(
    store: &VectorStore,
    embedder: &dyn Embedder,
    query: &str,
    limit: Option<usize>,
) -> Result<Vec<SearchHit>> {
    let records = store.load()?;
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let texts = [query.to_string()];
    let vectors = embedder.embed(&texts).await?;
    let query_vector = vectors
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Failed to generate query embedding"))?;

    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(rank_by_similarity(records.values(), &query_vector, limit))
}
