//! Vector similarity utilities.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity and cosine distance
//! - Top-k ranking by distance with stable tie-breaking

use issuespilot_core::{Chunk, SearchHit};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ or either vector is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Cosine distance as Chroma reports it: `1 - similarity`, in [0, 2].
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Rank chunks by cosine distance to a query embedding, closest first.
///
/// Chunks without an embedding are skipped. A distance that is not a number
/// ranks last as `f32::MAX`. The sort is stable, so equal distances keep the
/// order in which the chunks were supplied.
pub fn rank_by_distance<'a, I>(chunks: I, query_embedding: &[f32], k: usize) -> Vec<SearchHit>
where
    I: IntoIterator<Item = &'a Chunk>,
{
    let mut scored: Vec<SearchHit> = chunks
        .into_iter()
        .filter_map(|chunk| {
            let emb = chunk.embedding.as_ref()?;
            let distance = cosine_distance(emb, query_embedding);
            Some(SearchHit {
                distance: if distance.is_nan() { f32::MAX } else { distance },
                chunk: Chunk {
                    embedding: None,
                    ..chunk.clone()
                },
            })
        })
        .collect();

    scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    scored.truncate(k);
    scored
}
