//! Cosine similarity over CLIP-style embeddings.
//!
//! Every embedding stored in an entity cache is expected to carry this many
//! dimensions; anything else is rejected at load time rather than padded or
//! truncated.
pub const EMBEDDING_DIM: usize = 512;

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity between two equal-length vectors. Returns `0.0` if
/// either vector has zero magnitude rather than dividing by zero.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let na = norm(a);
    let nb = norm(b);
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (na * nb)
}

/// Cosine similarity between one query embedding and many candidates,
/// normalizing the query once rather than on every comparison.
#[must_use]
pub fn batch_cosine_similarity(query: &[f32], candidates: &[Vec<f32>]) -> Vec<f32> {
    let query_norm = norm(query);
    if query_norm == 0.0 {
        return vec![0.0; candidates.len()];
    }
    candidates
        .iter()
        .map(|candidate| {
            let candidate_norm = norm(candidate);
            if candidate_norm == 0.0 {
                return 0.0;
            }
            let dot: f32 = query.iter().zip(candidate.iter()).map(|(x, y)| x * y).sum();
            dot / (query_norm * candidate_norm)
        })
        .collect()
}

/// Index and score of the highest-scoring candidate at or above `threshold`,
/// or `None` if nothing clears the bar. Ties keep the first (lowest-index)
/// candidate seen, matching a left-to-right scan.
#[must_use]
pub fn best_match(similarities: &[f32], threshold: f32) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in similarities.iter().enumerate() {
        if score >= threshold {
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((idx, score)),
            }
        }
    }
    best
}
