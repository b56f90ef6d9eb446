//! Cosine scoring and top-k selection over half-precision vectors.

use half::f16;

/// Cosine similarity of two vectors, accumulated in f32.
///
/// Returns 0 when the lengths differ, when either vector has zero norm, or
/// when the arithmetic is not finite. The result is clamped to `[-1, 1]`.
pub fn cosine_similarity(a: &[f16], b: &[f16]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = x.to_f32();
        let y = y.to_f32();
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Score every candidate against `query`, keep the `top_k` best, then drop
/// any whose score is not strictly above `threshold`.
///
/// Returns `(candidate_index, score)` pairs in descending score order. Equal
/// scores keep insertion order, lower index first.
pub fn rank_top_k(
    query: &[f16],
    candidates: &[Vec<f16>],
    top_k: usize,
    threshold: f32,
) -> Vec<(usize, f32)> {
    if top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(idx, candidate)| (idx, cosine_similarity(query, candidate)))
        .collect();

    scored.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));
    scored.truncate(top_k);
    scored.retain(|(_, score)| *score > threshold);
    scored
}
