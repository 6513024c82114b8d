//! Embedding similarity.

/// Cosine similarity of two vectors: `a·b / (|a| |b|)`.
///
/// Computed in full even for unit vectors. Returns 0.0 when either vector
/// has zero length. Only the overlapping prefix is used if lengths differ;
/// callers check dimensions first.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let (dot, norm_a, norm_b) = a.iter().zip(b.iter()).fold(
        (0.0f64, 0.0f64, 0.0f64),
        |(dot, na, nb), (&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            (dot + x * y, na + x * x, nb + y * y)
        },
    );

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    (dot / denominator).clamp(-1.0, 1.0)
}
