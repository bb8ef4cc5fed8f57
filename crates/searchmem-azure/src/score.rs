//! Conversion between cosine similarity and the engine's vector relevance score.
//!
//! For pure vector queries the engine reports `1 / (2 - cosine)`, a value in
//! `(1/3, 1]` for cosine in `(-1, 1]`. Hybrid queries combine lexical and
//! vector ranks into a score on a different scale, which is never converted.

/// Converts an engine vector score into cosine similarity.
pub fn score_to_similarity(score: f64) -> f64 {
    2.0 - 1.0 / score
}

/// Converts a cosine similarity into the engine's vector score.
pub fn similarity_to_score(similarity: f64) -> f64 {
    1.0 / (2.0 - similarity)
}
