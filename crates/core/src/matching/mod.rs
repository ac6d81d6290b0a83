//! Text normalization and candidate scoring.

mod normalizer;
mod scorer;

pub use normalizer::{
    extract_keywords, is_generic_username, normalize_text, normalized_prefix,
    sanitize_identifier, MAX_IDENTIFIER_LEN, MAX_KEYWORDS,
};
pub use scorer::{similarity, MatchScorer, ScoredCandidate, ScoringWeights};
