//! Confidence scoring of Reddit candidates against an extraction query.
//!
//! Scores posts by:
//! 1. Title similarity (plus an exact-title bonus)
//! 2. Author similarity, unless the query username is a placeholder
//! 3. Subreddit similarity
//! 4. Body snippet overlap
//!
//! Comments are scored on their text instead, since the query title of a
//! comment screenshot is usually the parent post's title and the snippet is
//! the comment itself.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::reddit::{Candidate, CandidateKind};
use crate::resolver::ExtractionQuery;

use super::normalizer::{extract_keywords, normalize_text, normalized_prefix, sanitize_identifier};

/// Scoring weights and bonuses.
///
/// Empirically chosen; treat changes as recalibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub title_weight: f64,
    /// Added when title similarity exceeds `exact_title_similarity`.
    pub exact_title_bonus: f64,
    pub exact_title_similarity: f64,
    pub author_weight: f64,
    pub subreddit_weight: f64,
    /// Flat bonus when keyword-extracted snippet and body overlap enough.
    pub body_bonus: f64,
    pub body_similarity: f64,
    /// Characters of normalized text compared directly for comments.
    pub comment_prefix_chars: usize,
    /// Bonus when a phrase of the query text appears verbatim in a comment.
    pub containment_bonus: f64,
    /// Length of the phrases checked for verbatim containment.
    pub containment_phrase_chars: usize,
    /// Shorter phrases are too generic to count as containment evidence.
    pub min_containment_chars: usize,
    /// Applied to every comment score: comment history is already filtered to one author.
    pub user_matched_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            title_weight: 0.6,
            exact_title_bonus: 0.15,
            exact_title_similarity: 0.9,
            author_weight: 0.2,
            subreddit_weight: 0.2,
            body_bonus: 0.1,
            body_similarity: 0.5,
            comment_prefix_chars: 150,
            containment_bonus: 0.5,
            containment_phrase_chars: 40,
            min_containment_chars: 15,
            user_matched_bonus: 0.2,
        }
    }
}

/// A candidate with its confidence score.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    /// 0.0-1.0.
    pub score: f64,
}

/// Bigram (Sørensen-Dice) similarity of two strings, 0.0-1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::sorensen_dice(a, b)
}

/// Heuristic candidate scorer.
#[derive(Debug, Clone, Default)]
pub struct MatchScorer {
    weights: ScoringWeights,
}

impl MatchScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score one candidate, dispatching on its kind.
    pub fn score(&self, candidate: &Candidate, query: &ExtractionQuery) -> f64 {
        match candidate.kind {
            CandidateKind::Post => self.score_post(candidate, query),
            CandidateKind::Comment => self.score_comment(candidate, query),
        }
    }

    /// Weighted post score, capped at 1.0.
    pub fn score_post(&self, candidate: &Candidate, query: &ExtractionQuery) -> f64 {
        let w = &self.weights;
        let mut score = 0.0;

        if let Some(title) = query.title() {
            let title_sim = similarity(&title.to_lowercase(), &candidate.title.to_lowercase());
            score += title_sim * w.title_weight;
            if title_sim > w.exact_title_similarity {
                score += w.exact_title_bonus;
            }
        }

        // Placeholder usernames are filtered out by `username()`.
        if let Some(username) = query.username() {
            score += identifier_similarity(username, &candidate.author) * w.author_weight;
        }

        if let Some(subreddit) = query.subreddit() {
            score += identifier_similarity(subreddit, &candidate.subreddit) * w.subreddit_weight;
        }

        if let (Some(snippet), Some(body)) = (query.body_snippet(), candidate.body_text.as_deref())
        {
            let body_sim = similarity(&extract_keywords(snippet), &extract_keywords(body));
            if body_sim > w.body_similarity {
                score += w.body_bonus;
            }
        }

        score.clamp(0.0, 1.0)
    }

    /// Comment score: fuzzy text similarity, verbatim containment, author boost.
    pub fn score_comment(&self, candidate: &Candidate, query: &ExtractionQuery) -> f64 {
        let w = &self.weights;
        let query_text = query.combined_text();
        let comment_text = candidate.body_text.as_deref().unwrap_or_default();

        let keyword_sim = similarity(
            &extract_keywords(&query_text),
            &extract_keywords(comment_text),
        );
        let prefix_sim = similarity(
            &normalized_prefix(&query_text, w.comment_prefix_chars),
            &normalized_prefix(comment_text, w.comment_prefix_chars),
        );

        // The title belongs to the parent post; it only stands in for a missing snippet.
        let phrase_source = query.body_snippet().or(query.title()).unwrap_or_default();
        let mut score = keyword_sim.max(prefix_sim);
        if self.contains_query_phrase(phrase_source, comment_text) {
            score += w.containment_bonus;
        }
        score += w.user_matched_bonus;

        score.clamp(0.0, 1.0)
    }

    /// Whether the comment contains the phrase's opening or a slice of its
    /// middle, after normalization.
    fn contains_query_phrase(&self, phrase_source: &str, comment_text: &str) -> bool {
        let w = &self.weights;
        let query_norm = normalize_text(phrase_source);
        let comment_norm = normalize_text(comment_text);
        if comment_norm.is_empty() {
            return false;
        }

        let chars: Vec<char> = query_norm.chars().collect();
        let prefix: String = chars.iter().take(w.containment_phrase_chars).collect();
        let middle: String = chars
            .iter()
            .skip(chars.len() / 3)
            .take(w.containment_phrase_chars)
            .collect();

        [prefix, middle]
            .iter()
            .map(|phrase| phrase.trim())
            .filter(|phrase| phrase.chars().count() >= w.min_containment_chars)
            .any(|phrase| comment_norm.contains(phrase))
    }

    /// Highest-scoring candidate; ties keep the earliest one.
    ///
    /// Duplicate permalinks are scored once.
    pub fn best_match(
        &self,
        candidates: &[Candidate],
        query: &ExtractionQuery,
    ) -> Option<ScoredCandidate> {
        let mut seen = HashSet::new();
        let mut best: Option<ScoredCandidate> = None;

        for candidate in candidates {
            if !seen.insert(candidate.permalink.as_str()) {
                continue;
            }
            let score = self.score(candidate, query);
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(ScoredCandidate {
                    candidate: candidate.clone(),
                    score,
                });
            }
        }

        best
    }
}

/// Similarity of two Reddit identifiers, ignoring `u/` / `r/` markers and case.
fn identifier_similarity(query_value: &str, candidate_value: &str) -> f64 {
    let query_id = sanitize_identifier(query_value)
        .unwrap_or_default()
        .to_lowercase();
    let candidate_id = sanitize_identifier(candidate_value)
        .unwrap_or_default()
        .to_lowercase();
    similarity(&query_id, &candidate_id)
}
