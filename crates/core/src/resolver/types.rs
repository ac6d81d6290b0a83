//! Query and result types for source resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::matching::{is_generic_username, ScoredCandidate};

/// How sure the vision step was about what it read.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionConfidence {
    High,
    #[default]
    Medium,
    Low,
}

/// Fields read off a screenshot. Any of them may be missing or wrong.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subreddit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_snippet: Option<String>,
    #[serde(default)]
    pub confidence: ExtractionConfidence,
}

/// Query fields a strategy can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryField {
    Subreddit,
    /// A username that is present and not a placeholder.
    Username,
    Title,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ExtractionQuery {
    pub fn title(&self) -> Option<&str> {
        non_blank(&self.title)
    }

    pub fn subreddit(&self) -> Option<&str> {
        non_blank(&self.subreddit)
    }

    /// The username, unless missing or one of the unreadable placeholders.
    pub fn username(&self) -> Option<&str> {
        non_blank(&self.username).filter(|u| !is_generic_username(u))
    }

    pub fn body_snippet(&self) -> Option<&str> {
        non_blank(&self.body_snippet)
    }

    pub fn has(&self, field: QueryField) -> bool {
        match field {
            QueryField::Subreddit => self.subreddit().is_some(),
            QueryField::Username => self.username().is_some(),
            QueryField::Title => self.title().is_some(),
        }
    }

    /// Title and body snippet joined, for comparison against comment text.
    pub fn combined_text(&self) -> String {
        [self.title(), self.body_snippet()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A candidate accepted as the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedSubmission {
    pub url: String,
    pub title: String,
    pub author: String,
    pub subreddit: String,
    /// 0.0-1.0.
    pub match_confidence: f64,
    pub is_comment: bool,
}

impl From<&ScoredCandidate> for MatchedSubmission {
    fn from(scored: &ScoredCandidate) -> Self {
        let candidate = &scored.candidate;
        Self {
            url: candidate.url(),
            title: candidate.title.clone(),
            author: candidate.author.clone(),
            subreddit: candidate.subreddit.clone(),
            match_confidence: scored.score.clamp(0.0, 1.0),
            is_comment: candidate.is_comment(),
        }
    }
}

/// Why a resolution failed outright.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The named account does not exist.
    UserNotFound,
    /// Reddit throttled us before anything usable was found.
    RateLimited,
    /// Every attempted request failed.
    ApiError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::UserNotFound => "user_not_found",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::ApiError => "api_error",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionResult {
    Match(MatchedSubmission),
    /// The search completed and nothing cleared the confidence floor.
    NoMatch,
    Failure { kind: FailureKind },
}

impl ResolutionResult {
    pub fn is_match(&self) -> bool {
        matches!(self, ResolutionResult::Match(_))
    }

    pub fn as_match(&self) -> Option<&MatchedSubmission> {
        match self {
            ResolutionResult::Match(m) => Some(m),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ResolutionResult::Failure { kind } => Some(*kind),
            _ => None,
        }
    }
}
