//! Strategy runner.
//!
//! Drives the ordered strategies against one query:
//! - `UserNotFound` ends the run with that failure
//! - a result at or above the short-circuit threshold ends the run with it
//! - weaker results are retained if strictly better than the best so far
//! - an active rate-limit cooldown, cancellation or the deadline stops iteration
//!
//! Strategies run strictly one after another. Concurrent resolutions may share
//! one `RedditApi`; its pacing is the only serialization point.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{validate_resolver_config, ConfigError, ResolverConfig};
use crate::matching::{MatchScorer, ScoredCandidate};
use crate::reddit::RedditApi;

use super::strategy::{default_strategies, SearchStrategy, StrategyContext, StrategyOutcome};
use super::types::{ExtractionQuery, FailureKind, MatchedSubmission, ResolutionResult};

/// Per-strategy entry of a [`ResolutionReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Required query fields were missing.
    Skipped,
    NoCandidates,
    Scored { confidence: f64 },
    SoftFailure { error: String },
    RateLimited,
    UserNotFound,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyAttempt {
    pub strategy: &'static str,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
    /// Calls made to the Reddit API by this attempt.
    pub requests: u32,
}

/// Why iteration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every strategy was tried or skipped.
    Exhausted,
    ShortCircuited,
    UserNotFound,
    RateLimited,
    Cancelled,
    DeadlineExceeded,
}

/// A resolution result with its trace.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub result: ResolutionResult,
    pub stop_reason: StopReason,
    pub attempts: Vec<StrategyAttempt>,
    pub duration_ms: u64,
}

impl ResolutionReport {
    /// Total Reddit API calls across all attempts.
    pub fn total_requests(&self) -> u32 {
        self.attempts.iter().map(|a| a.requests).sum()
    }
}

/// Multi-strategy Reddit source resolver.
pub struct Resolver {
    api: Arc<dyn RedditApi>,
    scorer: MatchScorer,
    config: ResolverConfig,
    strategies: Vec<Box<dyn SearchStrategy>>,
}

impl Resolver {
    /// Create a resolver with the default scorer and strategy order.
    ///
    /// The config is taken as given; out-of-range thresholds or zero page
    /// bounds are not caught here. Use [`Resolver::try_new`] for a config that
    /// has not been through [`validate_config`](crate::config::validate_config).
    pub fn new(api: Arc<dyn RedditApi>, config: ResolverConfig) -> Self {
        Self {
            api,
            scorer: MatchScorer::new(),
            config,
            strategies: default_strategies(),
        }
    }

    /// Like [`Resolver::new`], rejecting an invalid resolver config.
    pub fn try_new(api: Arc<dyn RedditApi>, config: ResolverConfig) -> Result<Self, ConfigError> {
        validate_resolver_config(&config)?;
        Ok(Self::new(api, config))
    }

    pub fn with_scorer(mut self, scorer: MatchScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Replace the strategy list.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn SearchStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Find the Reddit source for a query.
    pub async fn resolve(&self, query: &ExtractionQuery) -> ResolutionResult {
        self.resolve_detailed(query, &CancellationToken::new())
            .await
            .result
    }

    /// Like [`Resolver::resolve`], abandoning the run at the next strategy
    /// boundary once `cancel` fires.
    pub async fn resolve_with_cancel(
        &self,
        query: &ExtractionQuery,
        cancel: &CancellationToken,
    ) -> ResolutionResult {
        self.resolve_detailed(query, cancel).await.result
    }

    /// Run the strategies and return the result with a per-strategy trace.
    pub async fn resolve_detailed(
        &self,
        query: &ExtractionQuery,
        cancel: &CancellationToken,
    ) -> ResolutionReport {
        let start = Instant::now();
        let deadline = self
            .config
            .timeout_secs
            .map(|secs| start + Duration::from_secs(secs));

        let mut attempts = Vec::with_capacity(self.strategies.len());
        let mut best: Option<ScoredCandidate> = None;
        let mut stop_reason = StopReason::Exhausted;
        let mut ran = 0usize;
        let mut soft_failures = 0usize;

        for strategy in &self.strategies {
            if cancel.is_cancelled() {
                stop_reason = StopReason::Cancelled;
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                stop_reason = StopReason::DeadlineExceeded;
                break;
            }
            if self.api.is_rate_limited() {
                debug!(strategy = strategy.name(), "Rate-limit cooldown active, stopping");
                stop_reason = StopReason::RateLimited;
                break;
            }

            if !strategy.is_applicable(query) {
                debug!(strategy = strategy.name(), "Skipping strategy, required fields missing");
                attempts.push(StrategyAttempt {
                    strategy: strategy.name(),
                    outcome: AttemptOutcome::Skipped,
                    requests: 0,
                });
                continue;
            }

            debug!(strategy = strategy.name(), "Running strategy");
            let ctx = StrategyContext::new(self.api.as_ref(), &self.scorer, &self.config);
            let outcome = strategy.run(&ctx, query).await;
            ran += 1;

            let attempt_outcome = match &outcome {
                StrategyOutcome::Scored(scored) => AttemptOutcome::Scored {
                    confidence: scored.score,
                },
                StrategyOutcome::NoCandidates => AttemptOutcome::NoCandidates,
                StrategyOutcome::SoftFailure(error) => AttemptOutcome::SoftFailure {
                    error: error.clone(),
                },
                StrategyOutcome::RateLimited => AttemptOutcome::RateLimited,
                StrategyOutcome::UserNotFound => AttemptOutcome::UserNotFound,
            };
            debug!(
                strategy = strategy.name(),
                outcome = ?attempt_outcome,
                requests = ctx.requests(),
                "Strategy finished"
            );
            attempts.push(StrategyAttempt {
                strategy: strategy.name(),
                outcome: attempt_outcome,
                requests: ctx.requests(),
            });

            match outcome {
                StrategyOutcome::UserNotFound => {
                    stop_reason = StopReason::UserNotFound;
                    break;
                }
                StrategyOutcome::RateLimited => {
                    stop_reason = StopReason::RateLimited;
                    break;
                }
                StrategyOutcome::SoftFailure(_) => soft_failures += 1,
                StrategyOutcome::NoCandidates => {}
                StrategyOutcome::Scored(scored) => {
                    if scored.score >= self.config.short_circuit_threshold {
                        best = Some(scored);
                        stop_reason = StopReason::ShortCircuited;
                        break;
                    }
                    if best.as_ref().is_none_or(|b| scored.score > b.score) {
                        best = Some(scored);
                    }
                }
            }
        }

        let result = self.decide(stop_reason, best.as_ref(), ran, soft_failures);
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            stop_reason = ?stop_reason,
            result = ?result,
            strategies_run = ran,
            duration_ms,
            "Resolution finished"
        );

        ResolutionReport {
            result,
            stop_reason,
            attempts,
            duration_ms,
        }
    }

    fn decide(
        &self,
        stop_reason: StopReason,
        best: Option<&ScoredCandidate>,
        ran: usize,
        soft_failures: usize,
    ) -> ResolutionResult {
        if stop_reason == StopReason::UserNotFound {
            return ResolutionResult::Failure {
                kind: FailureKind::UserNotFound,
            };
        }

        if let Some(best) = best.filter(|b| b.score >= self.config.min_match_threshold) {
            return ResolutionResult::Match(MatchedSubmission::from(best));
        }

        if stop_reason == StopReason::RateLimited {
            return ResolutionResult::Failure {
                kind: FailureKind::RateLimited,
            };
        }

        if ran > 0 && soft_failures == ran {
            return ResolutionResult::Failure {
                kind: FailureKind::ApiError,
            };
        }

        ResolutionResult::NoMatch
    }
}
