//! Multi-strategy resolution of extraction queries to Reddit URLs.

mod runner;
mod strategy;
mod types;

pub use runner::{AttemptOutcome, ResolutionReport, Resolver, StopReason, StrategyAttempt};
pub use strategy::{
    default_strategies, AuthorInSubreddit, ExactTitle, SearchStrategy, StrategyContext,
    StrategyOutcome, TitleInSubreddit, TitleWithAuthor, UserCommentHistory,
};
pub use types::*;
