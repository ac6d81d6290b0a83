pub mod config;
pub mod matching;
pub mod reddit;
pub mod resolver;
pub mod testing;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config,
    validate_resolver_config, Config, ConfigError, PacingConfig, RedditConfig, ResolverConfig,
    SanitizedConfig,
};
pub use matching::{MatchScorer, ScoredCandidate, ScoringWeights};
pub use reddit::{Candidate, CandidateKind, FetchError, ListingPage, ListingRequest, RedditApi, RedditClient};
pub use resolver::{
    ExtractionConfidence, ExtractionQuery, FailureKind, MatchedSubmission, ResolutionReport,
    ResolutionResult, Resolver,
};
