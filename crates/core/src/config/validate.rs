use super::{
    types::{Config, ResolverConfig},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - OAuth id and secret are configured together
/// - Thresholds lie in [0, 1] and the match floor does not exceed the short-circuit
/// - Pacing delays are non-zero, the base delays fit under the cap, decay is in (0, 1]
/// - Search and pagination bounds are at least 1
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let reddit = &config.reddit;
    if reddit.client_id.is_some() != reddit.client_secret.is_some() {
        return Err(ConfigError::ValidationError(
            "reddit.client_id and reddit.client_secret must be set together".to_string(),
        ));
    }
    if reddit.user_agent.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "reddit.user_agent cannot be empty".to_string(),
        ));
    }
    if reddit.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "reddit.timeout_secs cannot be 0".to_string(),
        ));
    }

    validate_resolver_config(&config.resolver)?;

    let pacing = &config.pacing;
    if pacing.authenticated_delay_ms == 0 || pacing.unauthenticated_delay_ms == 0 {
        return Err(ConfigError::ValidationError(
            "pacing delays cannot be 0".to_string(),
        ));
    }
    if pacing.max_delay_ms < pacing.unauthenticated_delay_ms.max(pacing.authenticated_delay_ms) {
        return Err(ConfigError::ValidationError(
            "pacing.max_delay_ms must be at least the base delays".to_string(),
        ));
    }
    if !(pacing.decay_factor > 0.0 && pacing.decay_factor <= 1.0) {
        return Err(ConfigError::ValidationError(format!(
            "pacing.decay_factor must be in (0, 1], got {}",
            pacing.decay_factor
        )));
    }

    Ok(())
}

/// Validate the resolver section alone.
///
/// Thresholds must lie in [0, 1] with the match floor at or below the
/// short-circuit, and the search and pagination bounds must be at least 1.
pub fn validate_resolver_config(resolver: &ResolverConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("short_circuit_threshold", resolver.short_circuit_threshold),
        ("min_match_threshold", resolver.min_match_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::ValidationError(format!(
                "resolver.{} must be between 0 and 1, got {}",
                name, value
            )));
        }
    }
    if resolver.min_match_threshold > resolver.short_circuit_threshold {
        return Err(ConfigError::ValidationError(
            "resolver.min_match_threshold cannot exceed resolver.short_circuit_threshold"
                .to_string(),
        ));
    }
    if resolver.search_limit == 0 || resolver.max_comment_pages == 0 || resolver.comment_page_size == 0
    {
        return Err(ConfigError::ValidationError(
            "resolver.search_limit, max_comment_pages and comment_page_size must be at least 1"
                .to_string(),
        ));
    }

    Ok(())
}
