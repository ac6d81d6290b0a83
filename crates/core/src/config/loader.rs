use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment variable prefix for overrides, e.g. `SOURCEFINDER_REDDIT__CLIENT_ID`.
pub const ENV_PREFIX: &str = "SOURCEFINDER_";

fn env_overrides() -> Env {
    Env::prefixed(ENV_PREFIX).split("__")
}

/// Load configuration from a TOML file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::new()
        .merge(Toml::file(path))
        .merge(env_overrides())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Defaults plus environment overrides, for running without a config file.
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    Figment::new()
        .merge(env_overrides())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
