//! Command-line arguments.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use sourcefinder_core::{ExtractionConfidence, ExtractionQuery};

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "SOURCEFINDER_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Find the Reddit post or comment a screenshot was taken from.
#[derive(Debug, Parser)]
#[command(name = "sourcefinder", version, about)]
pub struct Cli {
    /// Path to the TOML config file [env: SOURCEFINDER_CONFIG, default: config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Read the query as JSON from stdin instead of flags
    #[arg(long, conflicts_with_all = ["subreddit", "username", "title", "body"])]
    pub stdin: bool,

    /// Subreddit read off the screenshot
    #[arg(long)]
    pub subreddit: Option<String>,

    /// Username read off the screenshot
    #[arg(long)]
    pub username: Option<String>,

    /// Post title read off the screenshot
    #[arg(long)]
    pub title: Option<String>,

    /// Body or comment text read off the screenshot
    #[arg(long)]
    pub body: Option<String>,

    /// How reliable the extraction was
    #[arg(long, value_enum, default_value_t = Confidence::Medium)]
    pub confidence: Confidence,

    /// Print the per-strategy report instead of just the result
    #[arg(long)]
    pub report: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl From<Confidence> for ExtractionConfidence {
    fn from(value: Confidence) -> Self {
        match value {
            Confidence::High => ExtractionConfidence::High,
            Confidence::Medium => ExtractionConfidence::Medium,
            Confidence::Low => ExtractionConfidence::Low,
        }
    }
}

impl Cli {
    /// Config path from the flag, then the environment, then the default.
    pub fn config_path(&self, env_value: Option<String>) -> PathBuf {
        self.config
            .clone()
            .or_else(|| env_value.filter(|v| !v.is_empty()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Build the query from stdin JSON or from the field flags.
    pub fn query(&self, stdin: impl Read) -> Result<ExtractionQuery> {
        if self.stdin {
            return parse_query(stdin);
        }

        let fields = [&self.subreddit, &self.username, &self.title, &self.body];
        if fields
            .iter()
            .all(|field| field.as_deref().is_none_or(|v| v.trim().is_empty()))
        {
            bail!("No query fields given; pass --title, --subreddit, --username, --body or --stdin");
        }

        Ok(ExtractionQuery {
            subreddit: self.subreddit.clone(),
            username: self.username.clone(),
            title: self.title.clone(),
            body_snippet: self.body.clone(),
            confidence: self.confidence.into(),
        })
    }
}

fn parse_query(mut reader: impl Read) -> Result<ExtractionQuery> {
    let mut input = String::new();
    reader
        .read_to_string(&mut input)
        .context("Failed to read query from stdin")?;
    serde_json::from_str(&input).context("Failed to parse query JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sourcefinder").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_query_from_flags() {
        let cli = parse(&[
            "--subreddit",
            "cats",
            "--title",
            "My cat did something weird",
            "--confidence",
            "high",
        ]);
        let query = cli.query(std::io::empty()).unwrap();

        assert_eq!(query.subreddit.as_deref(), Some("cats"));
        assert_eq!(query.title.as_deref(), Some("My cat did something weird"));
        assert!(query.username.is_none());
        assert_eq!(query.confidence, ExtractionConfidence::High);
    }

    #[test]
    fn test_query_from_stdin() {
        let cli = parse(&["--stdin"]);
        let json = r#"{"username": "ghost123", "body_snippet": "some text", "confidence": "low"}"#;
        let query = cli.query(json.as_bytes()).unwrap();

        assert_eq!(query.username.as_deref(), Some("ghost123"));
        assert_eq!(query.body_snippet.as_deref(), Some("some text"));
        assert_eq!(query.confidence, ExtractionConfidence::Low);
    }

    #[test]
    fn test_stdin_conflicts_with_flags() {
        let result = Cli::try_parse_from(["sourcefinder", "--stdin", "--title", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_query_is_rejected() {
        let cli = parse(&[]);
        assert!(cli.query(std::io::empty()).is_err());
    }

    #[test]
    fn test_invalid_stdin_json_is_rejected() {
        let cli = parse(&["--stdin"]);
        assert!(cli.query("not json".as_bytes()).is_err());
    }

    #[test]
    fn test_config_path_precedence() {
        let cli = parse(&["--config", "/etc/sf.toml", "--title", "x"]);
        assert_eq!(
            cli.config_path(Some("/tmp/other.toml".to_string())),
            PathBuf::from("/etc/sf.toml")
        );

        let cli = parse(&["--title", "x"]);
        assert_eq!(
            cli.config_path(Some("/tmp/other.toml".to_string())),
            PathBuf::from("/tmp/other.toml")
        );
        assert_eq!(cli.config_path(None), PathBuf::from("config.toml"));
    }
}
