//! Typed errors for configuration, transcoding and remote AI services.
//!
//! Orchestration code works with `anyhow::Result`; these types exist where a
//! caller has to tell failure kinds apart (a rate limit is skipped, not failed).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("ffmpeg was not found; install it or set media.ffmpeg_path")]
    NotInstalled,

    #[error("failed to run ffmpeg: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("ffmpeg exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("ffmpeg did not produce {0}")]
    MissingOutput(PathBuf),
}

/// Failure talking to the speech-to-text or text-generation service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service} rate limit exceeded: {message}")]
    RateLimited {
        service: &'static str,
        message: String,
    },

    #[error("{service} request failed with status {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lists_every_key() {
        let err = ConfigError::Missing(vec!["OPENAI_API_KEY", "CONFLUENCE_URL"]);
        assert_eq!(
            err.to_string(),
            "missing required configuration: OPENAI_API_KEY, CONFLUENCE_URL"
        );
    }

    #[test]
    fn test_rate_limited_detection() {
        let limited = ServiceError::RateLimited {
            service: "OpenAI",
            message: "slow down".to_string(),
        };
        let api = ServiceError::Api {
            service: "OpenAI",
            status: 500,
            message: "boom".to_string(),
        };
        assert!(limited.is_rate_limited());
        assert!(!api.is_rate_limited());
    }
}
