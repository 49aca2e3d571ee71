//! Configuration error types.

use thiserror::Error;

/// Errors raised while reading typed settings out of a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL '{value}' for key '{key}': {source}")]
    InvalidUrl {
        key: String,
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid boolean '{value}' for key '{key}' (expected true or false)")]
    InvalidBool { key: String, value: String },

    #[error("directory URL '{0}' must use http or https")]
    UnsupportedScheme(String),
}
