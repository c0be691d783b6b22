//! Client configuration error types.
//!
//! Resolution errors are raised before any transport object is built, so a
//! misconfiguration never yields a partially configured client.

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A polymorphic config node carries a `kind` this resolver does not know.
    #[error("Unsupported {node} kind '{kind}': use one of the known specializations")]
    UnsupportedVariant { node: &'static str, kind: String },

    #[error("Malformed endpoint override '{endpoint}': {source}")]
    MalformedEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid local address '{0}': expected an IP address")]
    InvalidLocalAddress(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to parse client config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn unsupported(node: &'static str, kind: impl Into<String>) -> Self {
        ConfigError::UnsupportedVariant {
            node,
            kind: kind.into(),
        }
    }
}
