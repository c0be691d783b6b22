//! MCP error types.

use thiserror::Error;

pub type McpResult<T> = Result<T, McpError>;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Server could not be reached; a later attempt may succeed.
    #[error("Server unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
