//! Client configuration resolution.
//!
//! ## Modules
//!
//! - [`config`]: Authored configuration tree (client, transport, retry policy)
//! - [`resolver`]: Pure resolution into a [`ClientSpecification`]
//! - [`spec`]: Resolved, read-only client specification
//! - [`http`]: Builds an HTTP client from a specification

pub mod config;
pub mod error;
pub mod http;
pub mod resolver;
pub mod spec;

pub use config::{
    ApacheTransportConfig, ClientConfig, ClientKind, FixedCountRetryConfig, RetryPolicyConfig,
    TransportConfig, TriState, UrlTransportConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use http::build_http_client;
pub use resolver::{resolve, resolve_endpoint, resolve_retry, resolve_transport};
pub use spec::{
    ApacheTransportSpec, ClientSpecification, RetrySpecification, TransportKind,
    TransportSpecification, UrlTransportSpec, DEFAULT_USER_AGENT, USER_AGENT_HEADER,
};
