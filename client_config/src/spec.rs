//! Resolved client specification.
//!
//! Output of [`crate::resolver::resolve`]. Unset settings stay `None` so the
//! HTTP library applies its own defaults.

use std::{collections::BTreeMap, net::IpAddr, time::Duration};

use url::Url;

pub const USER_AGENT_HEADER: &str = "User-Agent";

/// Identifying user agent sent when the caller does not supply one.
pub const DEFAULT_USER_AGENT: &str = "Mendix-Community-Supported-Connector";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSpecification {
    pub transport: TransportSpecification,
    pub endpoint_override: Option<Url>,
    pub api_call_timeout: Option<Duration>,
    pub api_call_attempt_timeout: Option<Duration>,
    /// `None` leaves retries to the library default.
    pub retry: Option<RetrySpecification>,
    /// Always carries [`USER_AGENT_HEADER`].
    pub headers: BTreeMap<String, String>,
}

impl ClientSpecification {
    pub(crate) fn new(user_agent: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(USER_AGENT_HEADER.to_string(), user_agent.to_string());
        Self {
            transport: TransportSpecification::default(),
            endpoint_override: None,
            api_call_timeout: None,
            api_call_attempt_timeout: None,
            retry: None,
            headers,
        }
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get(USER_AGENT_HEADER).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TransportKind {
    #[default]
    Apache,
    UrlConnection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSpecification {
    Apache(ApacheTransportSpec),
    UrlConnection(UrlTransportSpec),
}

impl Default for TransportSpecification {
    fn default() -> Self {
        TransportSpecification::Apache(ApacheTransportSpec::default())
    }
}

impl TransportSpecification {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportSpecification::Apache(_) => TransportKind::Apache,
            TransportSpecification::UrlConnection(_) => TransportKind::UrlConnection,
        }
    }

    /// True when no tuning field is set.
    pub fn is_unconfigured(&self) -> bool {
        match self {
            TransportSpecification::Apache(spec) => *spec == ApacheTransportSpec::default(),
            TransportSpecification::UrlConnection(spec) => *spec == UrlTransportSpec::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApacheTransportSpec {
    pub connection_acquisition_timeout: Option<Duration>,
    pub connection_max_idle_time: Option<Duration>,
    pub connection_timeout: Option<Duration>,
    pub connection_time_to_live: Option<Duration>,
    pub socket_timeout: Option<Duration>,
    pub local_address: Option<IpAddr>,
    pub max_connections: Option<u32>,
    pub expect_continue_enabled: Option<bool>,
    pub tcp_keep_alive: Option<bool>,
    pub use_idle_connection_reaper: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlTransportSpec {
    pub connection_timeout: Option<Duration>,
    pub socket_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrySpecification {
    Never,
    UpTo { max_retries: u32 },
}

impl RetrySpecification {
    pub fn max_retries(&self) -> u32 {
        match self {
            RetrySpecification::Never => 0,
            RetrySpecification::UpTo { max_retries } => *max_retries,
        }
    }
}
