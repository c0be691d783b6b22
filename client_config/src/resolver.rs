//! Configuration resolution.
//!
//! Pure functions from a [`ClientConfig`] tree to a [`ClientSpecification`].
//! Missing optional nodes fall back to defaults; unknown variant kinds are
//! rejected so schema extensions are never silently ignored.

use std::{net::IpAddr, time::Duration};

use tracing::{debug, trace};
use url::Url;

use crate::{
    config::{
        ApacheTransportConfig, ClientConfig, ClientKind, RetryPolicyConfig, TransportConfig,
        TriState, UrlTransportConfig,
    },
    error::{ConfigError, ConfigResult},
    spec::{
        ApacheTransportSpec, ClientSpecification, RetrySpecification, TransportSpecification,
        UrlTransportSpec, DEFAULT_USER_AGENT,
    },
};

/// Resolve a configuration tree into a client specification.
///
/// `header_override` replaces the default user agent when it is not blank.
pub fn resolve(
    config: Option<&ClientConfig>,
    header_override: Option<&str>,
) -> ConfigResult<ClientSpecification> {
    let user_agent = header_override
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(DEFAULT_USER_AGENT);
    trace!(user_agent, "header on client set");

    let mut spec = ClientSpecification::new(user_agent);

    let Some(config) = config else {
        debug!("no client config: default transport");
        return Ok(spec);
    };

    let transport = resolve_transport(config.transport.as_ref())?;
    let retry = config.retry_policy.as_ref().map(resolve_retry).transpose()?;
    let endpoint_override = resolve_endpoint(Some(config))?;

    spec.transport = transport;
    spec.endpoint_override = endpoint_override;
    spec.api_call_timeout = duration_field("api_call_timeout", config.api_call_timeout_ms);

    match config.kind {
        ClientKind::Sdk => {
            spec.api_call_attempt_timeout = duration_field(
                "api_call_attempt_timeout",
                config.api_call_attempt_timeout_ms,
            );
            spec.retry = retry;
        }
        ClientKind::Basic => {
            if config.api_call_attempt_timeout_ms.is_some() || retry.is_some() {
                debug!("attempt timeout and retry policy only apply to sdk clients, ignored");
            }
        }
    }

    Ok(spec)
}

/// Resolve the endpoint override.
///
/// Returns `None` when there is no config or the endpoint is absent or blank.
pub fn resolve_endpoint(config: Option<&ClientConfig>) -> ConfigResult<Option<Url>> {
    let Some(endpoint) = config
        .and_then(|config| config.endpoint_url.as_deref())
        .map(str::trim)
        .filter(|endpoint| !endpoint.is_empty())
    else {
        return Ok(None);
    };

    let url = Url::parse(endpoint).map_err(|source| ConfigError::MalformedEndpoint {
        endpoint: endpoint.to_string(),
        source,
    })?;
    trace!(endpoint = %url, "endpoint override set");
    Ok(Some(url))
}

pub fn resolve_transport(
    config: Option<&TransportConfig>,
) -> ConfigResult<TransportSpecification> {
    match config {
        None => {
            debug!("no transport config: default apache transport");
            Ok(TransportSpecification::default())
        }
        Some(TransportConfig::Apache(apache)) => {
            debug!("apache transport config found");
            resolve_apache(apache).map(TransportSpecification::Apache)
        }
        Some(TransportConfig::UrlConnection(url)) => {
            debug!("url connection transport config found");
            let spec = resolve_url_connection(url);
            Ok(TransportSpecification::UrlConnection(spec))
        }
        Some(TransportConfig::Unrecognized(kind)) => {
            Err(ConfigError::unsupported("transport", kind))
        }
    }
}

pub fn resolve_retry(config: &RetryPolicyConfig) -> ConfigResult<RetrySpecification> {
    match config {
        RetryPolicyConfig::NoRetry => {
            debug!("set no retry policy");
            Ok(RetrySpecification::Never)
        }
        RetryPolicyConfig::FixedCount(fixed) => {
            debug!(max_retries = fixed.max_retries, "set fixed count retry policy");
            Ok(RetrySpecification::UpTo {
                max_retries: fixed.max_retries,
            })
        }
        RetryPolicyConfig::Unrecognized(kind) => {
            Err(ConfigError::unsupported("retry policy", kind))
        }
    }
}

fn resolve_apache(config: &ApacheTransportConfig) -> ConfigResult<ApacheTransportSpec> {
    let max_connections = config.max_connections;
    if let Some(max) = max_connections {
        trace!(max_connections = max, "max connections set");
    }

    Ok(ApacheTransportSpec {
        connection_acquisition_timeout: duration_field(
            "connection_acquisition_timeout",
            config.connection_acquisition_timeout_ms,
        ),
        connection_max_idle_time: duration_field(
            "connection_max_idle_time",
            config.connection_max_idle_time_ms,
        ),
        connection_timeout: duration_field("connection_timeout", config.connection_timeout_ms),
        connection_time_to_live: duration_field(
            "connection_time_to_live",
            config.connection_time_to_live_ms,
        ),
        socket_timeout: duration_field("socket_timeout", config.socket_timeout_ms),
        local_address: parse_local_address(config.local_address.as_deref())?,
        max_connections,
        expect_continue_enabled: flag_field(
            "expect_continue_enabled",
            config.expect_continue_enabled,
        ),
        tcp_keep_alive: flag_field("tcp_keep_alive", config.tcp_keep_alive),
        use_idle_connection_reaper: flag_field(
            "use_idle_connection_reaper",
            config.use_idle_connection_reaper,
        ),
    })
}

fn resolve_url_connection(config: &UrlTransportConfig) -> UrlTransportSpec {
    UrlTransportSpec {
        connection_timeout: duration_field("connection_timeout", config.connection_timeout_ms),
        socket_timeout: duration_field("socket_timeout", config.socket_timeout_ms),
    }
}

fn duration_field(field: &'static str, millis: Option<u64>) -> Option<Duration> {
    let ms = millis?;
    trace!(field, ms, "timeout set");
    Some(Duration::from_millis(ms))
}

/// `Unset` stays absent so the transport default applies.
fn flag_field(field: &'static str, value: TriState) -> Option<bool> {
    let flag = value.as_option();
    if let Some(flag) = flag {
        trace!(field, flag, "flag set");
    }
    flag
}

fn parse_local_address(raw: Option<&str>) -> ConfigResult<Option<IpAddr>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    let address = raw
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::InvalidLocalAddress(raw.to_string()))?;
    trace!(%address, "local address set");
    Ok(Some(address))
}
