//! Builds a `reqwest` client from a resolved [`ClientSpecification`].

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::{
    error::{ConfigError, ConfigResult},
    spec::{ApacheTransportSpec, ClientSpecification, TransportSpecification, UrlTransportSpec},
};

/// Keep-alive probe interval used when `tcp_keep_alive` is enabled.
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

pub fn build_http_client(spec: &ClientSpecification) -> ConfigResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().default_headers(build_headers(spec)?);

    if let Some(timeout) = spec.api_call_timeout {
        builder = builder.timeout(timeout);
    }

    builder = match &spec.transport {
        TransportSpecification::Apache(apache) => apply_apache(builder, apache),
        TransportSpecification::UrlConnection(url) => apply_url_connection(builder, url),
    };

    Ok(builder.build()?)
}

fn build_headers(spec: &ClientSpecification) -> ConfigResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (key, value) in &spec.headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| ConfigError::InvalidHeader(format!("header name '{}': {}", key, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ConfigError::InvalidHeader(format!("header '{}' value: {}", key, e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn apply_apache(
    mut builder: reqwest::ClientBuilder,
    spec: &ApacheTransportSpec,
) -> reqwest::ClientBuilder {
    debug!("building pooled http client");

    if let Some(timeout) = spec.connection_timeout {
        builder = builder.connect_timeout(timeout);
    }
    if let Some(timeout) = spec.socket_timeout {
        builder = builder.read_timeout(timeout);
    }
    if let Some(idle) = spec.connection_max_idle_time {
        builder = builder.pool_idle_timeout(idle);
    }
    // reqwest has no total connection cap; the closest knob bounds idle
    // connections per host.
    if let Some(max) = spec.max_connections {
        debug!(
            max_connections = max,
            "max_connections applied as idle connections per host"
        );
        builder = builder.pool_max_idle_per_host(max as usize);
    }
    if let Some(address) = spec.local_address {
        builder = builder.local_address(address);
    }
    match spec.tcp_keep_alive {
        Some(true) => builder = builder.tcp_keepalive(TCP_KEEPALIVE_INTERVAL),
        Some(false) => builder = builder.tcp_keepalive(None::<Duration>),
        None => {}
    }

    // No reqwest knob for these.
    if spec.connection_acquisition_timeout.is_some() {
        debug!("connection_acquisition_timeout not supported by http client, skipped");
    }
    if spec.connection_time_to_live.is_some() {
        debug!("connection_time_to_live not supported by http client, skipped");
    }
    if spec.expect_continue_enabled.is_some() {
        debug!("expect_continue_enabled not supported by http client, skipped");
    }
    if spec.use_idle_connection_reaper.is_some() {
        debug!("use_idle_connection_reaper not supported by http client, skipped");
    }

    builder
}

fn apply_url_connection(
    mut builder: reqwest::ClientBuilder,
    spec: &UrlTransportSpec,
) -> reqwest::ClientBuilder {
    debug!("building non-pooled http client");

    builder = builder.pool_max_idle_per_host(0);
    if let Some(timeout) = spec.connection_timeout {
        builder = builder.connect_timeout(timeout);
    }
    if let Some(timeout) = spec.socket_timeout {
        builder = builder.read_timeout(timeout);
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{
            ApacheTransportConfig, ClientConfig, TransportConfig, TriState, UrlTransportConfig,
        },
        resolver::resolve,
        spec::USER_AGENT_HEADER,
    };

    #[test]
    fn test_build_default_client() {
        let spec = resolve(None, None).unwrap();
        assert!(build_http_client(&spec).is_ok());
    }

    #[test]
    fn test_build_apache_client() {
        let config = ClientConfig {
            api_call_timeout_ms: Some(30_000),
            transport: Some(TransportConfig::Apache(ApacheTransportConfig {
                connection_timeout_ms: Some(5000),
                socket_timeout_ms: Some(10_000),
                connection_max_idle_time_ms: Some(60_000),
                connection_time_to_live_ms: Some(120_000),
                max_connections: Some(16),
                local_address: Some("127.0.0.1".to_string()),
                tcp_keep_alive: TriState::True,
                expect_continue_enabled: TriState::False,
                ..Default::default()
            })),
            ..Default::default()
        };
        let spec = resolve(Some(&config), Some("MyConnector/2.0")).unwrap();
        assert!(build_http_client(&spec).is_ok());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_max_connections_logged_as_idle_cap() {
        let config = ClientConfig {
            transport: Some(TransportConfig::Apache(ApacheTransportConfig {
                max_connections: Some(8),
                ..Default::default()
            })),
            ..Default::default()
        };
        let spec = resolve(Some(&config), None).unwrap();

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let client = tracing::subscriber::with_default(subscriber, || build_http_client(&spec));
        assert!(client.is_ok());

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(
            output.contains("max_connections applied as idle connections per host"),
            "missing log line in: {}",
            output
        );
    }

    #[test]
    fn test_build_url_connection_client() {
        let config = ClientConfig {
            transport: Some(TransportConfig::UrlConnection(UrlTransportConfig {
                connection_timeout_ms: Some(1000),
                socket_timeout_ms: Some(2000),
            })),
            ..Default::default()
        };
        let spec = resolve(Some(&config), None).unwrap();
        assert!(build_http_client(&spec).is_ok());
    }

    #[test]
    fn test_invalid_header_value() {
        let mut spec = resolve(None, None).unwrap();
        spec.headers
            .insert(USER_AGENT_HEADER.to_string(), "bad\nagent".to_string());

        let err = build_http_client(&spec).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHeader(_)));
    }
}
