//! HTTP proxy settings for remote MCP transports.

use super::config::{McpProxyConfig, McpServerConfig, ProxyOverride};
use crate::error::{McpError, McpResult};

/// Pick the proxy for a server: its own `proxy` entry wins, otherwise the
/// global one. `None` means a direct connection.
pub(crate) fn resolve_proxy_config<'a>(
    server_config: &'a McpServerConfig,
    global_proxy: Option<&'a McpProxyConfig>,
) -> Option<&'a McpProxyConfig> {
    match &server_config.proxy {
        ProxyOverride::Inherit => global_proxy,
        ProxyOverride::Direct => None,
        ProxyOverride::Use(proxy) => Some(proxy),
    }
}

/// Apply proxy settings to a builder without building it, so auth headers
/// and timeouts can still be layered on afterwards.
pub(crate) fn apply_proxy_to_builder(
    mut builder: reqwest::ClientBuilder,
    proxy_cfg: &McpProxyConfig,
) -> McpResult<reqwest::ClientBuilder> {
    if let Some(ref http_proxy) = proxy_cfg.http {
        let proxy = reqwest::Proxy::http(http_proxy)
            .map_err(|e| McpError::Config(format!("Invalid HTTP proxy: {}", e)))?;
        builder = builder.proxy(decorate(proxy, proxy_cfg));
    }

    if let Some(ref https_proxy) = proxy_cfg.https {
        let proxy = reqwest::Proxy::https(https_proxy)
            .map_err(|e| McpError::Config(format!("Invalid HTTPS proxy: {}", e)))?;
        builder = builder.proxy(decorate(proxy, proxy_cfg));
    }

    Ok(builder)
}

/// Exclusions and basic auth apply to both schemes.
fn decorate(mut proxy: reqwest::Proxy, proxy_cfg: &McpProxyConfig) -> reqwest::Proxy {
    if let Some(ref no_proxy) = proxy_cfg.no_proxy {
        proxy = proxy.no_proxy(reqwest::NoProxy::from_string(no_proxy));
    }
    if let (Some(username), Some(password)) = (&proxy_cfg.username, &proxy_cfg.password) {
        proxy = proxy.basic_auth(username, password);
    }
    proxy
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::core::config::McpTransport;

    fn sse_server(proxy: ProxyOverride) -> McpServerConfig {
        McpServerConfig {
            name: "test".to_string(),
            transport: McpTransport::Sse {
                url: "http://localhost:3000/sse".to_string(),
                token: None,
                headers: HashMap::new(),
            },
            proxy,
        }
    }

    fn http_proxy(url: &str) -> McpProxyConfig {
        McpProxyConfig {
            http: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_proxy_no_config() {
        let server = sse_server(ProxyOverride::Inherit);
        assert!(resolve_proxy_config(&server, None).is_none());
    }

    #[test]
    fn test_resolve_proxy_global_only() {
        let server = sse_server(ProxyOverride::Inherit);
        let global = http_proxy("http://global-proxy:8080");

        let result = resolve_proxy_config(&server, Some(&global)).expect("global proxy");
        assert_eq!(result.http.as_deref(), Some("http://global-proxy:8080"));
    }

    #[test]
    fn test_resolve_proxy_server_override() {
        let server = sse_server(ProxyOverride::Use(http_proxy("http://server-proxy:9090")));
        let global = http_proxy("http://global-proxy:8080");

        let result = resolve_proxy_config(&server, Some(&global)).expect("server proxy");
        assert_eq!(
            result.http.as_deref(),
            Some("http://server-proxy:9090"),
            "Server proxy should override global"
        );
    }

    #[test]
    fn test_resolve_proxy_null_entry_forces_direct() {
        let server = McpServerConfig::from_yaml_str(
            "name: test\nprotocol: sse\nurl: \"http://localhost:3000/sse\"\nproxy: null\n",
        )
        .unwrap();
        let global = http_proxy("http://global-proxy:8080");

        assert!(resolve_proxy_config(&server, Some(&global)).is_none());
    }

    #[test]
    fn test_apply_proxy_with_exclusions_and_auth() {
        let proxy = McpProxyConfig {
            http: Some("http://proxy.example.com:8080".to_string()),
            https: Some("http://proxy.example.com:8443".to_string()),
            no_proxy: Some("localhost,127.0.0.1".to_string()),
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
        };

        let builder = apply_proxy_to_builder(reqwest::Client::builder(), &proxy)
            .expect("Should apply proxy to builder");
        assert!(builder.build().is_ok(), "Should build client");
    }

    #[test]
    fn test_apply_proxy_invalid_url() {
        let proxy = http_proxy("://invalid");

        let result = apply_proxy_to_builder(reqwest::Client::builder(), &proxy);
        assert!(matches!(result, Err(McpError::Config(_))));
    }
}
