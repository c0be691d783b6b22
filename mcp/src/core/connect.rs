//! Establishing MCP client sessions over stdio, SSE and streamable HTTP.

use std::{collections::HashMap, time::Duration};

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::StatusCode;
use rmcp::{
    service::ClientInitializeError,
    transport::{
        sse_client::{SseClientConfig, SseTransportError},
        streamable_http_client::{StreamableHttpClientTransportConfig, StreamableHttpError},
        ConfigureCommandExt, SseClientTransport, StreamableHttpClientTransport, TokioChildProcess,
    },
    ServiceExt,
};
use tracing::{error, info, warn};

use super::{
    config::{McpProxyConfig, McpServerConfig, McpTransport},
    proxy::{apply_proxy_to_builder, resolve_proxy_config},
    registry::McpClient,
};
use crate::error::{McpError, McpResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_INITIAL_INTERVAL: Duration = Duration::from_secs(1);
const RETRY_MAX_INTERVAL: Duration = Duration::from_secs(30);
const RETRY_MAX_ELAPSED: Duration = Duration::from_secs(30);

/// Connect to a server. Remote transports are retried with exponential
/// backoff; stdio gets a single attempt.
pub async fn connect_server(
    config: &McpServerConfig,
    global_proxy: Option<&McpProxyConfig>,
) -> McpResult<McpClient> {
    if config.is_remote() {
        connect_with_backoff(config, global_proxy, default_backoff()).await
    } else {
        connect_once(config, global_proxy).await
    }
}

fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(RETRY_INITIAL_INTERVAL)
        .with_max_interval(RETRY_MAX_INTERVAL)
        .with_max_elapsed_time(Some(RETRY_MAX_ELAPSED))
        .build()
}

async fn connect_with_backoff(
    config: &McpServerConfig,
    global_proxy: Option<&McpProxyConfig>,
    backoff: ExponentialBackoff,
) -> McpResult<McpClient> {
    backoff::future::retry(backoff, || async {
        connect_once(config, global_proxy).await.map_err(|e| {
            if is_permanent_error(&e) {
                error!(
                    "Permanent error connecting to '{}': {} - not retrying",
                    config.name, e
                );
                backoff::Error::permanent(e)
            } else {
                warn!("Failed to connect to '{}', retrying: {}", config.name, e);
                backoff::Error::transient(e)
            }
        })
    })
    .await
}

/// Errors that another attempt cannot fix. Only [`McpError::Unavailable`]
/// is retried.
pub(crate) fn is_permanent_error(error: &McpError) -> bool {
    !matches!(error, McpError::Unavailable(_))
}

/// Map a failed handshake to `Unavailable` when the server could not be
/// reached, otherwise to `ConnectionFailed`.
fn initialize_failed(transport: &str, error: ClientInitializeError) -> McpError {
    let message = format!("initialize {} client: {}", transport, error);
    if is_transient_initialize(&error) {
        McpError::Unavailable(message)
    } else {
        McpError::ConnectionFailed(message)
    }
}

fn is_transient_initialize(error: &ClientInitializeError) -> bool {
    match error {
        ClientInitializeError::ConnectionClosed(_) => true,
        ClientInitializeError::TransportError { error, .. } => {
            let inner = &*error.error;
            if let Some(e) = inner.downcast_ref::<StreamableHttpError<reqwest::Error>>() {
                is_transient_streamable(e)
            } else if let Some(e) = inner.downcast_ref::<SseTransportError<reqwest::Error>>() {
                is_transient_sse(e)
            } else if let Some(e) = inner.downcast_ref::<std::io::Error>() {
                is_transient_io(e)
            } else {
                false
            }
        }
        _ => false,
    }
}

fn is_transient_streamable(error: &StreamableHttpError<reqwest::Error>) -> bool {
    match error {
        StreamableHttpError::Client(e) => is_transient_http(e),
        StreamableHttpError::Io(e) => is_transient_io(e),
        StreamableHttpError::UnexpectedEndOfStream
        | StreamableHttpError::TransportChannelClosed
        | StreamableHttpError::TokioJoinError(_) => true,
        _ => false,
    }
}

fn is_transient_sse(error: &SseTransportError<reqwest::Error>) -> bool {
    match error {
        SseTransportError::Client(e) => is_transient_http(e),
        SseTransportError::Io(e) => is_transient_io(e),
        SseTransportError::UnexpectedEndOfStream => true,
        _ => false,
    }
}

/// Refused, reset and timed-out requests and 5xx/408/429 responses are
/// retried. Builder errors and other statuses are not.
fn is_transient_http(error: &reqwest::Error) -> bool {
    if error.is_builder() {
        return false;
    }
    match error.status() {
        Some(status) => {
            status.is_server_error()
                || status == StatusCode::REQUEST_TIMEOUT
                || status == StatusCode::TOO_MANY_REQUESTS
        }
        None => error.is_connect() || error.is_timeout() || error.is_request() || error.is_body(),
    }
}

fn is_transient_io(error: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    matches!(
        error.kind(),
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut
            | ErrorKind::UnexpectedEof
            | ErrorKind::Interrupted
    )
}

async fn connect_once(
    config: &McpServerConfig,
    global_proxy: Option<&McpProxyConfig>,
) -> McpResult<McpClient> {
    info!(
        "Connecting to MCP server '{}' via {:?}",
        config.name, config.transport
    );

    match &config.transport {
        McpTransport::Stdio {
            command,
            args,
            envs,
        } => {
            let transport =
                TokioChildProcess::new(tokio::process::Command::new(command).configure(|cmd| {
                    cmd.args(args)
                        .envs(envs.iter())
                        .stderr(std::process::Stdio::inherit());
                }))
                .map_err(|e| McpError::Transport(format!("create stdio transport: {}", e)))?;

            let client = ()
                .serve(transport)
                .await
                .map_err(|e| initialize_failed("stdio", e))?;

            info!("Connected to stdio server '{}'", config.name);
            Ok(client)
        }

        McpTransport::Sse {
            url,
            token,
            headers,
        } => {
            let proxy_config = resolve_proxy_config(config, global_proxy);
            let http_client = build_http_client(proxy_config, token, headers)?;

            let sse_config = SseClientConfig {
                sse_endpoint: url.clone().into(),
                ..Default::default()
            };
            let transport = SseClientTransport::start_with_client(http_client, sse_config)
                .await
                .map_err(|e| {
                    let message = format!("create SSE transport: {}", e);
                    if is_transient_sse(&e) {
                        McpError::Unavailable(message)
                    } else {
                        McpError::Transport(message)
                    }
                })?;

            let client = ()
                .serve(transport)
                .await
                .map_err(|e| initialize_failed("SSE", e))?;

            info!("Connected to SSE server '{}' at {}", config.name, url);
            Ok(client)
        }

        McpTransport::Streamable {
            url,
            token,
            headers,
        } => {
            let proxy_config = resolve_proxy_config(config, global_proxy);
            let http_client = build_http_client(proxy_config, token, headers)?;

            let transport = StreamableHttpClientTransport::with_client(
                http_client,
                StreamableHttpClientTransportConfig::with_uri(url.as_str()),
            );

            let client = ()
                .serve(transport)
                .await
                .map_err(|e| initialize_failed("streamable", e))?;

            info!(
                "Connected to streamable HTTP server '{}' at {}",
                config.name, url
            );
            Ok(client)
        }
    }
}

fn build_request_headers(
    token: &Option<String>,
    custom_headers: &HashMap<String, String>,
) -> McpResult<reqwest::header::HeaderMap> {
    let mut headers = reqwest::header::HeaderMap::new();

    if let Some(tok) = token {
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", tok)
                .parse()
                .map_err(|e| McpError::Transport(format!("auth token: {}", e)))?,
        );
    }

    for (key, value) in custom_headers {
        headers.insert(
            reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| McpError::Transport(format!("header name: {}", e)))?,
            value
                .parse()
                .map_err(|e| McpError::Transport(format!("header value: {}", e)))?,
        );
    }

    Ok(headers)
}

fn build_http_client(
    proxy_config: Option<&McpProxyConfig>,
    token: &Option<String>,
    custom_headers: &HashMap<String, String>,
) -> McpResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT);

    if let Some(proxy_cfg) = proxy_config {
        builder = apply_proxy_to_builder(builder, proxy_cfg)?;
    }

    let req_headers = build_request_headers(token, custom_headers)?;
    if !req_headers.is_empty() {
        builder = builder.default_headers(req_headers);
    }

    builder
        .build()
        .map_err(|e| McpError::Transport(format!("build HTTP client: {}", e)))
}
