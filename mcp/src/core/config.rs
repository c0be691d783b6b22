//! MCP server connection configuration.
//!
//! Describes how to reach a tool server (transport, credentials, proxy).

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::McpResult;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpServerConfig {
    pub name: String,
    #[serde(flatten)]
    pub transport: McpTransport,

    /// Per-server proxy. Omit to inherit the global proxy; set to `null`
    /// in YAML to force a direct connection.
    #[serde(default, skip_serializing_if = "ProxyOverride::is_inherit")]
    pub proxy: ProxyOverride,
}

impl McpServerConfig {
    pub fn from_yaml_str(content: &str) -> McpResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Whether connecting goes over the network (and is worth retrying).
    pub fn is_remote(&self) -> bool {
        matches!(
            self.transport,
            McpTransport::Sse { .. } | McpTransport::Streamable { .. }
        )
    }
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum McpTransport {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        envs: HashMap<String, String>,
    },
    Sse {
        url: String,
        /// Bearer token for Authorization header
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        /// Additional headers (e.g., X-API-Key, custom auth)
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        headers: HashMap<String, String>,
    },
    Streamable {
        url: String,
        /// Bearer token for Authorization header
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        /// Additional headers (e.g., X-API-Key, custom auth)
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        headers: HashMap<String, String>,
    },
}

impl fmt::Debug for McpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McpTransport::Stdio {
                command,
                args,
                envs,
            } => f
                .debug_struct("Stdio")
                .field("command", command)
                .field("args", args)
                .field("envs", &format!("{} envs", envs.len()))
                .finish(),
            McpTransport::Sse {
                url,
                token,
                headers,
            } => f
                .debug_struct("Sse")
                .field("url", url)
                .field("token", &token.as_ref().map(|_| "****"))
                .field("headers", &format!("{} headers", headers.len()))
                .finish(),
            McpTransport::Streamable {
                url,
                token,
                headers,
            } => f
                .debug_struct("Streamable")
                .field("url", url)
                .field("token", &token.as_ref().map(|_| "****"))
                .field("headers", &format!("{} headers", headers.len()))
                .finish(),
        }
    }
}

/// How a server's own `proxy` entry relates to the global proxy.
#[derive(Debug, Clone, Default)]
pub enum ProxyOverride {
    /// No `proxy` entry: use the global proxy, if any.
    #[default]
    Inherit,
    /// `proxy: null`: connect directly.
    Direct,
    Use(McpProxyConfig),
}

impl ProxyOverride {
    pub fn is_inherit(&self) -> bool {
        matches!(self, ProxyOverride::Inherit)
    }
}

impl Serialize for ProxyOverride {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProxyOverride::Use(proxy) => serializer.serialize_some(proxy),
            ProxyOverride::Inherit | ProxyOverride::Direct => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ProxyOverride {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<McpProxyConfig>::deserialize(deserializer)? {
            Some(proxy) => ProxyOverride::Use(proxy),
            None => ProxyOverride::Direct,
        })
    }
}

/// MCP-specific proxy configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct McpProxyConfig {
    /// HTTP proxy URL (e.g., "http://proxy.internal:8080")
    pub http: Option<String>,

    /// HTTPS proxy URL
    pub https: Option<String>,

    /// Comma-separated hosts to exclude from proxying
    /// Example: "localhost,127.0.0.1,*.internal,10.*"
    pub no_proxy: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl McpProxyConfig {
    /// Load proxy config from standard environment variables
    pub fn from_env() -> Option<Self> {
        let http = std::env::var("MCP_HTTP_PROXY")
            .ok()
            .or_else(|| std::env::var("HTTP_PROXY").ok());

        let https = std::env::var("MCP_HTTPS_PROXY")
            .ok()
            .or_else(|| std::env::var("HTTPS_PROXY").ok());

        let no_proxy = std::env::var("MCP_NO_PROXY")
            .ok()
            .or_else(|| std::env::var("NO_PROXY").ok());

        if http.is_some() || https.is_some() {
            Some(Self {
                http,
                https,
                no_proxy,
                username: None,
                password: None,
            })
        } else {
            None
        }
    }
}
