//! Model Context Protocol (MCP) client connections and session registry.
//!
//! ## Modules
//!
//! - [`core`]: server config, proxy handling, connect-with-retry, the
//!   session-keyed client registry and the session manager on top of it

pub mod core;
pub mod error;

pub use core::{
    config, connect_server, registry, ClientRegistry, McpClient, McpClientRegistry,
    McpProxyConfig, McpServerConfig, McpSessionManager, McpTransport, ProxyOverride, SessionId,
};
pub use error::{McpError, McpResult};
