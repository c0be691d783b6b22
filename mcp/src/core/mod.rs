//! Core MCP client infrastructure.

pub mod config;
pub mod connect;
pub mod proxy;
pub mod registry;
pub mod session;

pub use config::{McpProxyConfig, McpServerConfig, McpTransport, ProxyOverride};
pub use connect::connect_server;
pub use registry::{ClientRegistry, McpClient, McpClientRegistry, SessionId};
pub use session::McpSessionManager;
