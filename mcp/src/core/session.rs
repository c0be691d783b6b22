//! Session layer: connects to MCP servers and tracks the live clients per
//! session id in a shared [`McpClientRegistry`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{
    config::{McpProxyConfig, McpServerConfig},
    connect::connect_server,
    registry::{McpClient, McpClientRegistry, SessionId},
};
use crate::error::{McpError, McpResult};

pub struct McpSessionManager {
    registry: Arc<McpClientRegistry>,
    global_proxy: Option<McpProxyConfig>,
}

impl McpSessionManager {
    pub fn new(registry: Arc<McpClientRegistry>, global_proxy: Option<McpProxyConfig>) -> Self {
        Self {
            registry,
            global_proxy,
        }
    }

    /// Proxy settings come from the environment.
    pub fn from_env(registry: Arc<McpClientRegistry>) -> Self {
        Self::new(registry, McpProxyConfig::from_env())
    }

    /// Connect to `config` and register the client under `id`.
    ///
    /// A client already registered under `id` is replaced, not closed; its
    /// holders still own it.
    pub async fn open_session(
        &self,
        id: SessionId,
        config: &McpServerConfig,
    ) -> McpResult<Arc<McpClient>> {
        let client = Arc::new(connect_server(config, self.global_proxy.as_ref()).await?);
        self.registry.put(id, Arc::clone(&client));
        info!(session = id, server = %config.name, "opened MCP session");
        Ok(client)
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<McpClient>> {
        self.registry.get(&id)
    }

    pub fn require_session(&self, id: SessionId) -> McpResult<Arc<McpClient>> {
        self.session(id)
            .ok_or_else(|| McpError::SessionNotFound(id.to_string()))
    }

    /// Unregister `client` if it is still the one held for `id`, then tear
    /// it down. Returns whether the registry entry was removed.
    pub async fn close_session(&self, id: SessionId, client: Arc<McpClient>) -> bool {
        let removed = self.registry.remove_if_matches(&id, &client);
        if !removed {
            debug!(session = id, "close skipped: session holds a different client");
        }

        match Arc::try_unwrap(client) {
            Ok(client) => {
                if let Err(e) = client.cancel().await {
                    warn!(session = id, "Error disconnecting MCP client: {}", e);
                }
            }
            Err(_) => {
                debug!(
                    session = id,
                    "MCP client still in use, closes with its last reference"
                );
            }
        }

        removed
    }

    pub fn registry(&self) -> Arc<McpClientRegistry> {
        Arc::clone(&self.registry)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::core::config::{McpTransport, ProxyOverride};

    fn missing_command() -> McpServerConfig {
        McpServerConfig {
            name: "missing".to_string(),
            transport: McpTransport::Stdio {
                command: "/nonexistent/mcp-server-binary".to_string(),
                args: vec![],
                envs: HashMap::new(),
            },
            proxy: ProxyOverride::Inherit,
        }
    }

    #[tokio::test]
    async fn test_failed_open_registers_nothing() {
        let registry = Arc::new(McpClientRegistry::new());
        let manager = McpSessionManager::new(Arc::clone(&registry), None);

        assert!(manager.open_session(1, &missing_command()).await.is_err());
        assert!(registry.is_empty());
        assert!(manager.session(1).is_none());
    }

    #[test]
    fn test_require_missing_session() {
        let manager = McpSessionManager::new(Arc::new(McpClientRegistry::new()), None);

        let err = manager.require_session(42).unwrap_err();
        assert!(matches!(err, McpError::SessionNotFound(ref id) if id == "42"));
    }

    #[test]
    fn test_registry_is_shared() {
        let registry = Arc::new(McpClientRegistry::new());
        let manager = McpSessionManager::new(Arc::clone(&registry), None);
        assert!(Arc::ptr_eq(&manager.registry(), &registry));
    }
}
