//! MCP server exposing the gateway tools over stdio.

use crate::dispatcher::{ToolDispatcher, ToolReply};
use crate::error::{McpError, McpResult};
use crate::tools::{DescribePolicyRequest, QueryAuditRequest, UseSecretRequest};
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ErrorData as RmcpError},
    tool, tool_handler, tool_router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// MCP server wrapping the tool dispatcher.
#[derive(Clone)]
pub struct VaultServer {
    dispatcher: Arc<ToolDispatcher>,
    server_info: ServerInfo,
    tool_router: ToolRouter<VaultServer>,
}

/// Server identity advertised to clients.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "vaultgate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Vaultgate - mediate outbound HTTP actions with secrets the caller never sees"
                .to_string(),
        }
    }
}

#[tool_router]
impl VaultServer {
    /// Create a server over a dispatcher.
    pub fn new(dispatcher: Arc<ToolDispatcher>) -> Self {
        Self {
            dispatcher,
            server_info: ServerInfo::default(),
            tool_router: Self::tool_router(),
        }
    }

    /// Create a server with custom identity.
    pub fn with_info(dispatcher: Arc<ToolDispatcher>, server_info: ServerInfo) -> Self {
        let mut server = Self::new(dispatcher);
        server.server_info = server_info;
        server
    }

    /// Server identity.
    pub fn info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Serve via stdio (stdin/stdout), the standard MCP transport.
    ///
    /// Stdout belongs to the protocol; anything the gateway wants to say
    /// to a human goes to stderr through `tracing`.
    pub async fn serve_stdio(self) -> McpResult<()> {
        info!(
            server = %self.server_info.name,
            version = %self.server_info.version,
            "Starting MCP server on stdio"
        );

        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| McpError::ServerError(format!("Failed to start server: {e}")))?;

        service
            .waiting()
            .await
            .map_err(|e| McpError::ServerError(format!("Server error: {e}")))?;

        info!("MCP server shutdown");
        Ok(())
    }

    /// Wrap a dispatcher reply into the wire envelope.
    fn envelope(reply: ToolReply) -> Result<CallToolResult, RmcpError> {
        match reply {
            ToolReply::Success { result } => {
                let text =
                    serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string());
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            ToolReply::Failure { code, message } => {
                let text = json!({"error": {"code": code, "message": message}}).to_string();
                Ok(CallToolResult::error(vec![Content::text(text)]))
            }
        }
    }

    #[tool(
        name = "discover_secrets",
        description = "List the secret identifiers this gateway can mediate, with availability and description. Values are never revealed."
    )]
    async fn discover_secrets(&self) -> Result<CallToolResult, RmcpError> {
        debug!("discover_secrets");
        let reply = self.dispatcher.dispatch("discover_secrets", json!({})).await;
        Self::envelope(reply)
    }

    #[tool(
        name = "describe_policy",
        description = "Describe the policy gating a secret: allowed actions, allowed domains, rate limit, and expiry."
    )]
    async fn describe_policy(
        &self,
        Parameters(request): Parameters<DescribePolicyRequest>,
    ) -> Result<CallToolResult, RmcpError> {
        debug!(secret_id = %request.secret_id, "describe_policy");
        let args = serde_json::to_value(&request).unwrap_or_else(|_| json!({}));
        let reply = self.dispatcher.dispatch("describe_policy", args).await;
        Self::envelope(reply)
    }

    #[tool(
        name = "use_secret",
        description = "Perform an allowed outbound HTTP action with a secret injected server-side. The response is sanitized; the secret value never appears."
    )]
    async fn use_secret(
        &self,
        Parameters(request): Parameters<UseSecretRequest>,
    ) -> Result<CallToolResult, RmcpError> {
        debug!(secret_id = %request.secret_id, "use_secret");
        let args = serde_json::to_value(&request).unwrap_or_else(|_| json!({}));
        let reply = self.dispatcher.dispatch("use_secret", args).await;
        Self::envelope(reply)
    }

    #[tool(
        name = "query_audit",
        description = "Query the audit trail with filters and pagination, newest entries first."
    )]
    async fn query_audit(
        &self,
        Parameters(request): Parameters<QueryAuditRequest>,
    ) -> Result<CallToolResult, RmcpError> {
        debug!("query_audit");
        let args = serde_json::to_value(&request).unwrap_or_else(|_| json!({}));
        let reply = self.dispatcher.dispatch("query_audit", args).await;
        Self::envelope(reply)
    }
}

/// Implement the ServerHandler trait for MCP protocol support.
#[tool_handler]
impl ServerHandler for VaultServer {
    // The tool_handler macro implements the required methods from the
    // #[tool] annotations above.
}
