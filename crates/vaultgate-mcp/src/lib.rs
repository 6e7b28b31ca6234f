//! # Vaultgate MCP
//!
//! The Model Context Protocol surface of the gateway: a stdio server
//! exposing four tools (`discover_secrets`, `describe_policy`,
//! `use_secret`, `query_audit`) and the table-driven dispatcher that routes
//! them through the core pipeline.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vaultgate_core::VaultConfig;
//! use vaultgate_mcp::{ToolDispatcher, VaultServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(VaultConfig::load("vault.config.json".as_ref())?);
//!     let dispatcher = Arc::new(ToolDispatcher::new(config)?);
//!     VaultServer::new(dispatcher).serve_stdio().await?;
//!     Ok(())
//! }
//! ```

pub mod dispatcher;
pub mod error;
pub mod server;
pub mod tools;

pub use dispatcher::{ToolDispatcher, ToolReply};
pub use error::{McpError, McpResult};
pub use server::{ServerInfo, VaultServer};
pub use tools::{ActionSpec, DescribePolicyRequest, QueryAuditRequest, UseSecretRequest};
