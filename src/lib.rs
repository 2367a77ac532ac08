//! # wp-mcp-server
//!
//! A capability broker that exposes a WordPress site, and WooCommerce when
//! it is active, to AI tool clients over a JSON-RPC tool protocol.
//!
//! Every request to the tool endpoint is authenticated with HTTP Basic
//! credentials (a username and one of that user's application passwords),
//! routed to a named capability, checked against the caller's permissions
//! and the operator's enabled-tool set, and answered with a structured
//! result. The broker owns no data: all reads and writes go through the
//! [`platform`] collaborator traits.
//!
//! ## Layout
//!
//! - [`auth`]: credentials → [`auth::Principal`]
//! - [`capabilities`]: the capability catalog, enabled-set and availability
//! - [`handlers`]: the code behind each capability
//! - [`dispatcher`]: the request lifecycle
//! - [`rpc`]: wire envelope and transport errors
//! - [`server`]: axum routes

pub mod auth;
pub mod capabilities;
pub mod config;
pub mod dispatcher;
pub mod handlers;
pub mod platform;
pub mod policy;
pub mod rpc;
pub mod sanitize;
pub mod server;

pub use auth::{Authenticator, Principal};
pub use capabilities::{Capability, CapabilityRegistry, EnabledTools};
pub use config::ServerConfig;
pub use dispatcher::{Dispatch, Dispatcher};
pub use platform::Platform;
pub use rpc::{DispatchError, RpcResponse};

/// Server version reported by `initialize`, `/health` and `/wp-mcp/v1/info`.
pub const VERSION: &str = "1.0.0";

/// Name reported as the plugin and MCP server name.
pub const PLUGIN_NAME: &str = "wp-mcp-server";
