//! HTTP server for the tool protocol.
//!
//! # Endpoints
//!
//! - `GET  /health`: Liveness probe
//! - `POST /wp-mcp/v1/mcp`: Authenticated tool protocol endpoint
//! - `GET  /wp-mcp/v1/info`: Site name, version and available tools

pub mod routes;

pub use routes::{app_router, AppState, INFO_PATH, MCP_PATH};
