//! Axum route handlers for the tool server.
//!
//! # Routes
//!
//! - `GET  /health`: Liveness probe
//! - `POST /wp-mcp/v1/mcp`: Tool protocol endpoint (Basic auth)
//! - `GET  /wp-mcp/v1/info`: Public server description

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;

pub const MCP_PATH: &str = "/wp-mcp/v1/mcp";
pub const INFO_PATH: &str = "/wp-mcp/v1/info";

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, config: ServerConfig) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            config: Arc::new(config),
        }
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(MCP_PATH, post(mcp_handler))
        .route(INFO_PATH, get(info_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health: liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": crate::PLUGIN_NAME,
    }))
}

/// POST /wp-mcp/v1/mcp
///
/// The raw body goes to the dispatcher untouched so that authentication
/// is decided before any parsing. A header that is not valid UTF-8 counts
/// as absent.
async fn mcp_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let dispatch = state.dispatcher.dispatch(authorization, &body).await;
    let status = dispatch.status();
    debug!(status = status.as_u16(), stage = ?dispatch.stage, "MCP request handled");
    (status, Json(dispatch.into_response()))
}

/// GET /wp-mcp/v1/info: no authentication.
async fn info_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "plugin": crate::PLUGIN_NAME,
        "version": crate::VERSION,
        "site_name": state.config.site_name,
        "site_url": state.config.effective_site_url(),
        "available_tools": state.dispatcher.available_tool_names(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::platform::memory::InMemoryPlatform;

    fn state(config: ServerConfig, commerce: bool) -> AppState {
        let mut memory = InMemoryPlatform::new("https://site.test");
        if commerce {
            memory = memory.with_commerce();
        }
        let memory = Arc::new(memory);
        memory.add_user("admin", "admin-pass", "admin@site.test", &["administrator"]);
        let dispatcher = Dispatcher::from_config(&config, &memory.platform()).unwrap();
        AppState::new(dispatcher, config)
    }

    fn admin_header() -> String {
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("admin:admin-pass")
        )
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn mcp_request(auth: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(MCP_PATH)
            .header("Content-Type", "application/json");
        if let Some(auth) = auth {
            builder = builder.header("Authorization", auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = app_router(state(ServerConfig::default(), false));

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::VERSION);
    }

    #[tokio::test]
    async fn test_info_endpoint() {
        let config = ServerConfig {
            site_name: "Demo Shop".into(),
            enabled_tools: vec!["search_posts".into(), "search_products".into()],
            ..ServerConfig::default()
        };
        let app = app_router(state(config, false));

        let request = Request::builder()
            .uri(INFO_PATH)
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["plugin"], crate::PLUGIN_NAME);
        assert_eq!(json["site_name"], "Demo Shop");
        assert_eq!(json["site_url"], "http://localhost");
        assert_eq!(json["available_tools"], json!(["search_posts"]));
    }

    #[tokio::test]
    async fn test_mcp_list_tools() {
        let app = app_router(state(ServerConfig::default(), true));
        let auth = admin_header();

        let response = app
            .oneshot(mcp_request(
                Some(&auth),
                r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
        assert_eq!(json["result"]["tools"].as_array().unwrap().len(), 17);
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_mcp_requires_auth() {
        let app = app_router(state(ServerConfig::default(), false));

        let response = app
            .oneshot(mcp_request(
                None,
                r#"{"jsonrpc":"2.0","id":"abc","method":"tools/list"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = json_body(response).await;
        assert_eq!(json["id"], "abc");
        assert_eq!(json["error"]["kind"], "no_auth");
    }

    #[tokio::test]
    async fn test_mcp_malformed_body() {
        let app = app_router(state(ServerConfig::default(), false));
        let auth = admin_header();

        let response = app
            .oneshot(mcp_request(Some(&auth), "{oops"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = json_body(response).await;
        assert_eq!(json["id"], Value::Null);
        assert_eq!(json["error"]["kind"], "malformed_payload");
    }

    #[tokio::test]
    async fn test_mcp_tool_call_domain_error_is_success() {
        let app = app_router(state(ServerConfig::default(), false));
        let auth = admin_header();

        let response = app
            .oneshot(mcp_request(
                Some(&auth),
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"create_post","arguments":{}}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["result"], json!({"error": "title required"}));
    }
}
