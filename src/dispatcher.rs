//! # Dispatcher
//!
//! Drives one request through `Received → Authenticated → Routed → Invoked
//! → Responded`. Any failure jumps straight to `Responded` carrying a
//! [`DispatchError`]. Domain failures reported by a handler are not
//! failures here: they travel as `{"error": code}` inside a success result.
//!
//! Authentication runs before the body is parsed, so an anonymous caller
//! learns nothing about the payload format.

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::auth::Authenticator;
use crate::capabilities::{
    CapabilityRegistry, EnabledTools, Invocability, ListContext, RegistryError, ToolDescriptor,
};
use crate::config::ServerConfig;
use crate::handlers::{DomainError, HandlerSet};
use crate::platform::{Platform, PlatformDescriptor};
use crate::rpc::{DispatchError, Envelope, Operation, RpcResponse};

/// Protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// The furthest stage a request reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DispatchStage {
    Received,
    Authenticated,
    Routed,
    Invoked,
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// Last stage completed before the response was built.
    pub stage: DispatchStage,
    /// Request id, echoed in the response. `null` when none was recoverable.
    pub id: Value,
    pub outcome: Result<Value, DispatchError>,
}

impl Dispatch {
    pub fn status(&self) -> StatusCode {
        match &self.outcome {
            Ok(_) => StatusCode::OK,
            Err(e) => e.status(),
        }
    }

    pub fn into_response(self) -> RpcResponse {
        match self.outcome {
            Ok(result) => RpcResponse::success(self.id, result),
            Err(error) => RpcResponse::failure(self.id, &error),
        }
    }
}

pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    handlers: HandlerSet,
    authenticator: Authenticator,
    enabled: EnabledTools,
    platform: PlatformDescriptor,
    server_name: String,
}

impl Dispatcher {
    /// Fails when a registered capability has no handler.
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        handlers: HandlerSet,
        authenticator: Authenticator,
        enabled: EnabledTools,
        platform: PlatformDescriptor,
    ) -> Result<Self, RegistryError> {
        if let Some(name) = registry.names().find(|name| !handlers.contains(name)) {
            return Err(RegistryError::HandlerMissing(name.to_string()));
        }
        Ok(Self {
            registry,
            handlers,
            authenticator,
            enabled,
            platform,
            server_name: crate::PLUGIN_NAME.to_string(),
        })
    }

    /// The built-in catalog and handlers over `platform`, shaped by `config`.
    pub fn from_config(config: &ServerConfig, platform: &Platform) -> Result<Self, RegistryError> {
        let registry = Arc::new(CapabilityRegistry::with_builtins()?);
        let handlers = HandlerSet::builtin(platform, config.post_type_policy());
        let authenticator = Authenticator::new(platform, config.baseline_permission.clone());
        let dispatcher = Self::new(
            registry,
            handlers,
            authenticator,
            config.enabled(),
            platform.descriptor(),
        )?;
        info!(
            registered = dispatcher.registry.len(),
            available = dispatcher.available_tool_names().len(),
            commerce = dispatcher.platform.commerce,
            "Dispatcher ready"
        );
        Ok(dispatcher)
    }

    fn context(&self) -> ListContext<'_> {
        ListContext {
            enabled: &self.enabled,
            platform: self.platform,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn platform(&self) -> PlatformDescriptor {
        self.platform
    }

    /// Descriptors of every capability passing the enabled set and
    /// availability, in registration order.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.descriptors(&self.context())
    }

    pub fn available_tool_names(&self) -> Vec<String> {
        self.registry
            .list_available(&self.context())
            .into_iter()
            .map(|c| c.name.clone())
            .collect()
    }

    pub async fn dispatch(&self, authorization: Option<&str>, body: &[u8]) -> Dispatch {
        let principal = match self.authenticator.authenticate(authorization).await {
            Ok(principal) => principal,
            Err(e) => {
                return Dispatch {
                    stage: DispatchStage::Received,
                    id: peek_id(body),
                    outcome: Err(e.into()),
                }
            }
        };
        debug!(user_id = principal.user_id, "Received -> Authenticated");

        let envelope = match Envelope::parse(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(reason = %e.reason, "Malformed envelope");
                let id = e.id.clone();
                return Dispatch {
                    stage: DispatchStage::Authenticated,
                    id,
                    outcome: Err(e.into()),
                };
            }
        };
        let id = envelope.id.clone();
        let respond = |stage, outcome| Dispatch {
            stage,
            id: id.clone(),
            outcome,
        };

        let operation = match envelope.operation() {
            Ok(op) => op,
            Err(e) => return respond(DispatchStage::Authenticated, Err(e)),
        };

        match operation {
            Operation::Initialize => respond(DispatchStage::Routed, Ok(self.initialize_result())),
            Operation::Ping => respond(DispatchStage::Routed, Ok(json!({}))),
            Operation::ListTools => {
                let tools = self.list_tools();
                info!(count = tools.len(), "Listing tools");
                respond(DispatchStage::Routed, Ok(json!({ "tools": tools })))
            }
            Operation::CallTool => {
                let name = match envelope.tool_name() {
                    Ok(name) => name,
                    Err(e) => return respond(DispatchStage::Authenticated, Err(e)),
                };
                let capability = match self.registry.check(name, &self.context()) {
                    Invocability::Invocable => self.registry.resolve(name),
                    Invocability::Unavailable => {
                        debug!(tool = name, "Tool unavailable on this platform");
                        return respond(
                            DispatchStage::Routed,
                            Ok(DomainError::backend_unavailable().to_value()),
                        );
                    }
                    Invocability::Disabled | Invocability::Unknown => None,
                };
                let Some(capability) = capability else {
                    warn!(tool = name, "Unknown or disabled tool requested");
                    return respond(
                        DispatchStage::Authenticated,
                        Err(DispatchError::UnknownCapability(name.to_string())),
                    );
                };
                let Some(handler) = self.handlers.get(name) else {
                    return respond(
                        DispatchStage::Routed,
                        Err(DispatchError::HandlerMissing(name.to_string())),
                    );
                };
                debug!(tool = name, "Authenticated -> Routed");

                let args: Map<String, Value> =
                    capability.prepare_arguments(envelope.params.get("arguments"));
                let result = match handler.call(&args, &principal).await {
                    Ok(value) => value,
                    Err(domain) => {
                        debug!(tool = name, code = domain.code(), "Tool returned a domain error");
                        domain.to_value()
                    }
                };
                debug!(tool = name, "Routed -> Invoked");
                respond(DispatchStage::Invoked, Ok(result))
            }
        }
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": self.server_name,
                "version": crate::VERSION,
            },
            "capabilities": { "tools": {} },
        })
    }
}

/// Best-effort id recovery for responses built before the envelope is
/// parsed.
fn peek_id(body: &[u8]) -> Value {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|mut v| v.get_mut("id").map(Value::take))
        .unwrap_or(Value::Null)
}
