//! # Capability handlers
//!
//! One [`ToolHandler`] per built-in capability. A handler receives the
//! prepared argument map and the authenticated [`Principal`], coerces the
//! arguments it cares about, checks the permission it needs before any
//! mutation and delegates to a platform collaborator.
//!
//! Handlers never return transport errors. Anything that goes wrong inside
//! a handler is a [`DomainError`], rendered as `{"error": code}` inside a
//! successful response.

pub mod args;
pub mod content;
pub mod orders;
pub mod products;
pub mod recommendations;
pub mod taxonomy;
pub mod users;

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::auth::Principal;
use crate::platform::{CommerceStore, Platform, PlatformError};

// ---------------------------------------------------------------------------
// Domain results
// ---------------------------------------------------------------------------

/// A handler-level failure with a stable string code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}")]
pub struct DomainError {
    code: Cow<'static, str>,
}

impl DomainError {
    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self { code: code.into() }
    }

    pub fn insufficient_capability() -> Self {
        Self::new("insufficient_capability")
    }

    pub fn invalid_argument() -> Self {
        Self::new("invalid_argument")
    }

    pub fn not_found() -> Self {
        Self::new("not_found")
    }

    pub fn backend_unavailable() -> Self {
        Self::new("backend_unavailable")
    }

    /// `"<field> required"`
    pub fn required(field: &str) -> Self {
        Self::new(format!("{field} required"))
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// `{"error": code}`
    pub fn to_value(&self) -> Value {
        json!({ "error": self.code() })
    }
}

impl From<PlatformError> for DomainError {
    fn from(err: PlatformError) -> Self {
        warn!(error = %err, "Platform call failed");
        match err {
            PlatformError::NotFound { .. } => DomainError::not_found(),
            PlatformError::Conflict(code) if code == "username_exists" || code == "email_exists" => {
                DomainError::new(code)
            }
            PlatformError::Conflict(_) | PlatformError::Invalid(_) => DomainError::invalid_argument(),
            PlatformError::Rejected(_) => DomainError::insufficient_capability(),
            PlatformError::Unavailable(_) => DomainError::backend_unavailable(),
        }
    }
}

pub type DomainResult = Result<Value, DomainError>;

/// Fail with `insufficient_capability` unless the caller holds `permission`.
pub fn require_permission(principal: &Principal, permission: &str) -> Result<(), DomainError> {
    if principal.has_permission(permission) {
        Ok(())
    } else {
        Err(DomainError::insufficient_capability())
    }
}

/// The commerce collaborator, or `backend_unavailable` when the subsystem
/// is not active.
pub fn commerce(platform: &Platform) -> Result<&Arc<dyn CommerceStore>, DomainError> {
    platform
        .commerce
        .as_ref()
        .ok_or_else(DomainError::backend_unavailable)
}

// ---------------------------------------------------------------------------
// Handler contract
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: &Map<String, Value>, principal: &Principal) -> DomainResult;
}

/// Operator policy for custom content types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostTypePolicy {
    allowed: Vec<String>,
}

impl PostTypePolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    /// Whether `slug` passes the allow-list. An empty list allows every type.
    pub fn allows(&self, slug: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|t| t == slug)
    }
}

/// Name → handler bindings.
#[derive(Clone, Default)]
pub struct HandlerSet {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler, replacing any previous binding for the name.
    pub fn bind(&mut self, name: &str, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handlers for every capability in the built-in catalog.
    pub fn builtin(platform: &Platform, post_types: PostTypePolicy) -> Self {
        let platform = Arc::new(platform.clone());
        let post_types = Arc::new(post_types);
        let mut set = Self::new();

        let search = Arc::new(content::SearchContent::new(platform.clone()));
        set.bind("search_posts", search.clone());
        set.bind("search_pages", search);

        let terms = Arc::new(taxonomy::SearchTerms::new(platform.clone()));
        set.bind("search_post_categories", terms.clone());
        set.bind("search_tags", terms);

        let create = Arc::new(content::CreateContent::new(platform.clone(), post_types.clone()));
        set.bind("create_post", create.clone());
        set.bind("create_page", create.clone());
        set.bind("create_custom_post_type", create);

        set.bind(
            "create_category",
            Arc::new(taxonomy::CreateCategory::new(platform.clone())),
        );
        set.bind(
            "search_custom_post_types",
            Arc::new(content::SearchCustomPostTypes::new(platform.clone(), post_types)),
        );
        set.bind(
            "search_products",
            Arc::new(products::SearchProducts::new(platform.clone())),
        );
        set.bind(
            "create_product",
            Arc::new(products::CreateProduct::new(platform.clone())),
        );
        set.bind(
            "search_product_categories",
            Arc::new(products::SearchProductCategories::new(platform.clone())),
        );
        set.bind(
            "create_order",
            Arc::new(orders::CreateOrder::new(platform.clone())),
        );
        set.bind("get_orders", Arc::new(orders::GetOrders::new(platform.clone())));
        set.bind(
            "get_order_details",
            Arc::new(orders::GetOrderDetails::new(platform.clone())),
        );
        set.bind("create_user", Arc::new(users::CreateUser::new(platform.clone())));
        set.bind(
            "recommend_products",
            Arc::new(recommendations::RecommendProducts::new(platform)),
        );
        set
    }
}

impl std::fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("HandlerSet").field("handlers", &names).finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use serde_json::{Map, Value};

    use crate::auth::Principal;
    use crate::platform::memory::InMemoryPlatform;
    use crate::policy::RoleMap;

    pub fn principal(roles: &[&str]) -> Principal {
        let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        let permissions = RoleMap::with_wordpress_defaults().permissions_for(&roles);
        Principal::new(1, "tester", roles, permissions)
    }

    pub fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    pub fn site() -> Arc<InMemoryPlatform> {
        Arc::new(InMemoryPlatform::new("https://site.test"))
    }

    pub fn shop() -> Arc<InMemoryPlatform> {
        Arc::new(InMemoryPlatform::new("https://shop.test").with_commerce())
    }
}
