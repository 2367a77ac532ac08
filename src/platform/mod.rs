//! # Platform collaborators
//!
//! The broker owns no content, taxonomy, commerce or identity data. Every
//! read and write goes through one of four collaborator traits:
//!
//! - [`ContentStore`]: post types, content search and creation
//! - [`TaxonomyStore`]: taxonomies and their terms
//! - [`CommerceStore`]: products, orders and recommendation sources (optional)
//! - [`IdentityStore`]: application-password verification and accounts
//!
//! A [`Platform`] bundles one implementation of each. Two implementations
//! ship with the crate: [`memory::InMemoryPlatform`] and
//! [`wordpress::WordPressClient`].

pub mod memory;
pub mod wordpress;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::Principal;
use crate::config::PlatformConfig;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure reported by a platform collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("credentials rejected: {0}")]
    Rejected(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl PlatformError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;

// ---------------------------------------------------------------------------
// Environment description
// ---------------------------------------------------------------------------

/// What the connected site offers. Availability predicates are evaluated
/// against this value only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    /// The commerce subsystem (WooCommerce) is active.
    pub commerce: bool,
    /// Application passwords can be verified.
    pub application_passwords: bool,
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Publication status of content and products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Publish,
    Pending,
    Private,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Publish => "publish",
            PostStatus::Pending => "pending",
            PostStatus::Private => "private",
        }
    }

    /// Parse one of the four accepted statuses.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(PostStatus::Draft),
            "publish" => Some(PostStatus::Publish),
            "pending" => Some(PostStatus::Pending),
            "private" => Some(PostStatus::Private),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostType {
    pub slug: String,
    pub label: String,
    pub public: bool,
    pub hierarchical: bool,
    /// Permission required to create items of this type.
    pub create_permission: String,
}

impl PostType {
    pub fn new(slug: &str, label: &str, create_permission: &str) -> Self {
        Self {
            slug: slug.to_string(),
            label: label.to_string(),
            public: true,
            hierarchical: false,
            create_permission: create_permission.to_string(),
        }
    }

    pub fn hierarchical(mut self) -> Self {
        self.hierarchical = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: u64,
    pub post_type: String,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub slug: String,
    pub status: PostStatus,
    pub author_id: u64,
    pub url: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

/// Which statuses a content search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Published,
    Any,
}

/// Equality filter on a content meta field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaFilter {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    pub post_type: String,
    pub keyword: String,
    pub status: StatusFilter,
    pub meta: Vec<MetaFilter>,
    pub per_page: u32,
    pub page: u32,
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewContent {
    pub post_type: String,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub status: PostStatus,
    pub slug: Option<String>,
    pub author_id: u64,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// All registered content types.
    async fn post_types(&self) -> PlatformResult<Vec<PostType>>;

    /// Look up a single content type.
    async fn post_type(&self, slug: &str) -> PlatformResult<Option<PostType>> {
        Ok(self
            .post_types()
            .await?
            .into_iter()
            .find(|t| t.slug == slug))
    }

    async fn search(&self, query: &ContentQuery) -> PlatformResult<Page<ContentItem>>;

    async fn create(&self, item: NewContent) -> PlatformResult<ContentItem>;
}

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub slug: String,
    pub hierarchical: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: u64,
    pub taxonomy: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub count: u64,
    pub parent_id: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermQuery {
    pub taxonomy: String,
    pub keyword: String,
    /// `Some(0)` restricts to top-level terms.
    pub parent_id: Option<u64>,
    pub per_page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTerm {
    pub taxonomy: String,
    pub name: String,
    pub slug: Option<String>,
    pub parent_id: u64,
    pub description: String,
}

#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    async fn taxonomy(&self, slug: &str) -> PlatformResult<Option<Taxonomy>>;

    async fn search_terms(&self, query: &TermQuery) -> PlatformResult<Vec<Term>>;

    async fn create_term(&self, term: NewTerm) -> PlatformResult<Term>;
}

// ---------------------------------------------------------------------------
// Commerce
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    InStock,
    OutOfStock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "instock",
            StockStatus::OutOfStock => "outofstock",
        }
    }
}

/// Id + name pair used for product categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub short_description: String,
    pub status: PostStatus,
    pub sku: String,
    pub regular_price: Option<f64>,
    pub sale_price: Option<f64>,
    pub stock_status: StockStatus,
    pub manage_stock: bool,
    pub stock_quantity: Option<i64>,
    pub categories: Vec<TermRef>,
    pub url: String,
    pub image_url: Option<String>,
    pub average_rating: f64,
    pub total_sales: u64,
    #[serde(default)]
    pub upsell_ids: Vec<u64>,
    #[serde(default)]
    pub cross_sell_ids: Vec<u64>,
    pub date_created: DateTime<Utc>,
}

impl Product {
    /// Active price: the sale price when set, else the regular price.
    pub fn price(&self) -> Option<f64> {
        self.sale_price.or(self.regular_price)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub keyword: String,
    pub category_id: Option<u64>,
    pub stock_status: Option<StockStatus>,
    pub per_page: u32,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub short_description: String,
    pub status: PostStatus,
    pub sku: Option<String>,
    pub regular_price: Option<f64>,
    pub sale_price: Option<f64>,
    pub manage_stock: bool,
    pub stock_quantity: Option<i64>,
    pub category_ids: Vec<u64>,
}

/// Postal address fields, keyed the way the commerce backend keys them.
pub type Address = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: u64,
    pub name: String,
    pub quantity: u32,
    pub subtotal: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub status: String,
    pub customer_id: u64,
    pub currency: String,
    pub billing: Address,
    pub shipping: Address,
    pub line_items: Vec<OrderLine>,
    pub subtotal: f64,
    pub total_tax: f64,
    pub shipping_total: f64,
    pub total: f64,
    pub payment_method: String,
    pub transaction_id: String,
    pub date_created: DateTime<Utc>,
    pub date_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNote {
    pub date: DateTime<Utc>,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: u64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: u64,
    pub lines: Vec<NewOrderLine>,
    pub billing: Option<Address>,
    pub shipping: Option<Address>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderQuery {
    pub status: Option<String>,
    pub customer_id: Option<u64>,
    /// Inclusive lower bound on the creation time.
    pub created_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the creation time.
    pub created_before: Option<DateTime<Utc>>,
    pub per_page: u32,
    pub page: u32,
}

#[async_trait]
pub trait CommerceStore: Send + Sync {
    async fn search_products(&self, query: &ProductQuery) -> PlatformResult<Vec<Product>>;

    async fn product(&self, id: u64) -> PlatformResult<Option<Product>>;

    async fn create_product(&self, product: NewProduct) -> PlatformResult<Product>;

    /// Terms of the product category taxonomy. `query.taxonomy` is ignored.
    async fn product_categories(&self, query: &TermQuery) -> PlatformResult<Vec<Term>>;

    async fn create_order(&self, order: NewOrder) -> PlatformResult<Order>;

    async fn orders(&self, query: &OrderQuery) -> PlatformResult<Vec<Order>>;

    async fn order(&self, id: u64) -> PlatformResult<Option<Order>>;

    async fn order_notes(&self, id: u64) -> PlatformResult<Vec<OrderNote>>;

    /// Ids of products related to `id` (shared categories).
    async fn related_ids(&self, id: u64, limit: usize) -> PlatformResult<Vec<u64>>;

    /// Published products ordered by sales, highest first.
    async fn bestsellers(&self, category_id: Option<u64>, limit: usize)
        -> PlatformResult<Vec<Product>>;

    /// Published products ordered by creation date, newest first.
    async fn newest(&self, category_id: Option<u64>, limit: usize) -> PlatformResult<Vec<Product>>;
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: String,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("display_name", &self.display_name)
            .field("role", &self.role)
            .finish()
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Check an application password. Returns the caller on success and
    /// `PlatformError::Rejected` when the pair is refused.
    async fn verify_application_password(
        &self,
        username: &str,
        password: &str,
    ) -> PlatformResult<Principal>;

    async fn username_exists(&self, username: &str) -> PlatformResult<bool>;

    async fn email_exists(&self, email: &str) -> PlatformResult<bool>;

    async fn role_exists(&self, role: &str) -> PlatformResult<bool>;

    async fn create_account(&self, account: NewAccount) -> PlatformResult<Account>;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// One implementation of each collaborator, shared across requests.
#[derive(Clone)]
pub struct Platform {
    pub content: Arc<dyn ContentStore>,
    pub taxonomy: Arc<dyn TaxonomyStore>,
    pub identity: Arc<dyn IdentityStore>,
    /// Absent when the commerce subsystem is not active.
    pub commerce: Option<Arc<dyn CommerceStore>>,
    pub application_passwords: bool,
    /// Public URL of the site.
    pub site_url: String,
}

impl Platform {
    pub fn descriptor(&self) -> PlatformDescriptor {
        PlatformDescriptor {
            commerce: self.commerce.is_some(),
            application_passwords: self.application_passwords,
        }
    }
}

/// Build the platform the configuration names.
pub async fn connect(config: &PlatformConfig) -> PlatformResult<Platform> {
    match config {
        PlatformConfig::Memory(memory) => {
            let store = memory::InMemoryPlatform::from_config(memory);
            info!(
                site = %memory.site_url,
                users = memory.users.len(),
                commerce = memory.commerce,
                "Using in-memory platform"
            );
            Ok(store.platform())
        }
        PlatformConfig::Wordpress(wordpress) => {
            let platform = wordpress::WordPressClient::connect(wordpress).await?;
            info!(site = %platform.site_url, descriptor = ?platform.descriptor(), "Connected to WordPress");
            Ok(platform)
        }
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("descriptor", &self.descriptor())
            .field("site_url", &self.site_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_status_parse() {
        assert_eq!(PostStatus::parse("publish"), Some(PostStatus::Publish));
        assert_eq!(PostStatus::parse("private"), Some(PostStatus::Private));
        assert_eq!(PostStatus::parse("trash"), None);
        assert_eq!(PostStatus::Pending.to_string(), "pending");
    }

    #[test]
    fn test_product_price_prefers_sale() {
        let mut product = Product {
            id: 1,
            name: "Mug".into(),
            description: String::new(),
            short_description: String::new(),
            status: PostStatus::Publish,
            sku: String::new(),
            regular_price: Some(12.0),
            sale_price: None,
            stock_status: StockStatus::InStock,
            manage_stock: false,
            stock_quantity: None,
            categories: vec![],
            url: String::new(),
            image_url: None,
            average_rating: 0.0,
            total_sales: 0,
            upsell_ids: vec![],
            cross_sell_ids: vec![],
            date_created: Utc::now(),
        };
        assert_eq!(product.price(), Some(12.0));
        product.sale_price = Some(9.5);
        assert_eq!(product.price(), Some(9.5));
    }

    #[test]
    fn test_new_account_debug_redacts_password() {
        let account = NewAccount {
            username: "jo".into(),
            email: "jo@example.com".into(),
            password: "hunter2".into(),
            display_name: "Jo".into(),
            role: "subscriber".into(),
        };
        let rendered = format!("{account:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
