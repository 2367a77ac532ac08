//! In-memory platform.
//!
//! Implements all four collaborator traits over `parking_lot`-guarded
//! vectors. Used by the test suite and by the server binary when no
//! WordPress site is configured. State lives as long as the process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{
    Account, CommerceStore, ContentItem, ContentQuery, ContentStore, IdentityStore, NewAccount,
    NewContent, NewOrder, NewProduct, NewTerm, Order, OrderLine, OrderNote, OrderQuery, Page,
    Platform, PlatformError, PlatformResult, PostStatus, PostType, Product, ProductQuery,
    StatusFilter, StockStatus, Taxonomy, TaxonomyStore, Term, TermQuery, TermRef,
};
use crate::auth::Principal;
use crate::config::MemoryConfig;
use crate::policy::RoleMap;
use crate::sanitize::sanitize_title;

/// Order statuses the commerce store accepts.
pub const ORDER_STATUSES: &[&str] = &[
    "pending",
    "processing",
    "on-hold",
    "completed",
    "cancelled",
    "refunded",
    "failed",
];

const PRODUCT_CATEGORY: &str = "product_cat";

struct StoredUser {
    account: Account,
    app_passwords: Vec<String>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    post_types: Vec<PostType>,
    content: Vec<ContentItem>,
    taxonomies: Vec<Taxonomy>,
    terms: Vec<Term>,
    products: Vec<Product>,
    orders: Vec<Order>,
    notes: HashMap<u64, Vec<OrderNote>>,
    users: Vec<StoredUser>,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn unique_slug(&self, base: &str, taken: impl Fn(&str) -> bool) -> String {
        let base = if base.is_empty() { "untitled" } else { base };
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

/// Seedable in-memory implementation of every collaborator.
pub struct InMemoryPlatform {
    site_url: String,
    currency: String,
    commerce: bool,
    application_passwords: bool,
    roles: RoleMap,
    state: RwLock<State>,
    verifications: AtomicUsize,
}

impl InMemoryPlatform {
    /// A site with `post` and `page` types and the `category` and
    /// `post_tag` taxonomies. No commerce.
    pub fn new(site_url: &str) -> Self {
        let state = State {
            post_types: vec![
                PostType::new("post", "Posts", "edit_posts"),
                PostType::new("page", "Pages", "edit_pages").hierarchical(),
            ],
            taxonomies: vec![
                Taxonomy {
                    slug: "category".into(),
                    hierarchical: true,
                },
                Taxonomy {
                    slug: "post_tag".into(),
                    hierarchical: false,
                },
            ],
            ..State::default()
        };
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
            currency: "USD".into(),
            commerce: false,
            application_passwords: true,
            roles: RoleMap::with_wordpress_defaults(),
            state: RwLock::new(state),
            verifications: AtomicUsize::new(0),
        }
    }

    /// Activate the commerce subsystem: adds the `product` type and the
    /// product category taxonomy.
    pub fn with_commerce(mut self) -> Self {
        self.commerce = true;
        let state = self.state.get_mut();
        state
            .post_types
            .push(PostType::new("product", "Products", "edit_products"));
        state.taxonomies.push(Taxonomy {
            slug: PRODUCT_CATEGORY.into(),
            hierarchical: true,
        });
        self
    }

    pub fn without_application_passwords(mut self) -> Self {
        self.application_passwords = false;
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    pub fn with_role_map(mut self, roles: RoleMap) -> Self {
        self.roles = roles;
        self
    }

    /// A store shaped and seeded from configuration.
    pub fn from_config(config: &MemoryConfig) -> Arc<Self> {
        let mut store = Self::new(&config.site_url).with_currency(&config.currency);
        if config.commerce {
            store = store.with_commerce();
        }
        let store = Arc::new(store);
        for user in &config.users {
            let roles: Vec<&str> = user.roles.iter().map(String::as_str).collect();
            store.add_user(&user.username, &user.app_password, &user.email, &roles);
        }
        store
    }

    /// Bundle this store as every collaborator of a [`Platform`].
    pub fn platform(self: &Arc<Self>) -> Platform {
        Platform {
            content: self.clone(),
            taxonomy: self.clone(),
            identity: self.clone(),
            commerce: if self.commerce {
                Some(self.clone() as Arc<dyn CommerceStore>)
            } else {
                None
            },
            application_passwords: self.application_passwords,
            site_url: self.site_url.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    pub fn add_post_type(&self, post_type: PostType) {
        let mut state = self.state.write();
        state.post_types.retain(|t| t.slug != post_type.slug);
        state.post_types.push(post_type);
    }

    /// Register a user holding one application password. Returns the user id.
    pub fn add_user(&self, username: &str, app_password: &str, email: &str, roles: &[&str]) -> u64 {
        let mut state = self.state.write();
        let id = state.allocate_id();
        state.users.push(StoredUser {
            account: Account {
                id,
                username: username.to_string(),
                email: email.to_string(),
                display_name: username.to_string(),
                roles: roles.iter().map(|r| r.to_string()).collect(),
            },
            app_passwords: vec![app_password.to_string()],
        });
        id
    }

    pub fn insert_content(&self, item: NewContent) -> PlatformResult<ContentItem> {
        let mut state = self.state.write();
        self.insert_content_locked(&mut state, item)
    }

    pub fn set_meta(&self, content_id: u64, key: &str, value: &str) -> PlatformResult<()> {
        let mut state = self.state.write();
        let item = state
            .content
            .iter_mut()
            .find(|c| c.id == content_id)
            .ok_or_else(|| PlatformError::not_found("post", content_id))?;
        item.meta.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn insert_term(&self, term: NewTerm) -> PlatformResult<Term> {
        let mut state = self.state.write();
        self.insert_term_locked(&mut state, term)
    }

    pub fn insert_product(&self, product: NewProduct) -> PlatformResult<Product> {
        let mut state = self.state.write();
        self.insert_product_locked(&mut state, product)
    }

    /// Set sales and rating figures used by recommendations.
    pub fn set_product_stats(&self, id: u64, total_sales: u64, average_rating: f64) -> PlatformResult<()> {
        self.update_product(id, |p| {
            p.total_sales = total_sales;
            p.average_rating = average_rating;
        })
    }

    pub fn set_product_links(&self, id: u64, upsells: &[u64], cross_sells: &[u64]) -> PlatformResult<()> {
        self.update_product(id, |p| {
            p.upsell_ids = upsells.to_vec();
            p.cross_sell_ids = cross_sells.to_vec();
        })
    }

    pub fn set_product_created(&self, id: u64, at: DateTime<Utc>) -> PlatformResult<()> {
        self.update_product(id, |p| p.date_created = at)
    }

    pub fn set_order_created(&self, id: u64, at: DateTime<Utc>) -> PlatformResult<()> {
        let mut state = self.state.write();
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| PlatformError::not_found("order", id))?;
        order.date_created = at;
        Ok(())
    }

    pub fn add_order_note(&self, order_id: u64, note: &str) -> PlatformResult<()> {
        let mut state = self.state.write();
        if !state.orders.iter().any(|o| o.id == order_id) {
            return Err(PlatformError::not_found("order", order_id));
        }
        state.notes.entry(order_id).or_default().push(OrderNote {
            date: Utc::now(),
            note: note.to_string(),
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn content_count(&self) -> usize {
        self.state.read().content.len()
    }

    pub fn term_count(&self) -> usize {
        self.state.read().terms.len()
    }

    pub fn product_count(&self) -> usize {
        self.state.read().products.len()
    }

    pub fn order_count(&self) -> usize {
        self.state.read().orders.len()
    }

    pub fn account_count(&self) -> usize {
        self.state.read().users.len()
    }

    /// How many times the identity backend was asked to verify a password.
    pub fn verification_count(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn update_product(&self, id: u64, apply: impl FnOnce(&mut Product)) -> PlatformResult<()> {
        let mut state = self.state.write();
        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| PlatformError::not_found("product", id))?;
        apply(product);
        Ok(())
    }

    fn content_url(&self, post_type: &str, slug: &str) -> String {
        match post_type {
            "post" | "page" => format!("{}/{}/", self.site_url, slug),
            other => format!("{}/{}/{}/", self.site_url, other, slug),
        }
    }

    fn term_url(&self, taxonomy: &str, slug: &str) -> String {
        let base = match taxonomy {
            "post_tag" => "tag",
            PRODUCT_CATEGORY => "product-category",
            other => other,
        };
        format!("{}/{}/{}/", self.site_url, base, slug)
    }

    fn insert_content_locked(&self, state: &mut State, item: NewContent) -> PlatformResult<ContentItem> {
        if !state.post_types.iter().any(|t| t.slug == item.post_type) {
            return Err(PlatformError::not_found("post_type", &item.post_type));
        }
        if item.title.trim().is_empty() {
            return Err(PlatformError::Invalid("empty title".into()));
        }

        let base = item
            .slug
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| sanitize_title(&item.title));
        let slug = state.unique_slug(&base, |candidate| {
            state
                .content
                .iter()
                .any(|c| c.post_type == item.post_type && c.slug == candidate)
        });

        let id = state.allocate_id();
        let stored = ContentItem {
            id,
            url: self.content_url(&item.post_type, &slug),
            post_type: item.post_type,
            title: item.title,
            content: item.content,
            excerpt: item.excerpt,
            slug,
            status: item.status,
            author_id: item.author_id,
            date: Utc::now(),
            meta: Default::default(),
        };
        state.content.push(stored.clone());
        Ok(stored)
    }

    fn insert_term_locked(&self, state: &mut State, term: NewTerm) -> PlatformResult<Term> {
        if !state.taxonomies.iter().any(|t| t.slug == term.taxonomy) {
            return Err(PlatformError::not_found("taxonomy", &term.taxonomy));
        }
        if term.name.trim().is_empty() {
            return Err(PlatformError::Invalid("empty term name".into()));
        }
        if term.parent_id != 0
            && !state
                .terms
                .iter()
                .any(|t| t.id == term.parent_id && t.taxonomy == term.taxonomy)
        {
            return Err(PlatformError::Invalid(format!(
                "parent term {} does not exist",
                term.parent_id
            )));
        }
        if state.terms.iter().any(|t| {
            t.taxonomy == term.taxonomy
                && t.parent_id == term.parent_id
                && t.name.eq_ignore_ascii_case(&term.name)
        }) {
            return Err(PlatformError::Conflict(format!(
                "term '{}' already exists",
                term.name
            )));
        }

        let base = term
            .slug
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| sanitize_title(&term.name));
        let slug = state.unique_slug(&base, |candidate| {
            state
                .terms
                .iter()
                .any(|t| t.taxonomy == term.taxonomy && t.slug == candidate)
        });

        let id = state.allocate_id();
        let stored = Term {
            id,
            url: self.term_url(&term.taxonomy, &slug),
            taxonomy: term.taxonomy,
            name: term.name,
            slug,
            description: term.description,
            count: 0,
            parent_id: term.parent_id,
        };
        state.terms.push(stored.clone());
        Ok(stored)
    }

    fn insert_product_locked(&self, state: &mut State, product: NewProduct) -> PlatformResult<Product> {
        if product.name.trim().is_empty() {
            return Err(PlatformError::Invalid("empty product name".into()));
        }

        let mut categories = Vec::new();
        for category_id in &product.category_ids {
            if let Some(term) = state
                .terms
                .iter_mut()
                .find(|t| t.id == *category_id && t.taxonomy == PRODUCT_CATEGORY)
            {
                term.count += 1;
                categories.push(TermRef {
                    id: term.id,
                    name: term.name.clone(),
                });
            }
        }

        let stock_status = match (product.manage_stock, product.stock_quantity) {
            (true, Some(quantity)) if quantity <= 0 => StockStatus::OutOfStock,
            _ => StockStatus::InStock,
        };

        let slug = state.unique_slug(&sanitize_title(&product.name), |candidate| {
            state
                .products
                .iter()
                .any(|p| p.url.ends_with(&format!("/product/{candidate}/")))
        });

        let id = state.allocate_id();
        let stored = Product {
            id,
            name: product.name,
            description: product.description,
            short_description: product.short_description,
            status: product.status,
            sku: product.sku.unwrap_or_default(),
            regular_price: product.regular_price,
            sale_price: product.sale_price,
            stock_status,
            manage_stock: product.manage_stock,
            stock_quantity: if product.manage_stock {
                product.stock_quantity
            } else {
                None
            },
            categories,
            url: format!("{}/product/{}/", self.site_url, slug),
            image_url: None,
            average_rating: 0.0,
            total_sales: 0,
            upsell_ids: vec![],
            cross_sell_ids: vec![],
            date_created: Utc::now(),
        };
        state.products.push(stored.clone());
        Ok(stored)
    }

    fn published_in_category(product: &Product, category_id: Option<u64>) -> bool {
        product.status == PostStatus::Publish
            && category_id
                .map(|cat| product.categories.iter().any(|c| c.id == cat))
                .unwrap_or(true)
    }
}

fn paginate<T: Clone>(items: Vec<T>, per_page: u32, page: u32) -> Vec<T> {
    let per_page = per_page.max(1) as usize;
    let skip = (page.max(1) as usize - 1) * per_page;
    items.into_iter().skip(skip).take(per_page).collect()
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

#[async_trait]
impl ContentStore for InMemoryPlatform {
    async fn post_types(&self) -> PlatformResult<Vec<PostType>> {
        Ok(self.state.read().post_types.clone())
    }

    async fn search(&self, query: &ContentQuery) -> PlatformResult<Page<ContentItem>> {
        let keyword = query.keyword.to_lowercase();
        let state = self.state.read();
        let mut matches: Vec<ContentItem> = state
            .content
            .iter()
            .filter(|c| c.post_type == query.post_type)
            .filter(|c| match query.status {
                StatusFilter::Published => c.status == PostStatus::Publish,
                StatusFilter::Any => true,
            })
            .filter(|c| {
                keyword.is_empty()
                    || c.title.to_lowercase().contains(&keyword)
                    || c.content.to_lowercase().contains(&keyword)
                    || c.excerpt.to_lowercase().contains(&keyword)
            })
            .filter(|c| {
                query
                    .meta
                    .iter()
                    .all(|m| c.meta.get(&m.key).map(|v| v == &m.value).unwrap_or(false))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));

        let total = matches.len() as u64;
        Ok(Page {
            items: paginate(matches, query.per_page, query.page),
            total,
        })
    }

    async fn create(&self, item: NewContent) -> PlatformResult<ContentItem> {
        self.insert_content(item)
    }
}

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

#[async_trait]
impl TaxonomyStore for InMemoryPlatform {
    async fn taxonomy(&self, slug: &str) -> PlatformResult<Option<Taxonomy>> {
        Ok(self
            .state
            .read()
            .taxonomies
            .iter()
            .find(|t| t.slug == slug)
            .cloned())
    }

    async fn search_terms(&self, query: &TermQuery) -> PlatformResult<Vec<Term>> {
        let keyword = query.keyword.to_lowercase();
        let state = self.state.read();
        let mut matches: Vec<Term> = state
            .terms
            .iter()
            .filter(|t| t.taxonomy == query.taxonomy)
            .filter(|t| {
                keyword.is_empty()
                    || t.name.to_lowercase().contains(&keyword)
                    || t.slug.contains(&keyword)
            })
            .filter(|t| query.parent_id.map(|p| t.parent_id == p).unwrap_or(true))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        matches.truncate(query.per_page.max(1) as usize);
        Ok(matches)
    }

    async fn create_term(&self, term: NewTerm) -> PlatformResult<Term> {
        self.insert_term(term)
    }
}

// ---------------------------------------------------------------------------
// Commerce
// ---------------------------------------------------------------------------

#[async_trait]
impl CommerceStore for InMemoryPlatform {
    async fn search_products(&self, query: &ProductQuery) -> PlatformResult<Vec<Product>> {
        let keyword = query.keyword.to_lowercase();
        let state = self.state.read();
        let mut matches: Vec<Product> = state
            .products
            .iter()
            .filter(|p| Self::published_in_category(p, query.category_id))
            .filter(|p| query.stock_status.map(|s| p.stock_status == s).unwrap_or(true))
            .filter(|p| {
                keyword.is_empty()
                    || p.name.to_lowercase().contains(&keyword)
                    || p.description.to_lowercase().contains(&keyword)
                    || p.short_description.to_lowercase().contains(&keyword)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.date_created.cmp(&a.date_created).then(b.id.cmp(&a.id)));
        Ok(paginate(matches, query.per_page, query.page))
    }

    async fn product(&self, id: u64) -> PlatformResult<Option<Product>> {
        Ok(self
            .state
            .read()
            .products
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn create_product(&self, product: NewProduct) -> PlatformResult<Product> {
        self.insert_product(product)
    }

    async fn product_categories(&self, query: &TermQuery) -> PlatformResult<Vec<Term>> {
        let query = TermQuery {
            taxonomy: PRODUCT_CATEGORY.into(),
            ..query.clone()
        };
        self.search_terms(&query).await
    }

    async fn create_order(&self, order: NewOrder) -> PlatformResult<Order> {
        let status = order.status.unwrap_or_else(|| "pending".into());
        if !ORDER_STATUSES.contains(&status.as_str()) {
            return Err(PlatformError::Invalid(format!("unknown order status '{status}'")));
        }
        if order.lines.is_empty() {
            return Err(PlatformError::Invalid("order has no line items".into()));
        }

        let mut state = self.state.write();
        let mut line_items = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            let product = state
                .products
                .iter()
                .find(|p| p.id == line.product_id)
                .ok_or_else(|| PlatformError::not_found("product", line.product_id))?;
            let total = product.price().unwrap_or(0.0) * line.quantity as f64;
            line_items.push(OrderLine {
                product_id: product.id,
                name: product.name.clone(),
                quantity: line.quantity,
                subtotal: total,
                total,
            });
        }
        let subtotal: f64 = line_items.iter().map(|l| l.subtotal).sum();

        let id = state.allocate_id();
        let stored = Order {
            id,
            status,
            customer_id: order.customer_id,
            currency: self.currency.clone(),
            billing: order.billing.unwrap_or_default(),
            shipping: order.shipping.unwrap_or_default(),
            line_items,
            subtotal,
            total_tax: 0.0,
            shipping_total: 0.0,
            total: subtotal,
            payment_method: String::new(),
            transaction_id: String::new(),
            date_created: Utc::now(),
            date_modified: None,
        };
        state.orders.push(stored.clone());
        Ok(stored)
    }

    async fn orders(&self, query: &OrderQuery) -> PlatformResult<Vec<Order>> {
        let state = self.state.read();
        let mut matches: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| query.status.as_ref().map(|s| &o.status == s).unwrap_or(true))
            .filter(|o| query.customer_id.map(|c| o.customer_id == c).unwrap_or(true))
            .filter(|o| query.created_after.map(|t| o.date_created >= t).unwrap_or(true))
            .filter(|o| query.created_before.map(|t| o.date_created <= t).unwrap_or(true))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.date_created.cmp(&a.date_created).then(b.id.cmp(&a.id)));
        Ok(paginate(matches, query.per_page, query.page))
    }

    async fn order(&self, id: u64) -> PlatformResult<Option<Order>> {
        Ok(self.state.read().orders.iter().find(|o| o.id == id).cloned())
    }

    async fn order_notes(&self, id: u64) -> PlatformResult<Vec<OrderNote>> {
        Ok(self.state.read().notes.get(&id).cloned().unwrap_or_default())
    }

    async fn related_ids(&self, id: u64, limit: usize) -> PlatformResult<Vec<u64>> {
        let state = self.state.read();
        let Some(source) = state.products.iter().find(|p| p.id == id) else {
            return Ok(vec![]);
        };
        let mut related: Vec<&Product> = state
            .products
            .iter()
            .filter(|p| p.id != id && p.status == PostStatus::Publish)
            .filter(|p| {
                p.categories
                    .iter()
                    .any(|c| source.categories.iter().any(|s| s.id == c.id))
            })
            .collect();
        related.sort_by(|a, b| b.total_sales.cmp(&a.total_sales).then(a.id.cmp(&b.id)));
        Ok(related.into_iter().take(limit).map(|p| p.id).collect())
    }

    async fn bestsellers(&self, category_id: Option<u64>, limit: usize) -> PlatformResult<Vec<Product>> {
        let state = self.state.read();
        let mut products: Vec<Product> = state
            .products
            .iter()
            .filter(|p| Self::published_in_category(p, category_id))
            .cloned()
            .collect();
        products.sort_by(|a, b| b.total_sales.cmp(&a.total_sales).then(a.id.cmp(&b.id)));
        products.truncate(limit);
        Ok(products)
    }

    async fn newest(&self, category_id: Option<u64>, limit: usize) -> PlatformResult<Vec<Product>> {
        let state = self.state.read();
        let mut products: Vec<Product> = state
            .products
            .iter()
            .filter(|p| Self::published_in_category(p, category_id))
            .cloned()
            .collect();
        products.sort_by(|a, b| b.date_created.cmp(&a.date_created).then(b.id.cmp(&a.id)));
        products.truncate(limit);
        Ok(products)
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[async_trait]
impl IdentityStore for InMemoryPlatform {
    async fn verify_application_password(
        &self,
        username: &str,
        password: &str,
    ) -> PlatformResult<Principal> {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read();
        let user = state
            .users
            .iter()
            .find(|u| u.account.username == username || u.account.email.eq_ignore_ascii_case(username))
            .ok_or_else(|| PlatformError::Rejected("invalid_username".into()))?;
        if !user.app_passwords.iter().any(|p| p == password) {
            return Err(PlatformError::Rejected("incorrect_password".into()));
        }
        Ok(Principal::new(
            user.account.id,
            user.account.username.clone(),
            user.account.roles.clone(),
            self.roles.permissions_for(&user.account.roles),
        ))
    }

    async fn username_exists(&self, username: &str) -> PlatformResult<bool> {
        Ok(self
            .state
            .read()
            .users
            .iter()
            .any(|u| u.account.username.eq_ignore_ascii_case(username)))
    }

    async fn email_exists(&self, email: &str) -> PlatformResult<bool> {
        Ok(self
            .state
            .read()
            .users
            .iter()
            .any(|u| u.account.email.eq_ignore_ascii_case(email)))
    }

    async fn role_exists(&self, role: &str) -> PlatformResult<bool> {
        Ok(self.roles.role_exists(role))
    }

    async fn create_account(&self, account: NewAccount) -> PlatformResult<Account> {
        let NewAccount {
            username,
            email,
            password: _,
            display_name,
            role,
        } = account;
        if !self.roles.role_exists(&role) {
            return Err(PlatformError::Invalid(format!("unknown role '{role}'")));
        }

        let mut state = self.state.write();
        if state.users.iter().any(|u| u.account.username.eq_ignore_ascii_case(&username)) {
            return Err(PlatformError::Conflict("username_exists".into()));
        }
        if state.users.iter().any(|u| u.account.email.eq_ignore_ascii_case(&email)) {
            return Err(PlatformError::Conflict("email_exists".into()));
        }

        let id = state.allocate_id();
        let stored = Account {
            id,
            username,
            email,
            display_name,
            roles: vec![role],
        };
        state.users.push(StoredUser {
            account: stored.clone(),
            app_passwords: vec![],
        });
        Ok(stored)
    }
}
