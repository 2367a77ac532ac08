//! WordPress REST collaborator.
//!
//! Talks to a live site through `/wp-json/wp/v2/*` and, when WooCommerce is
//! active, `/wp-json/wc/v3/*`. Reads and writes use the configured service
//! account; caller verification uses the caller's own credentials against
//! `/wp/v2/users/me`, so the site itself decides whether an application
//! password is valid.
//!
//! ## Configuration
//!
//! ```yaml
//! platform:
//!   kind: wordpress
//!   base_url: "https://shop.example.com"
//!   username: "mcp-service"
//!   app_password: "abcd efgh ijkl mnop"
//!   timeout_ms: 15000
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::RwLock;
use reqwest::{Method, StatusCode};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{
    Account, Address, CommerceStore, ContentItem, ContentQuery, ContentStore, IdentityStore,
    NewAccount, NewContent, NewOrder, NewProduct, NewTerm, Order, OrderLine, OrderNote,
    OrderQuery, Page, Platform, PlatformDescriptor, PlatformError, PlatformResult, PostStatus,
    PostType, Product, ProductQuery, StatusFilter, StockStatus, Taxonomy, TaxonomyStore, Term,
    TermQuery, TermRef,
};
use crate::auth::{Credentials, Principal};
use crate::config::WordPressConfig;
use crate::policy::RoleMap;

/// REST client for one WordPress site.
pub struct WordPressClient {
    client: reqwest::Client,
    site_url: String,
    api_root: String,
    service: Credentials,
    roles: RoleMap,
    /// post type slug → REST collection name
    rest_bases: RwLock<HashMap<String, String>>,
}

impl WordPressClient {
    pub fn new(config: &WordPressConfig) -> PlatformResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(PlatformError::Invalid(
                "base_url is required for the wordpress platform".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PlatformError::Unavailable(e.to_string()))?;
        let site_url = config.base_url.trim().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            api_root: format!("{site_url}/wp-json"),
            site_url,
            service: Credentials {
                username: config.username.clone(),
                password: config.app_password.clone(),
            },
            roles: RoleMap::with_wordpress_defaults(),
            rest_bases: RwLock::new(HashMap::new()),
        })
    }

    /// Build the client, probe the site and bundle it as a [`Platform`].
    pub async fn connect(config: &WordPressConfig) -> PlatformResult<Platform> {
        let client = Arc::new(Self::new(config)?);
        let descriptor = client.probe().await?;
        debug!(?descriptor, site = %client.site_url, "Probed WordPress site");

        Ok(Platform {
            content: client.clone(),
            taxonomy: client.clone(),
            identity: client.clone(),
            commerce: if descriptor.commerce {
                Some(client.clone() as Arc<dyn CommerceStore>)
            } else {
                None
            },
            application_passwords: descriptor.application_passwords,
            site_url: client.site_url.clone(),
        })
    }

    /// Read the REST index to learn which subsystems are active.
    pub async fn probe(&self) -> PlatformResult<PlatformDescriptor> {
        let (index, _) = self.send(Method::GET, "/", &[], None, None).await?;
        Ok(descriptor_from_index(&index))
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        caller: Option<&Credentials>,
    ) -> PlatformResult<(Value, reqwest::header::HeaderMap)> {
        let url = format!("{}{}", self.api_root, path);
        let auth = caller.unwrap_or(&self.service);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .basic_auth(&auth.username, Some(&auth.password))
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(%url, error = %e, "WordPress request failed");
            PlatformError::Unavailable(e.to_string())
        })?;
        let status = response.status();
        let headers = response.headers().clone();
        let raw = response.bytes().await.map_err(|e| {
            warn!(%url, error = %e, "WordPress response could not be read");
            PlatformError::Unavailable(e.to_string())
        })?;

        if status.is_success() {
            // Every endpoint used here answers with a JSON document.
            let payload: Value = serde_json::from_slice(&raw).map_err(|e| {
                warn!(%url, error = %e, "WordPress returned a non-JSON success body");
                PlatformError::Unavailable(format!("invalid JSON from {url}: {e}"))
            })?;
            Ok((payload, headers))
        } else {
            // Error bodies only refine the error code.
            let payload = serde_json::from_slice(&raw).unwrap_or(Value::Null);
            debug!(%method, %url, %status, "WordPress request returned an error");
            Err(error_from_response(status, &payload, path))
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> PlatformResult<Value> {
        Ok(self.send(Method::GET, path, query, None, None).await?.0)
    }

    async fn get_optional(&self, path: &str, query: &[(&str, String)]) -> PlatformResult<Option<Value>> {
        match self.get(path, query).await {
            Ok(value) => Ok(Some(value)),
            Err(PlatformError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn post(&self, path: &str, body: &Value) -> PlatformResult<Value> {
        Ok(self.send(Method::POST, path, &[], Some(body), None).await?.0)
    }

    async fn rest_base(&self, post_type: &str) -> PlatformResult<String> {
        let cached = self.rest_bases.read().get(post_type).cloned();
        if let Some(base) = cached {
            return Ok(base);
        }
        self.post_types().await?;
        self.rest_bases
            .read()
            .get(post_type)
            .cloned()
            .ok_or_else(|| PlatformError::not_found("post_type", post_type))
    }

    async fn taxonomy_rest_base(&self, taxonomy: &str) -> PlatformResult<String> {
        let value = self
            .get(&format!("/wp/v2/taxonomies/{taxonomy}"), &[("context", "edit".into())])
            .await?;
        Ok(value
            .get("rest_base")
            .and_then(Value::as_str)
            .unwrap_or(taxonomy)
            .to_string())
    }
}

// ---------------------------------------------------------------------------
// JSON mapping
// ---------------------------------------------------------------------------

fn error_from_response(status: StatusCode, payload: &Value, path: &str) -> PlatformError {
    let code = payload
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("http_error")
        .to_string();
    match status {
        StatusCode::NOT_FOUND => PlatformError::not_found("resource", path),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Rejected(code),
        s if s.is_server_error() => PlatformError::Unavailable(format!("{s}: {code}")),
        _ if code == "term_exists" || code.starts_with("existing_user") => {
            PlatformError::Conflict(code)
        }
        _ => PlatformError::Invalid(code),
    }
}

fn descriptor_from_index(index: &Value) -> PlatformDescriptor {
    let commerce = index
        .get("namespaces")
        .and_then(Value::as_array)
        .map(|ns| ns.iter().any(|n| n.as_str() == Some("wc/v3")))
        .unwrap_or(false);
    let application_passwords = index
        .get("authentication")
        .and_then(|a| a.get("application-passwords"))
        .is_some();
    PlatformDescriptor {
        commerce,
        application_passwords,
    }
}

fn text(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(obj)) => obj
            .get("raw")
            .or_else(|| obj.get("rendered"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn id(value: &Value, key: &str) -> u64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn money(value: &Value, key: &str) -> Option<f64> {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}

fn ids(value: &Value, key: &str) -> Vec<u64> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_u64).collect())
        .unwrap_or_default()
}

/// Prefer the `_gmt` variant of a date field; WordPress omits the offset.
fn date(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    let raw = value
        .get(format!("{key}_gmt").as_str())
        .or_else(|| value.get(key))
        .and_then(Value::as_str)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|n| n.and_utc())
        })
}

fn required_date(value: &Value, key: &str) -> PlatformResult<DateTime<Utc>> {
    date(value, key).ok_or_else(|| {
        PlatformError::Invalid(format!("response is missing a readable {key}"))
    })
}

fn address(value: &Value, key: &str) -> Address {
    value
        .get(key)
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn status(value: &Value) -> PostStatus {
    PostStatus::parse(&text(value, "status")).unwrap_or(PostStatus::Draft)
}

fn content_from_json(value: &Value, post_type: &str) -> PlatformResult<ContentItem> {
    let meta = value
        .get("meta")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| match v {
                    Value::String(s) => Some((k.clone(), s.clone())),
                    Value::Number(n) => Some((k.clone(), n.to_string())),
                    Value::Bool(b) => Some((k.clone(), b.to_string())),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ContentItem {
        id: id(value, "id"),
        post_type: post_type.to_string(),
        title: text(value, "title"),
        content: text(value, "content"),
        excerpt: text(value, "excerpt"),
        slug: text(value, "slug"),
        status: status(value),
        author_id: id(value, "author"),
        url: text(value, "link"),
        date: required_date(value, "date")?,
        meta,
    })
}

fn term_from_json(value: &Value, taxonomy: &str) -> Term {
    Term {
        id: id(value, "id"),
        taxonomy: taxonomy.to_string(),
        name: text(value, "name"),
        slug: text(value, "slug"),
        description: text(value, "description"),
        count: id(value, "count"),
        parent_id: id(value, "parent"),
        url: text(value, "link"),
    }
}

fn product_from_json(value: &Value) -> PlatformResult<Product> {
    let categories = value
        .get("categories")
        .and_then(Value::as_array)
        .map(|cats| {
            cats.iter()
                .map(|c| TermRef {
                    id: id(c, "id"),
                    name: text(c, "name"),
                })
                .collect()
        })
        .unwrap_or_default();
    let image_url = value
        .get("images")
        .and_then(Value::as_array)
        .and_then(|images| images.first())
        .map(|img| text(img, "src"))
        .filter(|src| !src.is_empty());
    let stock_status = match text(value, "stock_status").as_str() {
        "outofstock" => StockStatus::OutOfStock,
        _ => StockStatus::InStock,
    };

    Ok(Product {
        id: id(value, "id"),
        name: text(value, "name"),
        description: text(value, "description"),
        short_description: text(value, "short_description"),
        status: status(value),
        sku: text(value, "sku"),
        regular_price: money(value, "regular_price"),
        sale_price: money(value, "sale_price"),
        stock_status,
        manage_stock: value.get("manage_stock").and_then(Value::as_bool).unwrap_or(false),
        stock_quantity: value.get("stock_quantity").and_then(Value::as_i64),
        categories,
        url: text(value, "permalink"),
        image_url,
        average_rating: money(value, "average_rating").unwrap_or(0.0),
        total_sales: id(value, "total_sales"),
        upsell_ids: ids(value, "upsell_ids"),
        cross_sell_ids: ids(value, "cross_sell_ids"),
        date_created: required_date(value, "date_created")?,
    })
}

fn order_from_json(value: &Value) -> PlatformResult<Order> {
    let line_items = value
        .get("line_items")
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .map(|l| OrderLine {
                    product_id: id(l, "product_id"),
                    name: text(l, "name"),
                    quantity: u32::try_from(id(l, "quantity")).unwrap_or(u32::MAX),
                    subtotal: money(l, "subtotal").unwrap_or(0.0),
                    total: money(l, "total").unwrap_or(0.0),
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let subtotal = line_items.iter().map(|l| l.subtotal).sum();

    Ok(Order {
        id: id(value, "id"),
        status: text(value, "status"),
        customer_id: id(value, "customer_id"),
        currency: text(value, "currency"),
        billing: address(value, "billing"),
        shipping: address(value, "shipping"),
        line_items,
        subtotal,
        total_tax: money(value, "total_tax").unwrap_or(0.0),
        shipping_total: money(value, "shipping_total").unwrap_or(0.0),
        total: money(value, "total").unwrap_or(0.0),
        payment_method: text(value, "payment_method_title"),
        transaction_id: text(value, "transaction_id"),
        date_created: required_date(value, "date_created")?,
        date_modified: date(value, "date_modified"),
    })
}

fn account_from_json(value: &Value) -> Account {
    Account {
        id: id(value, "id"),
        username: text(value, "username"),
        email: text(value, "email"),
        display_name: text(value, "name"),
        roles: value
            .get("roles")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default(),
    }
}

fn principal_from_json(value: &Value) -> Principal {
    let account = account_from_json(value);
    let permissions = value
        .get("capabilities")
        .and_then(Value::as_object)
        .map(|caps| {
            caps.iter()
                .filter(|(_, granted)| granted.as_bool().unwrap_or(false))
                .map(|(cap, _)| cap.clone())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Principal::new(account.id, account.username, account.roles, permissions)
}

fn create_permission_for(post_type: &str) -> &'static str {
    match post_type {
        "page" => "edit_pages",
        "product" => "edit_products",
        _ => "edit_posts",
    }
}

fn page_params(per_page: u32, page: u32) -> [(&'static str, String); 2] {
    [
        ("per_page", per_page.clamp(1, 100).to_string()),
        ("page", page.max(1).to_string()),
    ]
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

#[async_trait]
impl ContentStore for WordPressClient {
    async fn post_types(&self) -> PlatformResult<Vec<PostType>> {
        let types = self.get("/wp/v2/types", &[("context", "edit".into())]).await?;
        let Some(types) = types.as_object() else {
            return Ok(vec![]);
        };

        let mut result = Vec::with_capacity(types.len());
        let mut bases = HashMap::with_capacity(types.len());
        for (slug, def) in types {
            let rest_base = def
                .get("rest_base")
                .and_then(Value::as_str)
                .unwrap_or(slug);
            bases.insert(slug.clone(), rest_base.to_string());
            result.push(PostType {
                slug: slug.clone(),
                label: text(def, "name"),
                public: def.get("viewable").and_then(Value::as_bool).unwrap_or(true),
                hierarchical: def.get("hierarchical").and_then(Value::as_bool).unwrap_or(false),
                create_permission: create_permission_for(slug).to_string(),
            });
        }
        *self.rest_bases.write() = bases;
        Ok(result)
    }

    async fn search(&self, query: &ContentQuery) -> PlatformResult<Page<ContentItem>> {
        let base = self.rest_base(&query.post_type).await?;
        let mut params = vec![
            ("context", "edit".to_string()),
            (
                "status",
                match query.status {
                    StatusFilter::Published => "publish".into(),
                    StatusFilter::Any => "any".into(),
                },
            ),
        ];
        if !query.keyword.is_empty() {
            params.push(("search", query.keyword.clone()));
        }
        params.extend(page_params(query.per_page, query.page));

        let (body, headers) = self
            .send(Method::GET, &format!("/wp/v2/{base}"), &params, None, None)
            .await?;
        let items: Vec<ContentItem> = match body.as_array() {
            Some(rows) => rows
                .iter()
                .map(|r| content_from_json(r, &query.post_type))
                .collect::<PlatformResult<_>>()?,
            None => vec![],
        };

        // REST has no meta query; filter the fetched page.
        if !query.meta.is_empty() {
            let items: Vec<ContentItem> = items
                .into_iter()
                .filter(|c| {
                    query
                        .meta
                        .iter()
                        .all(|m| c.meta.get(&m.key).map(|v| v == &m.value).unwrap_or(false))
                })
                .collect();
            let total = items.len() as u64;
            return Ok(Page { items, total });
        }

        let total = headers
            .get("x-wp-total")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(items.len() as u64);
        Ok(Page { items, total })
    }

    async fn create(&self, item: NewContent) -> PlatformResult<ContentItem> {
        let base = self.rest_base(&item.post_type).await?;
        let mut body = json!({
            "title": item.title,
            "content": item.content,
            "excerpt": item.excerpt,
            "status": item.status.as_str(),
        });
        if let Some(slug) = &item.slug {
            body["slug"] = json!(slug);
        }
        if item.author_id > 0 {
            body["author"] = json!(item.author_id);
        }
        let created = self.post(&format!("/wp/v2/{base}"), &body).await?;
        content_from_json(&created, &item.post_type)
    }
}

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

#[async_trait]
impl TaxonomyStore for WordPressClient {
    async fn taxonomy(&self, slug: &str) -> PlatformResult<Option<Taxonomy>> {
        let found = self
            .get_optional(&format!("/wp/v2/taxonomies/{slug}"), &[("context", "edit".into())])
            .await?;
        Ok(found.map(|t| Taxonomy {
            slug: slug.to_string(),
            hierarchical: t.get("hierarchical").and_then(Value::as_bool).unwrap_or(false),
        }))
    }

    async fn search_terms(&self, query: &TermQuery) -> PlatformResult<Vec<Term>> {
        let base = self.taxonomy_rest_base(&query.taxonomy).await?;
        let mut params = vec![
            ("hide_empty", "false".to_string()),
            ("per_page", query.per_page.clamp(1, 100).to_string()),
        ];
        if !query.keyword.is_empty() {
            params.push(("search", query.keyword.clone()));
        }
        if let Some(parent) = query.parent_id {
            params.push(("parent", parent.to_string()));
        }
        let rows = self.get(&format!("/wp/v2/{base}"), &params).await?;
        Ok(rows
            .as_array()
            .map(|rows| rows.iter().map(|r| term_from_json(r, &query.taxonomy)).collect())
            .unwrap_or_default())
    }

    async fn create_term(&self, term: NewTerm) -> PlatformResult<Term> {
        let base = self.taxonomy_rest_base(&term.taxonomy).await?;
        let mut body = json!({
            "name": term.name,
            "description": term.description,
        });
        if let Some(slug) = &term.slug {
            body["slug"] = json!(slug);
        }
        if term.parent_id > 0 {
            body["parent"] = json!(term.parent_id);
        }
        let created = self.post(&format!("/wp/v2/{base}"), &body).await?;
        Ok(term_from_json(&created, &term.taxonomy))
    }
}

// ---------------------------------------------------------------------------
// Commerce
// ---------------------------------------------------------------------------

impl WordPressClient {
    async fn product_list(&self, params: &[(&str, String)]) -> PlatformResult<Vec<Product>> {
        let rows = self.get("/wc/v3/products", params).await?;
        match rows.as_array() {
            Some(rows) => rows.iter().map(product_from_json).collect(),
            None => Ok(vec![]),
        }
    }

    async fn ranked_products(
        &self,
        orderby: &str,
        category_id: Option<u64>,
        limit: usize,
    ) -> PlatformResult<Vec<Product>> {
        let mut params = vec![
            ("status", "publish".to_string()),
            ("orderby", orderby.to_string()),
            ("order", "desc".to_string()),
            ("per_page", limit.clamp(1, 100).to_string()),
        ];
        if let Some(cat) = category_id {
            params.push(("category", cat.to_string()));
        }
        self.product_list(&params).await
    }
}

#[async_trait]
impl CommerceStore for WordPressClient {
    async fn search_products(&self, query: &ProductQuery) -> PlatformResult<Vec<Product>> {
        let mut params = vec![("status", "publish".to_string())];
        if !query.keyword.is_empty() {
            params.push(("search", query.keyword.clone()));
        }
        if let Some(cat) = query.category_id {
            params.push(("category", cat.to_string()));
        }
        if let Some(stock) = query.stock_status {
            params.push(("stock_status", stock.as_str().to_string()));
        }
        params.extend(page_params(query.per_page, query.page));
        self.product_list(&params).await
    }

    async fn product(&self, id: u64) -> PlatformResult<Option<Product>> {
        self.get_optional(&format!("/wc/v3/products/{id}"), &[])
            .await?
            .map(|p| product_from_json(&p))
            .transpose()
    }

    async fn create_product(&self, product: NewProduct) -> PlatformResult<Product> {
        let mut body = json!({
            "name": product.name,
            "type": "simple",
            "status": product.status.as_str(),
            "description": product.description,
            "short_description": product.short_description,
            "manage_stock": product.manage_stock,
            "categories": product.category_ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>(),
        });
        if let Some(price) = product.regular_price {
            body["regular_price"] = json!(price.to_string());
        }
        if let Some(price) = product.sale_price {
            body["sale_price"] = json!(price.to_string());
        }
        if let Some(sku) = &product.sku {
            body["sku"] = json!(sku);
        }
        if product.manage_stock {
            if let Some(quantity) = product.stock_quantity {
                body["stock_quantity"] = json!(quantity);
            }
        }
        let created = self.post("/wc/v3/products", &body).await?;
        product_from_json(&created)
    }

    async fn product_categories(&self, query: &TermQuery) -> PlatformResult<Vec<Term>> {
        let mut params = vec![
            ("hide_empty", "false".to_string()),
            ("per_page", query.per_page.clamp(1, 100).to_string()),
        ];
        if !query.keyword.is_empty() {
            params.push(("search", query.keyword.clone()));
        }
        if let Some(parent) = query.parent_id {
            params.push(("parent", parent.to_string()));
        }
        let rows = self.get("/wc/v3/products/categories", &params).await?;
        Ok(rows
            .as_array()
            .map(|rows| rows.iter().map(|r| term_from_json(r, "product_cat")).collect())
            .unwrap_or_default())
    }

    async fn create_order(&self, order: NewOrder) -> PlatformResult<Order> {
        let mut body = Map::new();
        body.insert("customer_id".into(), json!(order.customer_id));
        body.insert("set_paid".into(), json!(false));
        body.insert(
            "line_items".into(),
            json!(order
                .lines
                .iter()
                .map(|l| json!({"product_id": l.product_id, "quantity": l.quantity}))
                .collect::<Vec<_>>()),
        );
        if let Some(billing) = &order.billing {
            body.insert("billing".into(), json!(billing));
        }
        if let Some(shipping) = &order.shipping {
            body.insert("shipping".into(), json!(shipping));
        }
        if let Some(status) = &order.status {
            body.insert("status".into(), json!(status));
        }
        let created = self.post("/wc/v3/orders", &Value::Object(body)).await?;
        order_from_json(&created)
    }

    async fn orders(&self, query: &OrderQuery) -> PlatformResult<Vec<Order>> {
        let mut params = Vec::new();
        if let Some(status) = &query.status {
            params.push(("status", status.clone()));
        }
        if let Some(customer) = query.customer_id {
            params.push(("customer", customer.to_string()));
        }
        // The REST bounds are exclusive; widen by one second.
        if let Some(after) = query.created_after {
            let after = after - chrono::Duration::seconds(1);
            params.push(("after", after.format("%Y-%m-%dT%H:%M:%S").to_string()));
        }
        if let Some(before) = query.created_before {
            let before = before + chrono::Duration::seconds(1);
            params.push(("before", before.format("%Y-%m-%dT%H:%M:%S").to_string()));
        }
        params.extend(page_params(query.per_page, query.page));

        let rows = self.get("/wc/v3/orders", &params).await?;
        match rows.as_array() {
            Some(rows) => rows.iter().map(order_from_json).collect(),
            None => Ok(vec![]),
        }
    }

    async fn order(&self, id: u64) -> PlatformResult<Option<Order>> {
        self.get_optional(&format!("/wc/v3/orders/{id}"), &[])
            .await?
            .map(|o| order_from_json(&o))
            .transpose()
    }

    async fn order_notes(&self, id: u64) -> PlatformResult<Vec<OrderNote>> {
        let rows = self.get(&format!("/wc/v3/orders/{id}/notes"), &[]).await?;
        match rows.as_array() {
            Some(rows) => rows
                .iter()
                .map(|n| -> PlatformResult<OrderNote> {
                    Ok(OrderNote {
                        date: required_date(n, "date_created")?,
                        note: text(n, "note"),
                    })
                })
                .collect(),
            None => Ok(vec![]),
        }
    }

    async fn related_ids(&self, id: u64, limit: usize) -> PlatformResult<Vec<u64>> {
        let Some(product) = self.get_optional(&format!("/wc/v3/products/{id}"), &[]).await? else {
            return Ok(vec![]);
        };
        let mut related = ids(&product, "related_ids");
        related.truncate(limit);
        Ok(related)
    }

    async fn bestsellers(&self, category_id: Option<u64>, limit: usize) -> PlatformResult<Vec<Product>> {
        self.ranked_products("popularity", category_id, limit).await
    }

    async fn newest(&self, category_id: Option<u64>, limit: usize) -> PlatformResult<Vec<Product>> {
        self.ranked_products("date", category_id, limit).await
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

impl WordPressClient {
    async fn find_users(&self, needle: &str) -> PlatformResult<Vec<Account>> {
        let rows = self
            .get(
                "/wp/v2/users",
                &[
                    ("search", needle.to_string()),
                    ("context", "edit".into()),
                    ("per_page", "100".into()),
                ],
            )
            .await?;
        Ok(rows
            .as_array()
            .map(|rows| rows.iter().map(account_from_json).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl IdentityStore for WordPressClient {
    async fn verify_application_password(
        &self,
        username: &str,
        password: &str,
    ) -> PlatformResult<Principal> {
        let caller = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let (me, _) = self
            .send(
                Method::GET,
                "/wp/v2/users/me",
                &[("context", "edit".into())],
                None,
                Some(&caller),
            )
            .await?;
        Ok(principal_from_json(&me))
    }

    async fn username_exists(&self, username: &str) -> PlatformResult<bool> {
        Ok(self
            .find_users(username)
            .await?
            .iter()
            .any(|a| a.username.eq_ignore_ascii_case(username)))
    }

    async fn email_exists(&self, email: &str) -> PlatformResult<bool> {
        Ok(self
            .find_users(email)
            .await?
            .iter()
            .any(|a| a.email.eq_ignore_ascii_case(email)))
    }

    async fn role_exists(&self, role: &str) -> PlatformResult<bool> {
        Ok(self.roles.role_exists(role))
    }

    async fn create_account(&self, account: NewAccount) -> PlatformResult<Account> {
        let body = json!({
            "username": account.username,
            "email": account.email,
            "password": account.password,
            "name": account.display_name,
            "roles": [account.role],
        });
        let created = self.post("/wp/v2/users", &body).await?;
        Ok(account_from_json(&created))
    }
}
