//! Product search, creation and product categories.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::args::Args;
use super::{commerce, require_permission, DomainResult, ToolHandler};
use crate::auth::Principal;
use crate::platform::{NewProduct, Platform, PostStatus, Product, ProductQuery, StockStatus, TermQuery};
use crate::sanitize::sanitize_html;

/// Decimal rendering of a price the way the store stores it: `12.5`, `12`,
/// or an empty string when unset.
pub(crate) fn format_price(price: Option<f64>) -> String {
    price.map(|p| p.to_string()).unwrap_or_default()
}

fn product_summary(p: &Product) -> Value {
    let categories: Vec<Value> = p
        .categories
        .iter()
        .map(|c| json!({ "id": c.id, "name": c.name }))
        .collect();
    json!({
        "id": p.id,
        "name": p.name,
        "price": format_price(p.price()),
        "regular_price": format_price(p.regular_price),
        "sale_price": format_price(p.sale_price),
        "stock_status": p.stock_status.as_str(),
        "categories": categories,
        "url": p.url,
        "image_url": p.image_url.clone().unwrap_or_default(),
    })
}

// ---------------------------------------------------------------------------
// search_products
// ---------------------------------------------------------------------------

pub struct SearchProducts {
    platform: Arc<Platform>,
}

impl SearchProducts {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for SearchProducts {
    async fn call(&self, args: &Map<String, Value>, _principal: &Principal) -> DomainResult {
        let store = commerce(&self.platform)?;
        let args = Args::new(args);
        let query = ProductQuery {
            keyword: args.text("query").unwrap_or_default(),
            category_id: args.id("category_id"),
            stock_status: args.boolean("in_stock").map(|in_stock| {
                if in_stock {
                    StockStatus::InStock
                } else {
                    StockStatus::OutOfStock
                }
            }),
            per_page: args.per_page(10),
            page: args.page(),
        };
        let min_price = args.number("min_price");
        let max_price = args.number("max_price");

        // Price bounds apply to the fetched page, after the store query.
        let results: Vec<Value> = store
            .search_products(&query)
            .await?
            .iter()
            .filter(|p| {
                let price = p.price().unwrap_or(0.0);
                min_price.map(|min| price >= min).unwrap_or(true)
                    && max_price.map(|max| price <= max).unwrap_or(true)
            })
            .map(product_summary)
            .collect();
        debug!(count = results.len(), "Product search");
        Ok(json!({ "results": results }))
    }
}

// ---------------------------------------------------------------------------
// create_product
// ---------------------------------------------------------------------------

pub struct CreateProduct {
    platform: Arc<Platform>,
}

impl CreateProduct {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for CreateProduct {
    async fn call(&self, args: &Map<String, Value>, principal: &Principal) -> DomainResult {
        let store = commerce(&self.platform)?;
        require_permission(principal, "manage_woocommerce")?;
        let args = Args::new(args);
        let name = args.required_text("name")?;

        let manage_stock = args.boolean("manage_stock").unwrap_or(false);
        let product = NewProduct {
            name,
            description: args
                .verbatim("description")
                .map(|d| sanitize_html(&d))
                .unwrap_or_default(),
            short_description: args.textarea("short_description").unwrap_or_default(),
            status: args
                .text("status")
                .and_then(|s| PostStatus::parse(&s))
                .unwrap_or(PostStatus::Draft),
            sku: args.text("sku"),
            regular_price: args.number("regular_price"),
            sale_price: args.number("sale_price"),
            manage_stock,
            stock_quantity: manage_stock
                .then(|| args.integer("stock_quantity").unwrap_or(0).max(0)),
            category_ids: args.id_list("category_ids"),
        };
        let created = store.create_product(product).await?;
        debug!(id = created.id, "Product created");

        Ok(json!({
            "id": created.id,
            "post_type": "product",
            "status": created.status.as_str(),
            "url": created.url,
        }))
    }
}

// ---------------------------------------------------------------------------
// search_product_categories
// ---------------------------------------------------------------------------

pub struct SearchProductCategories {
    platform: Arc<Platform>,
}

impl SearchProductCategories {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for SearchProductCategories {
    async fn call(&self, args: &Map<String, Value>, _principal: &Principal) -> DomainResult {
        let store = commerce(&self.platform)?;
        let args = Args::new(args);
        let query = TermQuery {
            taxonomy: String::new(),
            keyword: args.text("query").unwrap_or_default(),
            // Zero means top level, and is also the default.
            parent_id: Some(args.integer("parent_id").unwrap_or(0).max(0) as u64),
            per_page: args.per_page(20),
        };
        let results: Vec<Value> = store
            .product_categories(&query)
            .await?
            .iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "name": t.name,
                    "slug": t.slug,
                    "count": t.count,
                    "url": t.url,
                    "parent_id": t.parent_id,
                })
            })
            .collect();
        Ok(json!({ "results": results }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::*;
    use crate::platform::{CommerceStore, NewTerm};

    fn product(name: &str, price: f64, categories: Vec<u64>) -> NewProduct {
        NewProduct {
            name: name.into(),
            description: String::new(),
            short_description: String::new(),
            status: PostStatus::Publish,
            sku: None,
            regular_price: Some(price),
            sale_price: None,
            manage_stock: false,
            stock_quantity: None,
            category_ids: categories,
        }
    }

    fn category(name: &str, parent_id: u64) -> NewTerm {
        NewTerm {
            taxonomy: "product_cat".into(),
            name: name.into(),
            slug: None,
            parent_id,
            description: String::new(),
        }
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(Some(12.5)), "12.5");
        assert_eq!(format_price(Some(12.0)), "12");
        assert_eq!(format_price(None), "");
    }

    #[tokio::test]
    async fn test_search_products_filters() {
        let shop = shop();
        let mugs = shop.insert_term(category("Mugs", 0)).unwrap();
        shop.insert_product(product("Blue mug", 8.0, vec![mugs.id])).unwrap();
        shop.insert_product(product("Red mug", 15.0, vec![mugs.id])).unwrap();
        shop.insert_product(product("Poster", 30.0, vec![])).unwrap();
        let handler = SearchProducts::new(Arc::new(shop.platform()));
        let reader = principal(&["customer"]);

        let out = handler
            .call(&args(json!({"category_id": mugs.id, "max_price": "10"})), &reader)
            .await
            .unwrap();
        let results = out["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["name"], "Blue mug");
        assert_eq!(results[0]["price"], "8");
        assert_eq!(results[0]["stock_status"], "instock");
        assert_eq!(results[0]["categories"][0]["name"], "Mugs");
        assert_eq!(results[0]["image_url"], "");

        let out = handler
            .call(&args(json!({"query": "poster", "min_price": 20})), &reader)
            .await
            .unwrap();
        assert_eq!(out["results"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_products_in_stock() {
        let shop = shop();
        shop.insert_product(NewProduct {
            manage_stock: true,
            stock_quantity: Some(0),
            ..product("Sold out", 5.0, vec![])
        })
        .unwrap();
        shop.insert_product(product("Available", 5.0, vec![])).unwrap();
        let handler = SearchProducts::new(Arc::new(shop.platform()));
        let reader = principal(&["customer"]);

        let out = handler
            .call(&args(json!({"in_stock": true})), &reader)
            .await
            .unwrap();
        assert_eq!(out["results"][0]["name"], "Available");
        let out = handler
            .call(&args(json!({"in_stock": "0"})), &reader)
            .await
            .unwrap();
        assert_eq!(out["results"][0]["name"], "Sold out");
    }

    #[tokio::test]
    async fn test_search_without_commerce() {
        let handler = SearchProducts::new(Arc::new(site().platform()));
        let err = handler
            .call(&args(json!({})), &principal(&["administrator"]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "backend_unavailable");
    }

    #[tokio::test]
    async fn test_create_product() {
        let shop = shop();
        let mugs = shop.insert_term(category("Mugs", 0)).unwrap();
        let handler = CreateProduct::new(Arc::new(shop.platform()));

        let out = handler
            .call(
                &args(json!({
                    "name": "Green mug",
                    "status": "publish",
                    "regular_price": "12.50",
                    "manage_stock": true,
                    "stock_quantity": -3,
                    "category_ids": [mugs.id, 999]
                })),
                &principal(&["shop_manager"]),
            )
            .await
            .unwrap();
        assert_eq!(out["post_type"], "product");
        assert_eq!(out["status"], "publish");
        assert_eq!(out["url"], "https://shop.test/product/green-mug/");

        let id = out["id"].as_u64().unwrap();
        let stored = shop.product(id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, Some(0));
        assert_eq!(stored.stock_status, StockStatus::OutOfStock);
        assert_eq!(stored.regular_price, Some(12.5));
        assert_eq!(stored.categories.len(), 1);
    }

    #[tokio::test]
    async fn test_create_product_checks() {
        let shop = shop();
        let handler = CreateProduct::new(Arc::new(shop.platform()));

        let err = handler
            .call(&args(json!({"name": "Mug"})), &principal(&["editor"]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "insufficient_capability");

        let err = handler
            .call(&args(json!({})), &principal(&["administrator"]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "name required");
        assert_eq!(shop.product_count(), 0);
    }

    #[tokio::test]
    async fn test_product_categories_top_level_by_default() {
        let shop = shop();
        let clothing = shop.insert_term(category("Clothing", 0)).unwrap();
        shop.insert_term(category("Shirts", clothing.id)).unwrap();
        let handler = SearchProductCategories::new(Arc::new(shop.platform()));
        let reader = principal(&["customer"]);

        let out = handler.call(&args(json!({})), &reader).await.unwrap();
        let results = out["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["name"], "Clothing");
        assert_eq!(results[0]["url"], "https://shop.test/product-category/clothing/");

        let out = handler
            .call(&args(json!({"parent_id": clothing.id})), &reader)
            .await
            .unwrap();
        assert_eq!(out["results"][0]["name"], "Shirts");
    }
}
