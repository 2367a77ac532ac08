//! Product recommendations.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::args::{Args, MAX_PER_PAGE};
use super::products::format_price;
use super::{commerce, DomainError, DomainResult, ToolHandler};
use crate::auth::Principal;
use crate::platform::{CommerceStore, Platform, PlatformResult, Product};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Related,
    Upsell,
    CrossSell,
    Bestseller,
    NewArrivals,
}

impl Strategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "related" => Some(Strategy::Related),
            "upsell" => Some(Strategy::Upsell),
            "crosssell" => Some(Strategy::CrossSell),
            "bestseller" => Some(Strategy::Bestseller),
            "new_arrivals" => Some(Strategy::NewArrivals),
            _ => None,
        }
    }

    /// Strategies that start from a source product.
    fn needs_product(&self) -> bool {
        matches!(self, Strategy::Related | Strategy::Upsell | Strategy::CrossSell)
    }
}

fn recommendation(p: &Product) -> Value {
    json!({
        "id": p.id,
        "name": p.name,
        "price": format_price(p.price()),
        "url": p.url,
        "image_url": p.image_url.clone().unwrap_or_default(),
        "rating": p.average_rating,
        "sales_count": p.total_sales,
    })
}

async fn load_all(store: &dyn CommerceStore, ids: &[u64]) -> PlatformResult<Vec<Product>> {
    let mut products = Vec::with_capacity(ids.len());
    for &id in ids {
        if let Some(product) = store.product(id).await? {
            products.push(product);
        }
    }
    Ok(products)
}

pub struct RecommendProducts {
    platform: Arc<Platform>,
}

impl RecommendProducts {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }

    async fn from_source(
        &self,
        store: &dyn CommerceStore,
        strategy: Strategy,
        product_id: u64,
        limit: usize,
    ) -> PlatformResult<Vec<Product>> {
        let ids = match strategy {
            Strategy::Related => store.related_ids(product_id, limit).await?,
            Strategy::Upsell | Strategy::CrossSell => {
                let Some(source) = store.product(product_id).await? else {
                    return Ok(vec![]);
                };
                let ids = if strategy == Strategy::Upsell {
                    source.upsell_ids
                } else {
                    source.cross_sell_ids
                };
                ids.into_iter().take(limit).collect()
            }
            Strategy::Bestseller | Strategy::NewArrivals => vec![],
        };
        load_all(store, &ids).await
    }
}

#[async_trait]
impl ToolHandler for RecommendProducts {
    async fn call(&self, args: &Map<String, Value>, _principal: &Principal) -> DomainResult {
        let store = commerce(&self.platform)?;
        let args = Args::new(args);
        let strategy_name = args.text("strategy").unwrap_or_else(|| "related".into());
        let strategy =
            Strategy::parse(&strategy_name).ok_or_else(|| DomainError::new("unknown_strategy"))?;
        let limit = args.integer_or("limit", 5, 1).min(i64::from(MAX_PER_PAGE)) as usize;
        let category_id = args.id("category_id");

        let mut products = if strategy.needs_product() {
            match args.id("product_id") {
                Some(product_id) => {
                    self.from_source(store.as_ref(), strategy, product_id, limit)
                        .await?
                }
                None => vec![],
            }
        } else if strategy == Strategy::Bestseller {
            store.bestsellers(category_id, limit).await?
        } else {
            store.newest(category_id, limit).await?
        };
        if let Some(category_id) = category_id {
            products.retain(|p| p.categories.iter().any(|c| c.id == category_id));
        }
        products.truncate(limit);
        debug!(strategy = %strategy_name, count = products.len(), "Recommendations");

        let results: Vec<Value> = products.iter().map(recommendation).collect();
        Ok(json!({ "results": results }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::*;
    use crate::platform::memory::InMemoryPlatform;
    use crate::platform::{NewProduct, NewTerm, PostStatus};
    use chrono::{Duration, Utc};

    struct Catalog {
        shop: Arc<InMemoryPlatform>,
        mugs: u64,
        ids: Vec<u64>,
    }

    /// Four mugs with increasing sales and one poster.
    fn catalog() -> Catalog {
        let shop = shop();
        let mugs = shop
            .insert_term(NewTerm {
                taxonomy: "product_cat".into(),
                name: "Mugs".into(),
                slug: None,
                parent_id: 0,
                description: String::new(),
            })
            .unwrap()
            .id;
        let mut ids = vec![];
        for (i, name) in ["Mug A", "Mug B", "Mug C", "Mug D", "Poster"].iter().enumerate() {
            let categories = if name.starts_with("Mug") { vec![mugs] } else { vec![] };
            let product = shop
                .insert_product(NewProduct {
                    name: name.to_string(),
                    description: String::new(),
                    short_description: String::new(),
                    status: PostStatus::Publish,
                    sku: None,
                    regular_price: Some(10.0 + i as f64),
                    sale_price: None,
                    manage_stock: false,
                    stock_quantity: None,
                    category_ids: categories,
                })
                .unwrap();
            shop.set_product_stats(product.id, (i as u64 + 1) * 10, 4.5).unwrap();
            shop.set_product_created(product.id, Utc::now() - Duration::days(10 - i as i64))
                .unwrap();
            ids.push(product.id);
        }
        Catalog { shop, mugs, ids }
    }

    async fn recommend(catalog: &Catalog, input: Value) -> DomainResult {
        RecommendProducts::new(Arc::new(catalog.shop.platform()))
            .call(&args(input), &principal(&["customer"]))
            .await
    }

    fn names(out: &Value) -> Vec<&str> {
        out["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_related_by_shared_category() {
        let catalog = catalog();
        let out = recommend(&catalog, json!({"product_id": catalog.ids[0], "limit": 2}))
            .await
            .unwrap();
        assert_eq!(names(&out), vec!["Mug D", "Mug C"]);
        assert_eq!(out["results"][0]["sales_count"], 40);
        assert_eq!(out["results"][0]["rating"], 4.5);
        assert_eq!(out["results"][0]["price"], "13");
    }

    #[tokio::test]
    async fn test_source_strategies_need_product() {
        let catalog = catalog();
        for strategy in ["related", "upsell", "crosssell"] {
            let out = recommend(&catalog, json!({"strategy": strategy})).await.unwrap();
            assert_eq!(out, json!({"results": []}));
        }
    }

    #[tokio::test]
    async fn test_upsell_and_crosssell() {
        let catalog = catalog();
        let ids = &catalog.ids;
        catalog
            .shop
            .set_product_links(ids[0], &[ids[4], ids[2], 9999], &[ids[1]])
            .unwrap();

        let out = recommend(&catalog, json!({"strategy": "upsell", "product_id": ids[0]}))
            .await
            .unwrap();
        assert_eq!(names(&out), vec!["Poster", "Mug C"]);

        let out = recommend(
            &catalog,
            json!({"strategy": "upsell", "product_id": ids[0], "category_id": catalog.mugs}),
        )
        .await
        .unwrap();
        assert_eq!(names(&out), vec!["Mug C"]);

        let out = recommend(&catalog, json!({"strategy": "crosssell", "product_id": ids[0]}))
            .await
            .unwrap();
        assert_eq!(names(&out), vec!["Mug B"]);
    }

    #[tokio::test]
    async fn test_bestseller_and_new_arrivals() {
        let catalog = catalog();
        let out = recommend(&catalog, json!({"strategy": "bestseller", "limit": 3}))
            .await
            .unwrap();
        assert_eq!(names(&out), vec!["Poster", "Mug D", "Mug C"]);

        let out = recommend(
            &catalog,
            json!({"strategy": "new_arrivals", "category_id": catalog.mugs, "limit": "2"}),
        )
        .await
        .unwrap();
        assert_eq!(names(&out), vec!["Mug D", "Mug C"]);
    }

    #[tokio::test]
    async fn test_unknown_strategy() {
        let catalog = catalog();
        let err = recommend(&catalog, json!({"strategy": "random"})).await.unwrap_err();
        assert_eq!(err.code(), "unknown_strategy");
    }
}
