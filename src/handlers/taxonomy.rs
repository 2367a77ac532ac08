//! Category and tag search, category creation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::args::Args;
use super::{require_permission, DomainError, DomainResult, ToolHandler};
use crate::auth::Principal;
use crate::platform::{NewTerm, Platform, TermQuery};
use crate::sanitize::sanitize_title;

/// Taxonomies the term search may touch.
const SEARCHABLE_TAXONOMIES: [&str; 2] = ["category", "post_tag"];

/// Term search for `search_post_categories` and `search_tags`.
pub struct SearchTerms {
    platform: Arc<Platform>,
}

impl SearchTerms {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for SearchTerms {
    async fn call(&self, args: &Map<String, Value>, _principal: &Principal) -> DomainResult {
        let args = Args::new(args);
        let taxonomy = args.text("taxonomy").unwrap_or_else(|| "category".into());
        if !SEARCHABLE_TAXONOMIES.contains(&taxonomy.as_str()) {
            return Err(DomainError::new("invalid_taxonomy"));
        }
        let Some(info) = self.platform.taxonomy.taxonomy(&taxonomy).await? else {
            return Err(DomainError::new("taxonomy_not_found"));
        };

        let query = TermQuery {
            taxonomy,
            keyword: args.text("query").unwrap_or_default(),
            parent_id: args.id("parent_id").filter(|_| info.hierarchical),
            per_page: args.per_page(20),
        };
        let terms = self.platform.taxonomy.search_terms(&query).await?;

        let results: Vec<Value> = terms
            .iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "taxonomy": query.taxonomy,
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

pub struct CreateCategory {
    platform: Arc<Platform>,
}

impl CreateCategory {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for CreateCategory {
    async fn call(&self, args: &Map<String, Value>, principal: &Principal) -> DomainResult {
        require_permission(principal, "manage_categories")?;
        let args = Args::new(args);
        let name = args.required_text("name")?;

        let term = NewTerm {
            taxonomy: "category".into(),
            name,
            slug: args
                .verbatim("slug")
                .map(|s| sanitize_title(&s))
                .filter(|s| !s.is_empty()),
            parent_id: args.id("parent_id").unwrap_or(0),
            description: args.textarea("description").unwrap_or_default(),
        };
        let created = self.platform.taxonomy.create_term(term).await?;

        Ok(json!({
            "id": created.id,
            "taxonomy": created.taxonomy,
            "name": created.name,
            "url": created.url,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::*;

    fn term(taxonomy: &str, name: &str, parent_id: u64) -> NewTerm {
        NewTerm {
            taxonomy: taxonomy.into(),
            name: name.into(),
            slug: None,
            parent_id,
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_search_categories_with_parent() {
        let site = site();
        let news = site.insert_term(term("category", "News", 0)).unwrap();
        site.insert_term(term("category", "Local news", news.id)).unwrap();
        site.insert_term(term("category", "Sports", 0)).unwrap();
        let handler = SearchTerms::new(Arc::new(site.platform()));
        let reader = principal(&["subscriber"]);

        let out = handler
            .call(&args(json!({"taxonomy": "category"})), &reader)
            .await
            .unwrap();
        assert_eq!(out["results"].as_array().unwrap().len(), 3);

        let out = handler
            .call(
                &args(json!({"taxonomy": "category", "parent_id": news.id})),
                &reader,
            )
            .await
            .unwrap();
        let results = out["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["name"], "Local news");
        assert_eq!(results[0]["parent_id"], news.id);
        assert_eq!(results[0]["taxonomy"], "category");
    }

    #[tokio::test]
    async fn test_search_tags_ignores_parent() {
        let site = site();
        site.insert_term(term("post_tag", "rust", 0)).unwrap();
        site.insert_term(term("post_tag", "async", 0)).unwrap();
        let handler = SearchTerms::new(Arc::new(site.platform()));

        let out = handler
            .call(
                &args(json!({"taxonomy": "post_tag", "parent_id": 99, "query": "rus"})),
                &principal(&["subscriber"]),
            )
            .await
            .unwrap();
        let results = out["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["url"], "https://site.test/tag/rust/");
    }

    #[tokio::test]
    async fn test_search_rejects_other_taxonomies() {
        let handler = SearchTerms::new(Arc::new(shop().platform()));
        let err = handler
            .call(&args(json!({"taxonomy": "product_cat"})), &principal(&["subscriber"]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_taxonomy");
    }

    #[tokio::test]
    async fn test_create_category() {
        let site = site();
        let handler = CreateCategory::new(Arc::new(site.platform()));
        let editor = principal(&["editor"]);

        let out = handler
            .call(
                &args(json!({"name": " Travel ", "description": "Trips\nand <b>tours</b>"})),
                &editor,
            )
            .await
            .unwrap();
        assert_eq!(out["taxonomy"], "category");
        assert_eq!(out["name"], "Travel");
        assert_eq!(out["url"], "https://site.test/category/travel/");

        let err = handler
            .call(&args(json!({"name": "Travel"})), &editor)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
        assert_eq!(site.term_count(), 1);
    }

    #[tokio::test]
    async fn test_create_category_checks() {
        let site = site();
        let handler = CreateCategory::new(Arc::new(site.platform()));

        let err = handler
            .call(&args(json!({"name": "Travel"})), &principal(&["author"]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "insufficient_capability");

        let err = handler
            .call(&args(json!({"name": "   "})), &principal(&["editor"]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "name required");
        assert_eq!(site.term_count(), 0);
    }
}
