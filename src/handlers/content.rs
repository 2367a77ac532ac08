//! Content search and creation: posts, pages and custom post types.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::args::Args;
use super::{require_permission, DomainError, DomainResult, PostTypePolicy, ToolHandler};
use crate::auth::Principal;
use crate::platform::{
    ContentItem, ContentQuery, MetaFilter, NewContent, Platform, PostStatus, PostType, StatusFilter,
};
use crate::sanitize::{sanitize_html, sanitize_text, sanitize_title, trim_words};

const EXCERPT_WORDS: usize = 55;

/// Built-in types that bypass the custom-type allow-list.
const CORE_TYPES: [&str; 2] = ["post", "page"];

fn excerpt_of(item: &ContentItem) -> String {
    let source = if item.excerpt.trim().is_empty() {
        &item.content
    } else {
        &item.excerpt
    };
    trim_words(source, EXCERPT_WORDS)
}

async fn public_type(platform: &Platform, slug: &str) -> Result<PostType, DomainError> {
    match platform.content.post_type(slug).await? {
        Some(post_type) if post_type.public => Ok(post_type),
        _ => Err(DomainError::new("invalid_post_type")),
    }
}

// ---------------------------------------------------------------------------
// search_posts / search_pages
// ---------------------------------------------------------------------------

/// Keyword search over published items of one public type.
pub struct SearchContent {
    platform: Arc<Platform>,
}

impl SearchContent {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for SearchContent {
    async fn call(&self, args: &Map<String, Value>, _principal: &Principal) -> DomainResult {
        let args = Args::new(args);
        let post_type = args.text("post_type").unwrap_or_else(|| "post".into());
        public_type(&self.platform, &post_type).await?;

        let query = ContentQuery {
            post_type,
            keyword: args.text("query").unwrap_or_default(),
            status: StatusFilter::Published,
            meta: vec![],
            per_page: args.per_page(10),
            page: args.page(),
        };
        let page = self.platform.content.search(&query).await?;
        debug!(post_type = %query.post_type, total = page.total, "Content search");

        let results: Vec<Value> = page
            .items
            .iter()
            .map(|item| {
                json!({
                    "id": item.id,
                    "title": item.title,
                    "excerpt": excerpt_of(item),
                    "url": item.url,
                    "date": item.date.to_rfc3339_opts(SecondsFormat::Secs, false),
                    "status": item.status.as_str(),
                })
            })
            .collect();
        Ok(json!({ "results": results, "total": page.total }))
    }
}

// ---------------------------------------------------------------------------
// search_custom_post_types
// ---------------------------------------------------------------------------

/// Search over any status of an allowed custom type, with meta equality
/// filters.
pub struct SearchCustomPostTypes {
    platform: Arc<Platform>,
    post_types: Arc<PostTypePolicy>,
}

impl SearchCustomPostTypes {
    pub fn new(platform: Arc<Platform>, post_types: Arc<PostTypePolicy>) -> Self {
        Self {
            platform,
            post_types,
        }
    }
}

fn meta_filters(args: &Args<'_>) -> Vec<MetaFilter> {
    args.array("meta_filters")
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|entry| {
                    let entry = Args::new(entry);
                    Some(MetaFilter {
                        key: entry.text("key")?,
                        value: entry.text("value").unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ToolHandler for SearchCustomPostTypes {
    async fn call(&self, args: &Map<String, Value>, _principal: &Principal) -> DomainResult {
        let args = Args::new(args);
        let post_type = args.required_text("post_type")?;
        if !self.post_types.allows(&post_type) {
            return Err(DomainError::new("post_type not allowed"));
        }
        public_type(&self.platform, &post_type).await?;

        let query = ContentQuery {
            post_type,
            keyword: args.text("query").unwrap_or_default(),
            status: StatusFilter::Any,
            meta: meta_filters(&args),
            per_page: args.per_page(10),
            page: args.page(),
        };
        let page = self.platform.content.search(&query).await?;

        let results: Vec<Value> = page
            .items
            .iter()
            .map(|item| {
                json!({
                    "id": item.id,
                    "title": item.title,
                    "excerpt": excerpt_of(item),
                    "url": item.url,
                    "meta": item.meta,
                    "status": item.status.as_str(),
                })
            })
            .collect();
        Ok(json!({ "results": results, "total": page.total }))
    }
}

// ---------------------------------------------------------------------------
// create_post / create_page / create_custom_post_type
// ---------------------------------------------------------------------------

/// Creates one item of any registered type. The aliases differ only in
/// the fixed `post_type` they inject.
pub struct CreateContent {
    platform: Arc<Platform>,
    post_types: Arc<PostTypePolicy>,
}

impl CreateContent {
    pub fn new(platform: Arc<Platform>, post_types: Arc<PostTypePolicy>) -> Self {
        Self {
            platform,
            post_types,
        }
    }
}

#[async_trait]
impl ToolHandler for CreateContent {
    async fn call(&self, args: &Map<String, Value>, principal: &Principal) -> DomainResult {
        let args = Args::new(args);
        let post_type = args.text("post_type").unwrap_or_else(|| "post".into());
        let Some(type_info) = self.platform.content.post_type(&post_type).await? else {
            return Err(DomainError::new("invalid_post_type"));
        };
        if !CORE_TYPES.contains(&post_type.as_str()) && !self.post_types.allows(&post_type) {
            return Err(DomainError::new("post_type not allowed"));
        }
        require_permission(principal, &type_info.create_permission)?;

        let title = args.required_text("title")?;
        let status = args
            .text("status")
            .and_then(|s| PostStatus::parse(&s))
            .unwrap_or(PostStatus::Draft);
        let item = NewContent {
            post_type,
            title,
            content: args.verbatim("content").map(|c| sanitize_html(&c)).unwrap_or_default(),
            excerpt: args.textarea("excerpt").unwrap_or_default(),
            status,
            slug: args
                .verbatim("slug")
                .map(|s| sanitize_title(&sanitize_text(&s)))
                .filter(|s| !s.is_empty()),
            author_id: args.id("author_id").unwrap_or(principal.user_id),
        };
        let created = self.platform.content.create(item).await?;
        debug!(id = created.id, post_type = %created.post_type, "Content created");

        Ok(json!({
            "id": created.id,
            "post_type": created.post_type,
            "status": created.status.as_str(),
            "url": created.url,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::*;

    fn new_post(post_type: &str, title: &str, status: PostStatus) -> NewContent {
        NewContent {
            post_type: post_type.into(),
            title: title.into(),
            content: format!("<p>{title} body text</p>"),
            excerpt: String::new(),
            status,
            slug: None,
            author_id: 1,
        }
    }

    #[tokio::test]
    async fn test_search_posts_published_only() {
        let site = site();
        site.insert_content(new_post("post", "Hello world", PostStatus::Publish)).unwrap();
        site.insert_content(new_post("post", "Hello draft", PostStatus::Draft)).unwrap();
        let handler = SearchContent::new(Arc::new(site.platform()));

        let out = handler
            .call(&args(json!({"query": "hello"})), &principal(&["subscriber"]))
            .await
            .unwrap();
        assert_eq!(out["total"], 1);
        let hit = &out["results"][0];
        assert_eq!(hit["title"], "Hello world");
        assert_eq!(hit["excerpt"], "Hello world body text");
        assert_eq!(hit["url"], "https://site.test/hello-world/");
        assert_eq!(hit["status"], "publish");
    }

    #[tokio::test]
    async fn test_search_pages_and_invalid_type() {
        let site = site();
        site.insert_content(new_post("page", "About", PostStatus::Publish)).unwrap();
        site.add_post_type(PostType::new("secret", "Secret", "edit_posts").private());
        let handler = SearchContent::new(Arc::new(site.platform()));
        let reader = principal(&["subscriber"]);

        let out = handler
            .call(&args(json!({"post_type": "page"})), &reader)
            .await
            .unwrap();
        assert_eq!(out["total"], 1);

        for post_type in ["secret", "nonexistent"] {
            let err = handler
                .call(&args(json!({"post_type": post_type})), &reader)
                .await
                .unwrap_err();
            assert_eq!(err.code(), "invalid_post_type");
        }
    }

    #[tokio::test]
    async fn test_excerpt_is_trimmed() {
        let site = site();
        let long = vec!["word"; 80].join(" ");
        site.insert_content(NewContent {
            content: long,
            ..new_post("post", "Long", PostStatus::Publish)
        })
        .unwrap();
        let handler = SearchContent::new(Arc::new(site.platform()));
        let out = handler
            .call(&args(json!({})), &principal(&["subscriber"]))
            .await
            .unwrap();
        let excerpt = out["results"][0]["excerpt"].as_str().unwrap();
        assert!(excerpt.ends_with('\u{2026}'));
        assert_eq!(excerpt.split_whitespace().count(), EXCERPT_WORDS);
    }

    #[tokio::test]
    async fn test_custom_search_meta_and_any_status() {
        let site = site();
        site.add_post_type(PostType::new("book", "Books", "edit_posts"));
        let a = site.insert_content(new_post("book", "Dune", PostStatus::Draft)).unwrap();
        let b = site.insert_content(new_post("book", "Emma", PostStatus::Publish)).unwrap();
        site.set_meta(a.id, "genre", "scifi").unwrap();
        site.set_meta(b.id, "genre", "classic").unwrap();
        let handler = SearchCustomPostTypes::new(
            Arc::new(site.platform()),
            Arc::new(PostTypePolicy::default()),
        );

        let out = handler
            .call(
                &args(json!({
                    "post_type": "book",
                    "meta_filters": [{"key": "genre", "value": "scifi"}, {"value": "ignored"}]
                })),
                &principal(&["subscriber"]),
            )
            .await
            .unwrap();
        assert_eq!(out["total"], 1);
        assert_eq!(out["results"][0]["title"], "Dune");
        assert_eq!(out["results"][0]["status"], "draft");
        assert_eq!(out["results"][0]["meta"]["genre"], "scifi");
    }

    #[tokio::test]
    async fn test_custom_search_checks() {
        let site = site();
        site.add_post_type(PostType::new("book", "Books", "edit_posts"));
        let handler = SearchCustomPostTypes::new(
            Arc::new(site.platform()),
            Arc::new(PostTypePolicy::new(vec!["movie".into()])),
        );
        let reader = principal(&["subscriber"]);

        let err = handler.call(&args(json!({})), &reader).await.unwrap_err();
        assert_eq!(err.code(), "post_type required");
        let err = handler
            .call(&args(json!({"post_type": "book"})), &reader)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "post_type not allowed");
        let err = handler
            .call(&args(json!({"post_type": "movie"})), &reader)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_post_type");
    }

    #[tokio::test]
    async fn test_create_post() {
        let site = site();
        let handler = CreateContent::new(Arc::new(site.platform()), Arc::new(PostTypePolicy::default()));
        let out = handler
            .call(
                &args(json!({
                    "post_type": "post",
                    "title": "  Launch <b>day</b> ",
                    "content": "<p>Hi</p><script>alert(1)</script>",
                    "status": "publish",
                    "slug": "Launch Day!"
                })),
                &principal(&["author"]),
            )
            .await
            .unwrap();
        assert_eq!(out["post_type"], "post");
        assert_eq!(out["status"], "publish");
        assert_eq!(out["url"], "https://site.test/launch-day/");
        assert_eq!(site.content_count(), 1);
    }

    #[tokio::test]
    async fn test_create_status_clamps_to_draft() {
        let site = site();
        let handler = CreateContent::new(Arc::new(site.platform()), Arc::new(PostTypePolicy::default()));
        let out = handler
            .call(
                &args(json!({"post_type": "post", "title": "T", "status": "trash"})),
                &principal(&["author"]),
            )
            .await
            .unwrap();
        assert_eq!(out["status"], "draft");
    }

    #[tokio::test]
    async fn test_create_permission_and_validation_order() {
        let site = site();
        site.add_post_type(PostType::new("book", "Books", "edit_books"));
        let handler = CreateContent::new(
            Arc::new(site.platform()),
            Arc::new(PostTypePolicy::new(vec!["book".into()])),
        );

        let cases = [
            (json!({"post_type": "nope", "title": "x"}), &["administrator"][..], "invalid_post_type"),
            (json!({"post_type": "page", "title": "x"}), &["author"][..], "insufficient_capability"),
            (json!({"post_type": "book", "title": "x"}), &["editor"][..], "insufficient_capability"),
            (json!({"post_type": "post"}), &["author"][..], "title required"),
            (json!({"post_type": "post", "title": "<i></i>"}), &["author"][..], "title required"),
        ];
        for (input, roles, code) in cases {
            let err = handler.call(&args(input), &principal(roles)).await.unwrap_err();
            assert_eq!(err.code(), code);
        }
        assert_eq!(site.content_count(), 0);
    }

    #[tokio::test]
    async fn test_create_custom_type_allow_list() {
        let site = site();
        site.add_post_type(PostType::new("book", "Books", "edit_posts"));
        site.add_post_type(PostType::new("movie", "Movies", "edit_posts"));
        let handler = CreateContent::new(
            Arc::new(site.platform()),
            Arc::new(PostTypePolicy::new(vec!["book".into()])),
        );
        let author = principal(&["author"]);

        let err = handler
            .call(&args(json!({"post_type": "movie", "title": "Heat"})), &author)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "post_type not allowed");

        let out = handler
            .call(&args(json!({"post_type": "book", "title": "Dune"})), &author)
            .await
            .unwrap();
        assert_eq!(out["url"], "https://site.test/book/dune/");
    }
}
