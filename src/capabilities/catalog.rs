//! Built-in capability catalog.
//!
//! Seventeen tools covering content, taxonomy, commerce and accounts. The
//! commerce tools require the commerce subsystem; the rest are always
//! available. Declaration order is listing order.

use serde_json::json;

use super::capability::{Capability, FieldSpec, Subsystem};

/// Tools that only exist when the commerce subsystem is active.
pub const COMMERCE_TOOLS: &[&str] = &[
    "search_products",
    "create_product",
    "search_product_categories",
    "create_order",
    "get_orders",
    "get_order_details",
    "recommend_products",
];

fn per_page(default: u64) -> FieldSpec {
    FieldSpec::integer("per_page", &format!("Results per page (default: {default})"))
        .with_default(json!(default))
}

fn page() -> FieldSpec {
    FieldSpec::integer("page", "Page number (default: 1)").with_default(json!(1))
}

fn query() -> FieldSpec {
    FieldSpec::string("query", "Search keyword")
}

fn status() -> FieldSpec {
    FieldSpec::string("status", "draft/publish/pending/private (default: draft)")
        .with_default(json!("draft"))
}

/// Common fields of the three content-creation tools.
fn content_fields(capability: Capability, noun: &str) -> Capability {
    capability
        .with_field(FieldSpec::string("title", &format!("{noun} title (required)")).required())
        .with_field(FieldSpec::string("content", &format!("{noun} content")))
        .with_field(FieldSpec::string("excerpt", &format!("{noun} excerpt")))
        .with_field(status())
        .with_field(FieldSpec::string("slug", &format!("{noun} slug")))
        .with_field(FieldSpec::integer("author_id", "Author user ID"))
}

pub fn builtin_capabilities() -> Vec<Capability> {
    vec![
        Capability::new(
            "search_posts",
            "Search WordPress posts by keyword with optional pagination.",
        )
        .with_field(query())
        .with_field(FieldSpec::string("post_type", "Post type (default: post)"))
        .with_field(per_page(10))
        .with_field(page()),
        Capability::new("search_pages", "Search WordPress pages by keyword.")
            .with_field(query())
            .with_field(per_page(10))
            .with_field(page())
            .with_default_arg("post_type", json!("page")),
        Capability::new("search_post_categories", "Search WordPress post categories.")
            .with_field(query())
            .with_field(FieldSpec::integer("parent_id", "Filter by parent category ID"))
            .with_field(per_page(20))
            .with_fixed_arg("taxonomy", json!("category")),
        Capability::new("search_tags", "Search WordPress post tags.")
            .with_field(query())
            .with_field(per_page(20))
            .with_fixed_arg("taxonomy", json!("post_tag")),
        content_fields(Capability::new("create_post", "Create a WordPress post."), "Post")
            .with_fixed_arg("post_type", json!("post")),
        content_fields(Capability::new("create_page", "Create a WordPress page."), "Page")
            .with_fixed_arg("post_type", json!("page")),
        Capability::new("create_category", "Create a WordPress category.")
            .with_field(FieldSpec::string("name", "Category name (required)").required())
            .with_field(FieldSpec::string("slug", "Category slug"))
            .with_field(FieldSpec::integer("parent_id", "Parent category term ID"))
            .with_field(FieldSpec::string("description", "Category description")),
        Capability::new(
            "search_custom_post_types",
            "Search allowed custom post types with optional meta filters.",
        )
        .with_field(FieldSpec::string("post_type", "Custom post type slug (required)").required())
        .with_field(query())
        .with_field(FieldSpec::array(
            "meta_filters",
            "Array of {key, value} meta filter objects",
        ))
        .with_field(per_page(10))
        .with_field(page()),
        content_fields(
            Capability::new(
                "create_custom_post_type",
                "Create a custom post type entry (must be whitelisted in settings).",
            )
            .with_field(
                FieldSpec::string("post_type", "Custom post type slug (required)").required(),
            ),
            "Entry",
        ),
        Capability::new(
            "search_products",
            "Search WooCommerce products with optional price and stock filters.",
        )
        .with_field(query())
        .with_field(FieldSpec::integer("category_id", "Filter by product category ID"))
        .with_field(FieldSpec::number("min_price", "Minimum price filter"))
        .with_field(FieldSpec::number("max_price", "Maximum price filter"))
        .with_field(FieldSpec::boolean("in_stock", "Only return in-stock products"))
        .with_field(per_page(10))
        .with_field(page())
        .requires(Subsystem::Commerce),
        Capability::new("create_product", "Create a WooCommerce product.")
            .with_field(FieldSpec::string("name", "Product name (required)").required())
            .with_field(FieldSpec::string("description", "Product description"))
            .with_field(FieldSpec::string("short_description", "Short description"))
            .with_field(status())
            .with_field(FieldSpec::number("regular_price", "Regular price"))
            .with_field(FieldSpec::number("sale_price", "Sale price"))
            .with_field(FieldSpec::string("sku", "Product SKU"))
            .with_field(FieldSpec::boolean("manage_stock", "Enable stock management"))
            .with_field(FieldSpec::integer(
                "stock_quantity",
                "Stock quantity if manage_stock=true",
            ))
            .with_field(FieldSpec::array("category_ids", "Array of product_cat term IDs"))
            .requires(Subsystem::Commerce),
        Capability::new(
            "search_product_categories",
            "List or search WooCommerce product categories.",
        )
        .with_field(query())
        .with_field(FieldSpec::integer("parent_id", "Filter by parent category ID"))
        .with_field(per_page(20))
        .requires(Subsystem::Commerce),
        Capability::new("create_order", "Create a WooCommerce order with line items.")
            .with_field(FieldSpec::integer("customer_id", "Customer user ID"))
            .with_field(
                FieldSpec::array("line_items", "Array of {product_id, quantity} objects")
                    .required(),
            )
            .with_field(FieldSpec::object("billing", "Billing address fields"))
            .with_field(FieldSpec::object("shipping", "Shipping address fields"))
            .with_field(FieldSpec::string(
                "status",
                "Order status (e.g. pending, processing)",
            ))
            .requires(Subsystem::Commerce),
        Capability::new(
            "get_orders",
            "List WooCommerce orders with optional status, customer and date filters.",
        )
        .with_field(FieldSpec::string(
            "status",
            "Order status (e.g. processing, completed)",
        ))
        .with_field(FieldSpec::integer("customer_id", "Filter by customer user ID"))
        .with_field(FieldSpec::string("date_from", "Start date (YYYY-MM-DD)"))
        .with_field(FieldSpec::string("date_to", "End date (YYYY-MM-DD)"))
        .with_field(per_page(10))
        .with_field(page())
        .requires(Subsystem::Commerce),
        Capability::new(
            "get_order_details",
            "Get full details (line items, billing, shipping, notes) of a WooCommerce order.",
        )
        .with_field(FieldSpec::integer("order_id", "WooCommerce order ID (required)").required())
        .requires(Subsystem::Commerce),
        Capability::new("create_user", "Create a WordPress user account.")
            .with_field(FieldSpec::string("username", "Username (required)").required())
            .with_field(FieldSpec::string("email", "Email (required)").required())
            .with_field(FieldSpec::string(
                "password",
                "Password (optional; auto-generated if omitted)",
            ))
            .with_field(FieldSpec::string("display_name", "Display name"))
            .with_field(
                FieldSpec::string("role", "User role (default: subscriber)")
                    .with_default(json!("subscriber")),
            ),
        Capability::new(
            "recommend_products",
            "Recommend WooCommerce products using related, upsell, crosssell, bestseller, or new_arrivals strategies.",
        )
        .with_field(
            FieldSpec::string(
                "strategy",
                "Recommendation strategy: related, upsell, crosssell, bestseller, new_arrivals (default: related)",
            )
            .with_default(json!("related")),
        )
        .with_field(FieldSpec::integer(
            "product_id",
            "Source product ID (required for related, upsell, crosssell)",
        ))
        .with_field(FieldSpec::integer("category_id", "Filter by category ID"))
        .with_field(
            FieldSpec::integer("limit", "Maximum number of results (default: 5)")
                .with_default(json!(5)),
        )
        .requires(Subsystem::Commerce),
    ]
}
