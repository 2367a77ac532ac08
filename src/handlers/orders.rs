//! Order creation, listing and detail.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::args::{day_end, day_start, Args};
use super::{commerce, require_permission, DomainError, DomainResult, ToolHandler};
use crate::auth::Principal;
use crate::platform::{NewOrder, NewOrderLine, Order, OrderQuery, Platform};

/// Order amounts render with two decimals, as the store reports them.
fn money(amount: f64) -> String {
    format!("{amount:.2}")
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn customer_name(order: &Order) -> String {
    ["first_name", "last_name"]
        .iter()
        .filter_map(|k| order.billing.get(*k))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// create_order
// ---------------------------------------------------------------------------

pub struct CreateOrder {
    platform: Arc<Platform>,
}

impl CreateOrder {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for CreateOrder {
    async fn call(&self, args: &Map<String, Value>, principal: &Principal) -> DomainResult {
        let store = commerce(&self.platform)?;
        require_permission(principal, "manage_woocommerce")?;
        let args = Args::new(args);
        let items = args
            .array("line_items")
            .filter(|items| !items.is_empty())
            .ok_or_else(|| DomainError::required("line_items"))?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items.iter().filter_map(Value::as_object) {
            let item = Args::new(item);
            let Some(product_id) = item.id("product_id") else {
                continue;
            };
            if store.product(product_id).await?.is_none() {
                debug!(product_id, "Skipping unknown product in order");
                continue;
            }
            let quantity = item.integer_or("quantity", 1, 1).min(i64::from(u32::MAX)) as u32;
            lines.push(NewOrderLine {
                product_id,
                quantity,
            });
        }
        if lines.is_empty() {
            return Err(DomainError::required("line_items"));
        }

        let order = NewOrder {
            customer_id: args.id("customer_id").unwrap_or(0),
            lines,
            billing: args.text_map("billing").filter(|a| !a.is_empty()),
            shipping: args.text_map("shipping").filter(|a| !a.is_empty()),
            status: args.text("status"),
        };
        let created = store.create_order(order).await?;
        debug!(id = created.id, total = created.total, "Order created");

        Ok(json!({
            "id": created.id,
            "status": created.status,
            "total": money(created.total),
            "currency": created.currency,
        }))
    }
}

// ---------------------------------------------------------------------------
// get_orders
// ---------------------------------------------------------------------------

pub struct GetOrders {
    platform: Arc<Platform>,
}

impl GetOrders {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for GetOrders {
    async fn call(&self, args: &Map<String, Value>, _principal: &Principal) -> DomainResult {
        let store = commerce(&self.platform)?;
        let args = Args::new(args);
        let query = OrderQuery {
            status: args.text("status"),
            customer_id: args.id("customer_id"),
            created_after: args.date("date_from").map(day_start),
            created_before: args.date("date_to").map(day_end),
            per_page: args.per_page(10),
            page: args.page(),
        };
        let results: Vec<Value> = store
            .orders(&query)
            .await?
            .iter()
            .map(|o| {
                json!({
                    "id": o.id,
                    "status": o.status,
                    "total": money(o.total),
                    "currency": o.currency,
                    "customer_name": customer_name(o),
                    "customer_email": o.billing.get("email").cloned().unwrap_or_default(),
                    "items_count": o.line_items.len(),
                    "date_created": timestamp(&o.date_created),
                    "date_modified": o.date_modified.as_ref().map(timestamp),
                })
            })
            .collect();
        Ok(json!({ "results": results }))
    }
}

// ---------------------------------------------------------------------------
// get_order_details
// ---------------------------------------------------------------------------

pub struct GetOrderDetails {
    platform: Arc<Platform>,
}

impl GetOrderDetails {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for GetOrderDetails {
    async fn call(&self, args: &Map<String, Value>, _principal: &Principal) -> DomainResult {
        let store = commerce(&self.platform)?;
        let order_id = Args::new(args).required_id("order_id")?;
        let order = store
            .order(order_id)
            .await?
            .ok_or_else(DomainError::not_found)?;
        let notes = store.order_notes(order_id).await?;

        let line_items: Vec<Value> = order
            .line_items
            .iter()
            .map(|l| {
                json!({
                    "product_id": l.product_id,
                    "name": l.name,
                    "quantity": l.quantity,
                    "total": money(l.total),
                })
            })
            .collect();
        let notes: Vec<Value> = notes
            .iter()
            .map(|n| json!({ "date": timestamp(&n.date), "note": n.note }))
            .collect();

        Ok(json!({
            "id": order.id,
            "status": order.status,
            "billing": order.billing,
            "shipping": order.shipping,
            "line_items": line_items,
            "total": money(order.total),
            "subtotal": money(order.subtotal),
            "tax": money(order.total_tax),
            "shipping_total": money(order.shipping_total),
            "payment_method": order.payment_method,
            "transaction_id": order.transaction_id,
            "notes": notes,
            "date_created": timestamp(&order.date_created),
        }))
    }
}
