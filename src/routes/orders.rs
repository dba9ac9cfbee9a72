// ABOUTME: Order route handlers for checkout, order history, cancellation and status changes
// ABOUTME: Checkout reserves stock transactionally; cancelling a pending order restores it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthResult;
use crate::cache::CacheNamespace;
use crate::constants::limits::{MAX_LINE_QUANTITY, MAX_NOTE_LEN, MAX_ORDER_ITEMS};
use crate::database::OrderLine;
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;
use crate::models::{Order, OrderStatus};
use crate::pagination::{Page, PageParams};
use crate::permissions::{ensure_admin, ensure_owner_or_admin};
use crate::resources::ServerResources;
use crate::utils::extract::{JsonBody, QueryParams};
use crate::utils::uuid::{parse_path_id, parse_uuid};
use crate::utils::validation::{optional_text, parse_choice};

use super::{invalidate, require_auth};

/// One requested line
#[derive(Debug, Deserialize)]
pub struct OrderItemBody {
    /// Product id
    pub product_id: String,
    /// Units, 1..=1000
    pub quantity: i64,
}

/// Request body for placing an order
#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    /// Requested lines
    #[serde(default)]
    pub items: Vec<OrderItemBody>,
    /// Optional customer note
    pub note: Option<String>,
}

/// Request body for an admin status change
#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusBody {
    /// Target status
    pub status: String,
}

/// Query parameters for listing orders
#[derive(Debug, Deserialize, Default)]
pub struct ListOrdersQuery {
    /// Page size
    pub limit: Option<u32>,
    /// Rows to skip
    pub offset: Option<u32>,
}

/// Order routes handler
pub struct OrderRoutes;

impl OrderRoutes {
    /// Create all order routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/orders", get(Self::handle_list).post(Self::handle_create))
            .route("/api/orders/:id", get(Self::handle_get))
            .route("/api/orders/:id/cancel", post(Self::handle_cancel))
            .route("/api/orders/:id/status", put(Self::handle_update_status))
            .with_state(resources)
    }

    /// Validate requested lines, merging repeated products
    fn validate_lines(items: &[OrderItemBody]) -> AppResult<Vec<OrderLine>> {
        if items.is_empty() {
            return Err(AppError::invalid_input("An order needs at least one item")
                .with_details(json!({ "field": "items" })));
        }
        if items.len() > MAX_ORDER_ITEMS {
            return Err(AppError::invalid_input(format!(
                "An order may contain at most {MAX_ORDER_ITEMS} items"
            ))
            .with_details(json!({ "field": "items", "max": MAX_ORDER_ITEMS })));
        }

        let mut lines: Vec<OrderLine> = Vec::with_capacity(items.len());
        for item in items {
            let product_id = parse_uuid(&item.product_id, "product_id")?;
            if !(1..=MAX_LINE_QUANTITY).contains(&item.quantity) {
                return Err(AppError::out_of_range(format!(
                    "Quantity must be between 1 and {MAX_LINE_QUANTITY}"
                ))
                .with_details(json!({ "field": "quantity", "product_id": product_id })));
            }
            match lines.iter_mut().find(|line| line.product_id == product_id) {
                Some(line) => line.quantity += item.quantity,
                None => lines.push(OrderLine {
                    product_id,
                    quantity: item.quantity,
                }),
            }
        }
        Ok(lines)
    }

    async fn load_owned(
        resources: &ServerResources,
        raw_id: &str,
        auth: &AuthResult,
    ) -> AppResult<Order> {
        let id = parse_path_id(raw_id, "Order")?;
        let order = resources
            .database
            .get_order(id)
            .await?
            .ok_or_else(|| AppError::not_found("Order").with_resource_id(id.to_string()))?;
        ensure_owner_or_admin(auth.user_id, auth.role, order.user_id, "order")?;
        Ok(order)
    }

    fn log(order: &Order) {
        AppLogger::log_order_event(
            &order.id.to_string(),
            &order.user_id.to_string(),
            order.status.as_str(),
            order.total_cents,
        );
    }

    /// Handle POST /api/orders
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(body): JsonBody<CreateOrderBody>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        let lines = Self::validate_lines(&body.items)?;
        let note = optional_text("note", body.note.as_deref(), MAX_NOTE_LEN)?;

        let order = resources
            .database
            .create_order(auth.user_id, &lines, note)
            .await?;
        Self::log(&order);

        // Stock levels changed
        invalidate(&resources, &[CacheNamespace::Products]).await;
        Ok((StatusCode::CREATED, Json(order)).into_response())
    }

    /// Handle GET /api/orders; admins see every order
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        QueryParams(query): QueryParams<ListOrdersQuery>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        let page = PageParams::new(query.limit, query.offset);
        let owner = (!auth.role.is_admin()).then_some(auth.user_id);

        let (orders, total) = resources.database.list_orders(owner, page).await?;
        Ok((StatusCode::OK, Json(Page::new(orders, total, page))).into_response())
    }

    /// Handle GET /api/orders/:id
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        let order = Self::load_owned(&resources, &id, &auth).await?;
        Ok((StatusCode::OK, Json(order)).into_response())
    }

    /// Handle POST /api/orders/:id/cancel
    async fn handle_cancel(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        let order = Self::load_owned(&resources, &id, &auth).await?;

        if order.status != OrderStatus::Pending {
            return Err(AppError::invalid_input(format!(
                "Only pending orders can be cancelled (order is {})",
                order.status
            ))
            .with_resource_id(order.id.to_string()));
        }

        let order = resources
            .database
            .update_order_status(order.id, OrderStatus::Cancelled)
            .await?;
        Self::log(&order);

        invalidate(&resources, &[CacheNamespace::Products]).await;
        Ok((StatusCode::OK, Json(order)).into_response())
    }

    /// Handle PUT /api/orders/:id/status (admin)
    async fn handle_update_status(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        JsonBody(body): JsonBody<UpdateOrderStatusBody>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        ensure_admin(auth.role, "change order status")?;
        let next: OrderStatus = parse_choice("status", &body.status)?;

        let id = parse_path_id(&id, "Order")?;
        let order = resources.database.update_order_status(id, next).await?;
        Self::log(&order);

        if next == OrderStatus::Cancelled {
            invalidate(&resources, &[CacheNamespace::Products]).await;
        }
        Ok((StatusCode::OK, Json(order)).into_response())
    }
}
