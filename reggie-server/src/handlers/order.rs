//! Checkout, order history and the back-office order list.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post, put},
    Extension, Router,
};
use chrono::NaiveDateTime;
use reggie_core::audit::now;
use reggie_core::response::PageRequest;
use reggie_core::serde_ext::datetime;
use reggie_core::status::OrderStatus;
use reggie_core::{IdForm, Order, OrderDto, OrderStatusForm, OrderSubmitForm, Page};
use serde::Deserialize;
use tracing::info;

use super::PageQuery;
use crate::auth::{CurrentUser, Staff};
use crate::db::OrderSearch;
use crate::error::{ok, ApiError, ApiResult, JsonBody};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/order", put(set_status))
        .route("/order/submit", post(submit))
        .route("/order/again", post(again))
        .route("/order/userPage", get(user_page))
        .route("/order/page", get(page))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    page: Option<u64>,
    page_size: Option<u64>,
    number: Option<String>,
    begin_time: Option<String>,
    end_time: Option<String>,
}

fn parse_bound(raw: Option<String>) -> Result<Option<NaiveDateTime>, ApiError> {
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => datetime::parse(raw)
            .map(Some)
            .map_err(|e| ApiError::BadRequest(format!("invalid time '{}': {}", raw, e))),
        None => Ok(None),
    }
}

/// Handler: POST /order/submit
///
/// Turns the caller's cart into an order and empties the cart.
async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(form): JsonBody<OrderSubmitForm>,
) -> ApiResult<Order> {
    let order = state.db.submit_order(current.id(), form, now()).await?;
    info!(
        "Order {} placed by user {} for {}",
        order.number, order.user_id, order.amount
    );
    ok(order)
}

/// Handler: GET /order/userPage
async fn user_page(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<OrderDto>> {
    ok(state.db.user_orders(current.id(), query.request()).await?)
}

/// Handler: POST /order/again
///
/// Puts the items of a past order back into the cart.
async fn again(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(form): JsonBody<IdForm>,
) -> ApiResult<&'static str> {
    state.db.reorder(current.id(), form.id, now()).await?;
    ok("Items added to cart")
}

/// Handler: GET /order/page?number=&beginTime=&endTime=
async fn page(
    State(state): State<Arc<AppState>>,
    _staff: Staff,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Page<OrderDto>> {
    let search = OrderSearch {
        number: query.number,
        begin_time: parse_bound(query.begin_time)?,
        end_time: parse_bound(query.end_time)?,
    };
    let request = PageRequest::new(query.page, query.page_size);
    ok(state.db.order_page(search, request).await?)
}

/// Handler: PUT /order
async fn set_status(
    State(state): State<Arc<AppState>>,
    _staff: Staff,
    JsonBody(form): JsonBody<OrderStatusForm>,
) -> ApiResult<&'static str> {
    let status =
        OrderStatus::try_from(form.status).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if !state.db.set_order_status(form.id, status.into()).await? {
        return Err(ApiError::business("Order not found"));
    }
    ok("Order status updated")
}
