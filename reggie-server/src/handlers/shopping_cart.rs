//! The logged-in customer's shopping cart.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{delete, get, post},
    Extension, Router,
};
use reggie_core::audit::now;
use reggie_core::{CartItemForm, ShoppingCart};

use crate::auth::CurrentUser;
use crate::error::{ok, ApiError, ApiResult, JsonBody};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shoppingCart/add", post(add))
        .route("/shoppingCart/sub", post(sub))
        .route("/shoppingCart/list", get(list))
        .route("/shoppingCart/clean", delete(clean))
}

/// Handler: POST /shoppingCart/add
///
/// Adding something already in the cart bumps its count.
async fn add(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(form): JsonBody<CartItemForm>,
) -> ApiResult<ShoppingCart> {
    if form.dish_id.is_none() && form.setmeal_id.is_none() {
        return Err(ApiError::BadRequest(
            "dishId or setmealId is required".to_string(),
        ));
    }
    let amount = form
        .amount
        .ok_or_else(|| ApiError::BadRequest("amount is required".to_string()))?;

    let item = ShoppingCart {
        id: state.db.next_id(),
        name: form.name.unwrap_or_default(),
        image: form.image,
        user_id: current.id(),
        dish_id: form.dish_id,
        setmeal_id: form.setmeal_id,
        dish_flavor: form.dish_flavor,
        number: 1,
        amount,
        create_time: now(),
    };
    ok(state.db.add_to_cart(item).await?)
}

/// Handler: POST /shoppingCart/sub
///
/// Returns the row with its new count; a count of 0 means it was removed.
async fn sub(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(form): JsonBody<CartItemForm>,
) -> ApiResult<ShoppingCart> {
    let row = state
        .db
        .sub_from_cart(current.id(), form.dish_id, form.setmeal_id)
        .await?;
    match row {
        Some(row) => ok(row),
        None => Err(ApiError::business("Item not found in cart")),
    }
}

/// Handler: GET /shoppingCart/list
async fn list(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Vec<ShoppingCart>> {
    ok(state.db.cart_items(current.id()).await?)
}

/// Handler: DELETE /shoppingCart/clean
async fn clean(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<&'static str> {
    state.db.clean_cart(current.id()).await?;
    ok("Cart cleared")
}
