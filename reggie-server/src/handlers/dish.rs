//! Dishes, their flavors, and the cached customer menu.
//!
//! Menu lists are cached per category under `dish_{categoryId}_1`. Any write
//! that can change what a category shows evicts that category's key and the
//! all-categories key.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use reggie_core::cache_keys::{self, MENU_TTL};
use reggie_core::status::{parse_sale_status, ENABLED};
use reggie_core::{Audit, Dish, DishDto, DishFlavor, DishForm, Page};
use serde::Deserialize;
use tracing::debug;

use super::{audit, IdsQuery, PageQuery};
use crate::auth::Staff;
use crate::cache;
use crate::error::{ok, ApiError, ApiResult, JsonBody};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dish", post(create).put(update).delete(delete))
        .route("/dish/page", get(page))
        .route("/dish/list", get(list))
        .route("/dish/status/:status", post(set_status))
        .route("/dish/:id", get(get_by_id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    category_id: Option<i64>,
    name: Option<String>,
}

fn flavors_from(
    form: &DishForm,
    dish_id: i64,
    state: &AppState,
    audit: Audit,
) -> Vec<DishFlavor> {
    form.flavors
        .iter()
        .map(|flavor| DishFlavor {
            id: state.db.next_id(),
            dish_id,
            name: flavor.name.clone(),
            value: flavor.value.clone(),
            create_time: audit.at,
            update_time: audit.at,
            create_user: audit.by,
            update_user: audit.by,
        })
        .collect()
}

async fn evict_categories(state: &AppState, categories: impl IntoIterator<Item = i64>) {
    for category_id in categories {
        cache::evict(state.cache.as_ref(), cache_keys::dish_evictions(category_id)).await;
    }
}

/// Handler: POST /dish
async fn create(
    State(state): State<Arc<AppState>>,
    Staff(current): Staff,
    JsonBody(form): JsonBody<DishForm>,
) -> ApiResult<&'static str> {
    let audit = audit(&current);
    let id = state.db.next_id();
    let flavors = flavors_from(&form, id, &state, audit);
    let category_id = form.category_id;
    let name = form.name.clone();
    let dish = Dish {
        id,
        name: form.name,
        category_id,
        price: form.price,
        code: form.code,
        image: form.image,
        description: form.description,
        status: form.status.unwrap_or(ENABLED),
        sort: form.sort.unwrap_or(0),
        create_time: audit.at,
        update_time: audit.at,
        create_user: audit.by,
        update_user: audit.by,
    };

    state
        .db
        .insert_dish(dish, flavors)
        .await
        .map_err(|e| ApiError::duplicate_as(e, || format!("Dish {} already exists", name)))?;
    evict_categories(&state, [category_id]).await;
    ok("Dish added")
}

/// Handler: GET /dish/page
async fn page(
    State(state): State<Arc<AppState>>,
    _staff: Staff,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<DishDto>> {
    let request = query.request();
    ok(state.db.dish_page(query.name, request).await?)
}

/// Handler: GET /dish/:id
async fn get_by_id(
    State(state): State<Arc<AppState>>,
    _staff: Staff,
    Path(id): Path<i64>,
) -> ApiResult<DishDto> {
    match state.db.dish_with_flavors(id).await? {
        Some(dish) => ok(dish),
        None => Err(ApiError::business("Dish not found")),
    }
}

/// Handler: PUT /dish
///
/// Replaces the dish's flavors. Both the old and the new category lose their
/// cached menu.
async fn update(
    State(state): State<Arc<AppState>>,
    Staff(current): Staff,
    JsonBody(form): JsonBody<DishForm>,
) -> ApiResult<&'static str> {
    let id = form
        .id
        .ok_or_else(|| ApiError::BadRequest("id is required".to_string()))?;
    let audit = audit(&current);
    let flavors = flavors_from(&form, id, &state, audit);
    let category_id = form.category_id;
    let name = form.name.clone();

    let previous = state
        .db
        .update_dish(id, form, flavors, audit)
        .await
        .map_err(|e| ApiError::duplicate_as(e, || format!("Dish {} already exists", name)))?;
    let Some(previous) = previous else {
        return Err(ApiError::business("Dish not found"));
    };

    evict_categories(&state, [previous, category_id]).await;
    ok("Dish updated")
}

/// Handler: POST /dish/status/:status?ids=
async fn set_status(
    State(state): State<Arc<AppState>>,
    Staff(current): Staff,
    Path(status): Path<String>,
    Query(query): Query<IdsQuery>,
) -> ApiResult<&'static str> {
    let status = parse_sale_status(&status)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid status '{}'", status)))?;
    let ids = query.parse()?;
    let categories = state
        .db
        .set_dish_status(ids, status, audit(&current))
        .await?;
    evict_categories(&state, categories).await;
    ok("Status updated")
}

/// Handler: DELETE /dish?ids=
///
/// Refused while any of the dishes is on sale.
async fn delete(
    State(state): State<Arc<AppState>>,
    _staff: Staff,
    Query(query): Query<IdsQuery>,
) -> ApiResult<&'static str> {
    let categories = state.db.delete_dishes(query.parse()?).await?;
    evict_categories(&state, categories).await;
    ok("Dish deleted")
}

/// Handler: GET /dish/list?categoryId=
///
/// Only dishes on sale are listed; a `status` parameter is ignored. Name
/// searches bypass the cache.
async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<DishDto>> {
    let name = query.name.filter(|n| !n.trim().is_empty());
    if name.is_some() {
        return ok(state.db.list_dishes(query.category_id, name).await?);
    }

    let key = cache_keys::dish_list(query.category_id);
    if let Some(dishes) = cache::get_json::<Vec<DishDto>>(state.cache.as_ref(), &key).await {
        debug!("Serving {} from cache", key);
        return ok(dishes);
    }

    let dishes = state.db.list_dishes(query.category_id, None).await?;
    cache::put_json(state.cache.as_ref(), &key, &dishes, MENU_TTL).await;
    ok(dishes)
}
