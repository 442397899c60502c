//! Set meals: bundles of dishes sold at one price.
//!
//! Set meal lists are cached under `setmealCache::{categoryId}_{status}`;
//! every write drops the whole namespace.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use reggie_core::cache_keys::{self, MENU_TTL, SETMEAL_NAMESPACE};
use reggie_core::status::{parse_sale_status, ENABLED};
use reggie_core::{Audit, DishDto, Page, Setmeal, SetmealDish, SetmealDto, SetmealForm};
use serde::Deserialize;
use tracing::debug;

use super::{audit, IdsQuery, PageQuery};
use crate::auth::Staff;
use crate::cache;
use crate::error::{ok, ApiError, ApiResult, JsonBody};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/setmeal", post(create).put(update).delete(delete))
        .route("/setmeal/page", get(page))
        .route("/setmeal/list", get(list))
        .route("/setmeal/status/:status", post(set_status))
        .route("/setmeal/dish/:id", get(dishes))
        .route("/setmeal/:id", get(get_by_id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    category_id: Option<i64>,
    status: Option<i32>,
}

fn dishes_from(
    form: &SetmealForm,
    setmeal_id: i64,
    state: &AppState,
    audit: Audit,
) -> Vec<SetmealDish> {
    form.setmeal_dishes
        .iter()
        .map(|item| SetmealDish {
            id: state.db.next_id(),
            setmeal_id,
            dish_id: item.dish_id,
            name: item.name.clone(),
            price: item.price,
            copies: item.copies,
            sort: item.sort,
            create_time: audit.at,
            update_time: audit.at,
            create_user: audit.by,
            update_user: audit.by,
        })
        .collect()
}

async fn evict_lists(state: &AppState) {
    cache::evict_prefix(state.cache.as_ref(), SETMEAL_NAMESPACE).await;
}

/// Handler: POST /setmeal
async fn create(
    State(state): State<Arc<AppState>>,
    Staff(current): Staff,
    JsonBody(form): JsonBody<SetmealForm>,
) -> ApiResult<&'static str> {
    let audit = audit(&current);
    let id = state.db.next_id();
    let dishes = dishes_from(&form, id, &state, audit);
    let name = form.name.clone();
    let setmeal = Setmeal {
        id,
        category_id: form.category_id,
        name: form.name,
        price: form.price,
        status: form.status.unwrap_or(ENABLED),
        code: form.code,
        description: form.description,
        image: form.image,
        create_time: audit.at,
        update_time: audit.at,
        create_user: audit.by,
        update_user: audit.by,
    };

    state
        .db
        .insert_setmeal(setmeal, dishes)
        .await
        .map_err(|e| ApiError::duplicate_as(e, || format!("Set meal {} already exists", name)))?;
    evict_lists(&state).await;
    ok("Set meal added")
}

/// Handler: GET /setmeal/page
async fn page(
    State(state): State<Arc<AppState>>,
    _staff: Staff,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<SetmealDto>> {
    let request = query.request();
    ok(state.db.setmeal_page(query.name, request).await?)
}

/// Handler: GET /setmeal/:id
async fn get_by_id(
    State(state): State<Arc<AppState>>,
    _staff: Staff,
    Path(id): Path<i64>,
) -> ApiResult<SetmealDto> {
    match state.db.setmeal_with_dishes(id).await? {
        Some(setmeal) => ok(setmeal),
        None => Err(ApiError::business("Set meal not found")),
    }
}

/// Handler: PUT /setmeal
///
/// Replaces the set meal's dishes.
async fn update(
    State(state): State<Arc<AppState>>,
    Staff(current): Staff,
    JsonBody(form): JsonBody<SetmealForm>,
) -> ApiResult<&'static str> {
    let id = form
        .id
        .ok_or_else(|| ApiError::BadRequest("id is required".to_string()))?;
    let audit = audit(&current);
    let dishes = dishes_from(&form, id, &state, audit);
    let name = form.name.clone();

    let updated = state
        .db
        .update_setmeal(id, form, dishes, audit)
        .await
        .map_err(|e| ApiError::duplicate_as(e, || format!("Set meal {} already exists", name)))?;
    if !updated {
        return Err(ApiError::business("Set meal not found"));
    }
    evict_lists(&state).await;
    ok("Set meal updated")
}

/// Handler: POST /setmeal/status/:status?ids=
async fn set_status(
    State(state): State<Arc<AppState>>,
    Staff(current): Staff,
    Path(status): Path<String>,
    Query(query): Query<IdsQuery>,
) -> ApiResult<&'static str> {
    let status = parse_sale_status(&status)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid status '{}'", status)))?;
    state
        .db
        .set_setmeal_status(query.parse()?, status, audit(&current))
        .await?;
    evict_lists(&state).await;
    ok("Status updated")
}

/// Handler: DELETE /setmeal?ids=
async fn delete(
    State(state): State<Arc<AppState>>,
    _staff: Staff,
    Query(query): Query<IdsQuery>,
) -> ApiResult<&'static str> {
    state.db.delete_setmeals(query.parse()?).await?;
    evict_lists(&state).await;
    ok("Set meal deleted")
}

/// Handler: GET /setmeal/list?categoryId=&status=
async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Setmeal>> {
    let key = cache_keys::setmeal_list(query.category_id, query.status);
    if let Some(setmeals) = cache::get_json::<Vec<Setmeal>>(state.cache.as_ref(), &key).await {
        debug!("Serving {} from cache", key);
        return ok(setmeals);
    }

    let setmeals = state
        .db
        .list_setmeals(query.category_id, query.status)
        .await?;
    cache::put_json(state.cache.as_ref(), &key, &setmeals, MENU_TTL).await;
    ok(setmeals)
}

/// Handler: GET /setmeal/dish/:id
///
/// The dishes of a set meal, each with its portion count in `copies`.
async fn dishes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<DishDto>> {
    ok(state.db.setmeal_dish_details(id).await?)
}
