//! Dish and set meal categories.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Router,
};
use reggie_core::{Category, CategoryForm, CategoryUpdate, Page};
use serde::Deserialize;

use super::{audit, PageQuery};
use crate::auth::Staff;
use crate::error::{ok, ApiError, ApiResult, JsonBody};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/category", post(create).put(update).delete(delete))
        .route("/category/page", get(page))
        .route("/category/list", get(list))
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(rename = "type")]
    kind: Option<i32>,
}

/// Handler: POST /category
async fn create(
    State(state): State<Arc<AppState>>,
    Staff(current): Staff,
    JsonBody(form): JsonBody<CategoryForm>,
) -> ApiResult<&'static str> {
    let audit = audit(&current);
    let name = form.name.clone();
    let category = Category {
        id: state.db.next_id(),
        kind: form.kind,
        name: form.name,
        sort: form.sort,
        create_time: audit.at,
        update_time: audit.at,
        create_user: audit.by,
        update_user: audit.by,
    };
    state
        .db
        .insert_category(category)
        .await
        .map_err(|e| ApiError::duplicate_as(e, || format!("Category {} already exists", name)))?;
    ok("Category added")
}

/// Handler: GET /category/page
async fn page(
    State(state): State<Arc<AppState>>,
    _staff: Staff,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Category>> {
    ok(state.db.category_page(query.request()).await?)
}

/// Handler: DELETE /category?id=
///
/// Refused while dishes or set meals still reference the category.
async fn delete(
    State(state): State<Arc<AppState>>,
    _staff: Staff,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<&'static str> {
    state.db.delete_category(query.id).await?;
    ok("Category deleted")
}

/// Handler: PUT /category
async fn update(
    State(state): State<Arc<AppState>>,
    Staff(current): Staff,
    JsonBody(form): JsonBody<CategoryUpdate>,
) -> ApiResult<&'static str> {
    let name = form.name.clone().unwrap_or_default();
    let updated = state
        .db
        .update_category(form, audit(&current))
        .await
        .map_err(|e| ApiError::duplicate_as(e, || format!("Category {} already exists", name)))?;
    if !updated {
        return Err(ApiError::business("Category not found"));
    }
    ok("Category updated")
}

/// Handler: GET /category/list?type=
async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Category>> {
    ok(state.db.categories(query.kind).await?)
}
