//! Delivery addresses. Every read and write is scoped to the caller.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Router,
};
use reggie_core::{AddressBook, AddressForm, AddressUpdate, IdForm};

use super::{audit, IdsQuery};
use crate::auth::CurrentUser;
use crate::error::{ok, ApiError, ApiResult, JsonBody};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/addressBook", post(create).put(update).delete(delete))
        .route("/addressBook/list", get(list))
        .route("/addressBook/default", get(get_default).put(set_default))
        .route("/addressBook/:id", get(get_by_id))
}

/// Handler: GET /addressBook/list
async fn list(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Vec<AddressBook>> {
    ok(state.db.addresses(current.id()).await?)
}

/// Handler: POST /addressBook
async fn create(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(form): JsonBody<AddressForm>,
) -> ApiResult<AddressBook> {
    let audit = audit(&current);
    let address = AddressBook {
        id: state.db.next_id(),
        user_id: current.id(),
        consignee: form.consignee,
        sex: form.sex,
        phone: form.phone,
        province_code: form.province_code,
        province_name: form.province_name,
        city_code: form.city_code,
        city_name: form.city_name,
        district_code: form.district_code,
        district_name: form.district_name,
        detail: form.detail,
        label: form.label,
        is_default: 0,
        create_time: audit.at,
        update_time: audit.at,
        create_user: audit.by,
        update_user: audit.by,
    };
    state.db.insert_address(address.clone()).await?;
    ok(address)
}

/// Handler: PUT /addressBook/default
async fn set_default(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(form): JsonBody<IdForm>,
) -> ApiResult<AddressBook> {
    let address = state
        .db
        .set_default_address(current.id(), form.id, audit(&current))
        .await?;
    match address {
        Some(address) => ok(address),
        None => Err(ApiError::business("Address not found")),
    }
}

/// Handler: GET /addressBook/default
async fn get_default(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<AddressBook> {
    match state.db.default_address(current.id()).await? {
        Some(address) => ok(address),
        None => Err(ApiError::business("No default address")),
    }
}

/// Handler: GET /addressBook/:id
async fn get_by_id(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<AddressBook> {
    match state.db.address_by_id(current.id(), id).await? {
        Some(address) => ok(address),
        None => Err(ApiError::business("Address not found")),
    }
}

/// Handler: PUT /addressBook
async fn update(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(form): JsonBody<AddressUpdate>,
) -> ApiResult<&'static str> {
    let updated = state
        .db
        .update_address(current.id(), form, audit(&current))
        .await?;
    if !updated {
        return Err(ApiError::business("Address not found"));
    }
    ok("Address updated")
}

/// Handler: DELETE /addressBook?ids=
async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<IdsQuery>,
) -> ApiResult<&'static str> {
    state
        .db
        .delete_addresses(current.id(), query.parse()?)
        .await?;
    ok("Address deleted")
}
