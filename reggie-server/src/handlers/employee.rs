//! Back-office staff accounts and console login.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Router,
};
use reggie_core::password::{hash_password, verify_password, DEFAULT_PASSWORD};
use reggie_core::status::{DISABLED, ENABLED};
use reggie_core::{Employee, EmployeeForm, EmployeeUpdate, LoginForm, Page};
use tracing::info;

use super::{audit, PageQuery};
use crate::auth::Staff;
use crate::error::{ok, ApiError, ApiResult, JsonBody};
use crate::session::Session;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/employee/login", post(login))
        .route("/employee/logout", post(logout))
        .route("/employee", post(create).put(update))
        .route("/employee/page", get(page))
        .route("/employee/:id", get(get_by_id))
}

/// Handler: POST /employee/login
async fn login(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    JsonBody(form): JsonBody<LoginForm>,
) -> ApiResult<Employee> {
    let Some(employee) = state.db.employee_by_username(form.username.clone()).await? else {
        info!("Employee login failed for {}: unknown username", form.username);
        return Err(ApiError::business("Login failed"));
    };
    if !verify_password(&form.password, &employee.password) {
        info!("Employee login failed for {}: wrong password", form.username);
        return Err(ApiError::business("Incorrect password"));
    }
    if employee.status == DISABLED {
        return Err(ApiError::business("Account disabled"));
    }

    session.set_employee(Some(employee.id));
    info!("Employee {} logged in", employee.username);
    ok(employee)
}

/// Handler: POST /employee/logout
async fn logout(Extension(session): Extension<Session>) -> ApiResult<&'static str> {
    session.set_employee(None);
    ok("Logged out")
}

/// Handler: POST /employee
///
/// New accounts start enabled with the default password.
async fn create(
    State(state): State<Arc<AppState>>,
    Staff(current): Staff,
    JsonBody(form): JsonBody<EmployeeForm>,
) -> ApiResult<&'static str> {
    let audit = audit(&current);
    let username = form.username.clone();
    let employee = Employee {
        id: state.db.next_id(),
        username: form.username,
        name: form.name,
        password: hash_password(DEFAULT_PASSWORD),
        phone: form.phone,
        sex: form.sex,
        id_number: form.id_number,
        status: ENABLED,
        create_time: audit.at,
        update_time: audit.at,
        create_user: audit.by,
        update_user: audit.by,
    };

    state
        .db
        .insert_employee(employee)
        .await
        .map_err(|e| {
            ApiError::duplicate_as(e, || format!("Username {} already exists", username))
        })?;
    ok("Employee added")
}

/// Handler: GET /employee/page
async fn page(
    State(state): State<Arc<AppState>>,
    _staff: Staff,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Employee>> {
    let request = query.request();
    ok(state.db.employee_page(query.name, request).await?)
}

/// Handler: PUT /employee
///
/// Partial update; also used by the console to enable or disable accounts.
async fn update(
    State(state): State<Arc<AppState>>,
    Staff(current): Staff,
    JsonBody(form): JsonBody<EmployeeUpdate>,
) -> ApiResult<&'static str> {
    let username = form.username.clone().unwrap_or_default();
    let updated = state
        .db
        .update_employee(form, audit(&current))
        .await
        .map_err(|e| {
            ApiError::duplicate_as(e, || format!("Username {} already exists", username))
        })?;
    if !updated {
        return Err(ApiError::business("Employee not found"));
    }
    ok("Employee updated")
}

/// Handler: GET /employee/:id
async fn get_by_id(
    State(state): State<Arc<AppState>>,
    _staff: Staff,
    Path(id): Path<i64>,
) -> ApiResult<Employee> {
    match state.db.employee_by_id(id).await? {
        Some(employee) => ok(employee),
        None => Err(ApiError::business("Employee not found")),
    }
}
