//! Login check for every non-public route.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use reggie_core::path_match;
use tracing::debug;

use crate::error::ApiError;
use crate::session::Session;

/// Routes reachable without logging in.
pub const PUBLIC_PATHS: &[&str] = &[
    "/employee/login",
    "/employee/logout",
    "/backend/**",
    "/front/**",
    "/common/**",
    "/user/login",
    "/user/sendMsg",
    "/health",
];

/// Identity of the caller, inserted into request extensions once the login
/// check passes. Employees take precedence when both are logged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentUser {
    Employee(i64),
    Customer(i64),
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        match self {
            CurrentUser::Employee(id) | CurrentUser::Customer(id) => *id,
        }
    }
}

/// A logged-in employee. Back-office handlers take this instead of
/// [`CurrentUser`]; customers get NOTLOGIN, as if no one were logged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Staff(pub CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for Staff
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentUser>() {
            Some(current @ CurrentUser::Employee(_)) => Ok(Staff(*current)),
            Some(CurrentUser::Customer(id)) => {
                debug!("Customer {} refused on {}", id, parts.uri.path());
                Err(ApiError::NotLoggedIn)
            }
            None => Err(ApiError::NotLoggedIn),
        }
    }
}

pub fn is_public(path: &str) -> bool {
    path_match::matches_any(PUBLIC_PATHS.iter().copied(), path)
}

pub async fn login_check(mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if is_public(&path) {
        return next.run(request).await;
    }

    let session = request.extensions().get::<Session>().cloned();
    let current = session.and_then(|s| {
        s.employee()
            .map(CurrentUser::Employee)
            .or_else(|| s.user().map(CurrentUser::Customer))
    });

    match current {
        Some(current) => {
            request.extensions_mut().insert(current);
            next.run(request).await
        }
        None => {
            debug!("Rejecting unauthenticated request to {}", path);
            ApiError::NotLoggedIn.into_response()
        }
    }
}
