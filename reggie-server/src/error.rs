//! HTTP-facing errors.
//!
//! Business failures and missing logins are answered with HTTP 200 and an
//! error envelope so the web console can show `msg` to the operator.
//! Malformed input gets a 400; anything unexpected is logged and hidden
//! behind a generic 500.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reggie_core::R;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::error;

use crate::cache::CacheError;
use crate::db::RepositoryError;

pub const NOT_LOGGED_IN: &str = "NOTLOGIN";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", NOT_LOGGED_IN)]
    NotLoggedIn,

    #[error("{0}")]
    Business(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn business(msg: impl Into<String>) -> Self {
        ApiError::Business(msg.into())
    }

    /// Turn a unique-constraint violation into a readable business error.
    pub fn duplicate_as(err: RepositoryError, msg: impl FnOnce() -> String) -> Self {
        match err {
            RepositoryError::Duplicate(_) => ApiError::Business(msg()),
            other => ApiError::Repository(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::NotLoggedIn => (StatusCode::OK, NOT_LOGGED_IN.to_string()),
            ApiError::Business(msg) => (StatusCode::OK, msg),
            ApiError::Repository(RepositoryError::Rejected(msg)) => (StatusCode::OK, msg),
            ApiError::Repository(RepositoryError::Duplicate(_)) => {
                (StatusCode::OK, "Duplicate entry".to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Unknown error".to_string(),
                )
            }
        };

        (status, Json(R::<()>::error(msg))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<R<T>>, ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(R::success(data)))
}

/// JSON body extractor whose rejections use the error envelope and a 400.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(JsonBody(value))
    }
}
