//! Image upload and download.

use std::io::ErrorKind;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{ok, ApiError, ApiResult};
use crate::AppState;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/common/upload",
            post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/common/download", get(download))
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    name: String,
}

/// Extension of an uploaded file name including the dot, or empty when it
/// has none or it is not plain alphanumerics.
fn file_suffix(original: &str) -> &str {
    match original.rfind('.') {
        Some(dot)
            if original.len() - dot <= 10
                && original[dot + 1..]
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric())
                && dot + 1 < original.len() =>
        {
            &original[dot..]
        }
        _ => "",
    }
}

/// Names handed out by `upload` never contain separators or `..`.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains("..")
}

/// Handler: POST /common/upload
///
/// Stores the multipart field `file` under a fresh random name and returns
/// that name.
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let suffix = file_suffix(field.file_name().unwrap_or_default()).to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let name = format!("{}{}", Uuid::new_v4(), suffix);

        let dir = &state.config.upload_dir;
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            ApiError::Internal(format!("create {}: {}", dir.display(), e))
        })?;
        tokio::fs::write(dir.join(&name), &bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("write {}: {}", name, e)))?;

        debug!("Stored upload {} ({} bytes)", name, bytes.len());
        return ok(name);
    }

    Err(ApiError::BadRequest("file field is required".to_string()))
}

/// Handler: GET /common/download?name=
async fn download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    if !is_safe_name(&query.name) {
        return Err(ApiError::BadRequest(format!(
            "invalid file name '{}'",
            query.name
        )));
    }

    let path = state.config.upload_dir.join(&query.name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ApiError::NotFound),
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            Err(ApiError::Internal(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_suffix() {
        assert_eq!(file_suffix("dish.jpg"), ".jpg");
        assert_eq!(file_suffix("archive.tar.gz"), ".gz");
        assert_eq!(file_suffix("noext"), "");
        assert_eq!(file_suffix("trailing."), "");
        assert_eq!(file_suffix("evil.jpg/../x"), "");
        assert_eq!(file_suffix(""), "");
    }

    #[test]
    fn test_is_safe_name() {
        assert!(is_safe_name("0b5f3c1e-6a8e-4a43-a3f4-7d6f5f7c9a10.jpg"));
        assert!(!is_safe_name("../secret"));
        assert!(!is_safe_name("a/b.jpg"));
        assert!(!is_safe_name("a\\b.jpg"));
        assert!(!is_safe_name(""));
    }
}
