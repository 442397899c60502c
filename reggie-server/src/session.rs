//! Cookie sessions stored in the cache.
//!
//! The cookie carries only a random id; the data lives under
//! `session:{id}`. Every request against a live session slides its TTL. A
//! new session is stored, and its cookie issued, only once something is
//! written to it.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use reggie_core::cache_keys;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{self, Cache};
use crate::AppState;

pub const SESSION_COOKIE: &str = "REGGIE_SESSION";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub employee: Option<i64>,
    #[serde(default)]
    pub user: Option<i64>,
}

#[derive(Debug)]
struct SessionInner {
    id: String,
    data: SessionData,
    dirty: bool,
    is_new: bool,
}

/// Per-request handle to the caller's session, found in request extensions.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    fn new(id: String, data: SessionData, is_new: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                id,
                data,
                dirty: false,
                is_new,
            })),
        }
    }

    pub fn employee(&self) -> Option<i64> {
        self.inner.lock().expect("mutex poisoned").data.employee
    }

    pub fn user(&self) -> Option<i64> {
        self.inner.lock().expect("mutex poisoned").data.user
    }

    pub fn set_employee(&self, id: Option<i64>) {
        let mut inner = self.inner.lock().expect("mutex poisoned");
        inner.data.employee = id;
        inner.dirty = true;
    }

    pub fn set_user(&self, id: Option<i64>) {
        let mut inner = self.inner.lock().expect("mutex poisoned");
        inner.data.user = id;
        inner.dirty = true;
    }

    /// Write the session back if this request changed it, otherwise only
    /// slide its expiry. Returns the cookie to set for sessions that did not
    /// exist before this request.
    async fn persist(
        &self,
        store: &dyn Cache,
        ttl: std::time::Duration,
    ) -> Option<HeaderValue> {
        let (id, data, dirty, is_new) = {
            let inner = self.inner.lock().expect("mutex poisoned");
            (inner.id.clone(), inner.data.clone(), inner.dirty, inner.is_new)
        };
        let key = cache_keys::session(&id);

        if !dirty {
            // A stale copy must never overwrite a concurrent logout.
            if !is_new {
                if let Err(e) = store.touch(&key, ttl).await {
                    warn!("Failed to refresh session {}: {}", id, e);
                }
            }
            return None;
        }

        cache::put_json(store, &key, &data, ttl).await;

        if is_new {
            debug!("Issuing new session {}", id);
            HeaderValue::from_str(&session_cookie(&id)).ok()
        } else {
            None
        }
    }
}

fn session_cookie(id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

/// Find the session id in the `Cookie` headers. Values that are not UUIDs
/// are ignored.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
        .map(|id| id.to_string())
}

async fn load(store: &dyn Cache, id: &str) -> Option<SessionData> {
    match store.get(&cache_keys::session(id)).await {
        Ok(Some(raw)) => serde_json::from_str(&raw)
            .map_err(|e| warn!("Discarding corrupt session {}: {}", id, e))
            .ok(),
        Ok(None) => None,
        Err(e) => {
            warn!("Failed to load session {}: {}", id, e);
            None
        }
    }
}

/// Attach a [`Session`] to the request and persist it afterwards.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = match session_id_from_headers(request.headers()) {
        Some(id) => load(state.cache.as_ref(), &id)
            .await
            .map(|data| (id, data)),
        None => None,
    };

    let session = match existing {
        Some((id, data)) => Session::new(id, data, false),
        None => Session::new(Uuid::new_v4().to_string(), SessionData::default(), true),
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    if let Some(cookie) = session
        .persist(state.cache.as_ref(), state.config.session_ttl)
        .await
    {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{put_json, InMemoryCache};
    use std::time::Duration;

    const ID: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_session_id_from_headers() {
        let found = session_id_from_headers(&headers(&format!(
            "theme=dark; {}={}; lang=en",
            SESSION_COOKIE, ID
        )));
        assert_eq!(found.as_deref(), Some(ID));
    }

    #[test]
    fn test_session_id_rejects_garbage() {
        assert_eq!(
            session_id_from_headers(&headers("REGGIE_SESSION=../../etc/passwd")),
            None
        );
        assert_eq!(session_id_from_headers(&headers("other=1")), None);
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_untouched_new_session_is_not_stored() {
        let cache = InMemoryCache::new();
        let session = Session::new(ID.to_string(), SessionData::default(), true);

        assert!(session.persist(&cache, Duration::from_secs(60)).await.is_none());
        assert_eq!(cache.get(&cache_keys::session(ID)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_written_new_session_sets_cookie() {
        let cache = InMemoryCache::new();
        let session = Session::new(ID.to_string(), SessionData::default(), true);
        session.set_employee(Some(1));

        let cookie = session.persist(&cache, Duration::from_secs(60)).await.unwrap();
        assert!(cookie.to_str().unwrap().starts_with("REGGIE_SESSION="));
        assert!(cookie.to_str().unwrap().contains("HttpOnly"));

        let stored = load(&cache, ID).await.unwrap();
        assert_eq!(stored.employee, Some(1));
        assert_eq!(stored.user, None);
    }

    #[tokio::test]
    async fn test_existing_session_is_refreshed_without_cookie() {
        let cache = InMemoryCache::new();
        let data = SessionData {
            employee: None,
            user: Some(9),
        };
        put_json(&cache, &cache_keys::session(ID), &data, Duration::from_secs(60)).await;
        let session = Session::new(ID.to_string(), data.clone(), false);

        assert!(session.persist(&cache, Duration::from_secs(60)).await.is_none());
        assert_eq!(load(&cache, ID).await, Some(data));
    }

    #[tokio::test]
    async fn test_clean_request_does_not_undo_concurrent_logout() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);
        let logged_in = SessionData {
            employee: Some(1),
            user: None,
        };
        put_json(&cache, &cache_keys::session(ID), &logged_in, ttl).await;

        // Two requests on the same cookie load the session before either ends.
        let slow = Session::new(ID.to_string(), load(&cache, ID).await.unwrap(), false);
        let logout = Session::new(ID.to_string(), load(&cache, ID).await.unwrap(), false);

        logout.set_employee(None);
        assert!(logout.persist(&cache, ttl).await.is_none());
        assert_eq!(load(&cache, ID).await.unwrap().employee, None);

        assert!(slow.persist(&cache, ttl).await.is_none());
        assert_eq!(load(&cache, ID).await, Some(SessionData::default()));
    }

    #[tokio::test]
    async fn test_clean_request_does_not_revive_expired_session() {
        let cache = InMemoryCache::new();
        let session = Session::new(
            ID.to_string(),
            SessionData {
                employee: Some(1),
                user: None,
            },
            false,
        );

        session.persist(&cache, Duration::from_secs(60)).await;
        assert_eq!(load(&cache, ID).await, None);
    }
}
