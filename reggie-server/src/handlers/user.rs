//! Customer login by emailed verification code.

use std::sync::Arc;

use axum::{extract::State, routing::post, Extension, Router};
use reggie_core::cache_keys::{self, CODE_TTL};
use reggie_core::status::{DISABLED, ENABLED};
use reggie_core::verification::{codes_match, generate_code};
use reggie_core::{SendCodeForm, User, UserLoginForm};
use tracing::{info, warn};

use crate::cache;
use crate::error::{ok, ApiError, ApiResult, JsonBody};
use crate::session::Session;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/sendMsg", post(send_code))
        .route("/user/login", post(login))
        .route("/user/loginout", post(logout))
}

/// Addresses are matched case-insensitively; accounts and codes are keyed on
/// this form.
fn normalize_address(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Handler: POST /user/sendMsg
///
/// `phone` carries the email address the code is sent to. The code stays
/// valid for five minutes.
async fn send_code(
    State(state): State<Arc<AppState>>,
    JsonBody(form): JsonBody<SendCodeForm>,
) -> ApiResult<&'static str> {
    let recipient = normalize_address(&form.phone);
    if recipient.is_empty() {
        return Err(ApiError::business("Failed to send verification code"));
    }

    let code = generate_code();
    if let Err(e) = state.mailer.send_code(&recipient, &code).await {
        warn!("Failed to send verification code to {}: {}", recipient, e);
        return Err(ApiError::business("Failed to send verification code"));
    }

    state
        .cache
        .set(&cache_keys::login_code(&recipient), &code, CODE_TTL)
        .await?;
    ok("Verification code sent")
}

/// Handler: POST /user/login
///
/// The first successful login creates the account.
async fn login(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    JsonBody(form): JsonBody<UserLoginForm>,
) -> ApiResult<User> {
    let phone = normalize_address(&form.phone);
    let key = cache_keys::login_code(&phone);
    let issued = state.cache.get(&key).await?;
    if !codes_match(form.code.as_deref(), issued.as_deref()) {
        info!("Customer login failed for {}", phone);
        return Err(ApiError::business("Login failed"));
    }

    let user = match state.db.user_by_phone(phone.clone()).await? {
        Some(user) => user,
        None => {
            let user = User {
                id: state.db.next_id(),
                name: None,
                phone: phone.clone(),
                sex: None,
                id_number: None,
                avatar: None,
                status: ENABLED,
            };
            state.db.insert_user(user.clone()).await?;
            info!("Registered customer {}", phone);
            user
        }
    };
    if user.status == DISABLED {
        return Err(ApiError::business("Account disabled"));
    }

    session.set_user(Some(user.id));
    cache::evict(state.cache.as_ref(), [key]).await;
    ok(user)
}

/// Handler: POST /user/loginout
async fn logout(Extension(session): Extension<Session>) -> ApiResult<&'static str> {
    session.set_user(None);
    ok("Logged out")
}
