pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod session;

use std::sync::Arc;

use axum::{middleware, routing::get, Json, Router};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use cache::Cache;
pub use config::Config;
pub use db::{Database, RepositoryError};
pub use error::ApiError;
pub use notify::CodeSender;

/// Shared handles for every request.
pub struct AppState {
    pub db: Arc<Database>,
    pub cache: Arc<dyn Cache>,
    pub mailer: Arc<dyn CodeSender>,
    pub config: Config,
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "reggie"
    }))
}

/// Build the full application: API routes, static assets, session and login
/// middleware, request tracing.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health_check))
        .merge(handlers::employee::router())
        .merge(handlers::category::router())
        .merge(handlers::dish::router())
        .merge(handlers::setmeal::router())
        .merge(handlers::user::router())
        .merge(handlers::shopping_cart::router())
        .merge(handlers::address_book::router())
        .merge(handlers::order::router())
        .merge(handlers::common::router());

    if let Some(dir) = &state.config.static_dir {
        app = app
            .nest_service("/backend", ServeDir::new(dir.join("backend")))
            .nest_service("/front", ServeDir::new(dir.join("front")));
    }

    // Layers wrap outside-in: tracing, then session loading, then the login
    // check which reads the session.
    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn_with_state(
                state.clone(),
                session::session_layer,
            ))
            .layer(middleware::from_fn(auth::login_check)),
    )
    .with_state(state)
}
