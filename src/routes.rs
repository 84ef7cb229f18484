// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{admin::admin_handler, referral::referral_handler},
    middleware::admin_auth,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let referral_routes = referral_handler().nest(
        "/admin",
        admin_handler().layer(middleware::from_fn(admin_auth)),
    );

    let api_route = Router::new()
        .nest("/referral", referral_routes)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}
