// middleware.rs
use std::sync::Arc;

use axum::{extract::Request, middleware::Next, response::IntoResponse, Extension};
use subtle::ConstantTimeEq;

use crate::{
    error::{ErrorMessage, HttpError},
    AppState,
};

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Guards the reporting and policy routes with a shared operator key.
pub async fn admin_auth(
    Extension(app_state): Extension<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let expected = app_state
        .env
        .admin_api_key
        .as_deref()
        .ok_or_else(|| HttpError::forbidden(ErrorMessage::AdminAccessDisabled.to_string()))?;

    let provided = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::AdminKeyNotProvided.to_string()))?;

    let matches: bool = provided.as_bytes().ct_eq(expected.as_bytes()).into();
    if !matches {
        tracing::warn!("Rejected admin request to {} with invalid key", req.uri().path());
        return Err(HttpError::unauthorized(ErrorMessage::InvalidAdminKey.to_string()));
    }

    Ok(next.run(req).await)
}
