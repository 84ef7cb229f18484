// handler/referral.rs
use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Extension, Json, Router,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use validator::Validate;

use crate::{
    dtos::referraldtos::{AcceptReferralDto, ReferralApiResponse, RejectionResponseDto, RewardIssuedDto},
    error::{ErrorMessage, HttpError},
    models::referralmodel::{ProcessOutcome, RejectionReason},
    service::event_validator::validate_acceptance,
    AppState,
};

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

pub fn referral_handler() -> Router {
    Router::new()
        .route("/webhook", post(referral_webhook))
        .route("/accept", post(accept_referral))
}

pub async fn referral_webhook(
    Extension(app_state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    if let Some(secret) = app_state.env.webhook_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                tracing::warn!("Referral webhook received without a signature");
                HttpError::unauthorized(ErrorMessage::SignatureNotProvided.to_string())
            })?;

        if !verify_webhook_signature(&body, signature, secret) {
            tracing::warn!("Invalid referral webhook signature received");
            return Err(HttpError::unauthorized(ErrorMessage::InvalidSignature.to_string()));
        }
    }

    let outcome = app_state.referral_service.process(&body).await;
    Ok(outcome_response(outcome))
}

pub async fn accept_referral(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<AcceptReferralDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let outcome = match validate_acceptance(body) {
        Ok(event) => app_state.referral_service.process_event(event).await,
        Err(reason) => ProcessOutcome::Rejected(reason),
    };

    Ok(outcome_response(outcome))
}

/// Hex HMAC-SHA256 of the raw body, compared in constant time.
/// A leading `sha256=` is tolerated.
fn verify_webhook_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);

    let expected_signature_hex = hex::encode(mac.finalize().into_bytes());
    let provided = signature.trim();
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided).to_ascii_lowercase();

    provided.as_bytes().ct_eq(expected_signature_hex.as_bytes()).into()
}

fn outcome_response(outcome: ProcessOutcome) -> Response {
    match outcome {
        ProcessOutcome::Issued(reward) => {
            let message = if reward.delivered {
                "Reward created and sent to referee"
            } else {
                "Reward created but the email could not be delivered"
            };
            let data = RewardIssuedDto::from(reward);
            (StatusCode::OK, Json(ReferralApiResponse::success(message, data))).into_response()
        }
        ProcessOutcome::AlreadyIssued {
            code,
            referee_email,
            referrer_email,
        } => {
            let data = RewardIssuedDto::already_issued(code, referee_email, referrer_email);
            (
                StatusCode::OK,
                Json(ReferralApiResponse::success("Reward already issued for this referral", data)),
            )
                .into_response()
        }
        ProcessOutcome::Rejected(reason) => {
            let status = match reason {
                RejectionReason::IgnoredEventType => StatusCode::OK,
                RejectionReason::MalformedPayload => StatusCode::BAD_REQUEST,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (status, Json(RejectionResponseDto::rejected(reason))).into_response()
        }
        ProcessOutcome::IssuanceFailed(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(RejectionResponseDto::issuance_failed()),
        )
            .into_response(),
    }
}
