// service/event_validator.rs
use serde_json::Value;

use crate::{
    dtos::referraldtos::{AcceptReferralDto, WebhookPayload},
    models::referralmodel::{EventType, ReferralEvent, RejectionReason, PARTICIPATION_EVENT},
    utils::email::parse_email,
};

const MAX_REFERRAL_CODE_LEN: usize = 255;

/// Decode a raw webhook body and validate it. This is the only place where
/// untyped input becomes a `ReferralEvent`.
pub fn validate(raw: &[u8]) -> Result<ReferralEvent, RejectionReason> {
    let value: Value = serde_json::from_slice(raw).map_err(|e| {
        tracing::debug!("Webhook body is not valid JSON: {}", e);
        RejectionReason::MalformedPayload
    })?;

    if !value.is_object() {
        tracing::debug!("Webhook body is not a JSON object");
        return Err(RejectionReason::MalformedPayload);
    }

    let payload: WebhookPayload = serde_json::from_value(value).map_err(|e| {
        tracing::debug!("Webhook body has unexpected field types: {}", e);
        RejectionReason::MalformedPayload
    })?;

    validate_payload(payload)
}

pub fn validate_payload(payload: WebhookPayload) -> Result<ReferralEvent, RejectionReason> {
    let (Some(event_type), Some(user)) = (payload.event_type, payload.user) else {
        tracing::debug!("Webhook missing required field: type or user");
        return Err(RejectionReason::MalformedPayload);
    };

    let referee_email = user
        .email
        .as_deref()
        .and_then(parse_email)
        .ok_or(RejectionReason::InvalidRefereeEmail)?;

    let event_type = EventType::from(event_type.as_str());
    if let EventType::Other(ref other) = event_type {
        tracing::info!("Ignoring webhook event type: {}", other);
        return Err(RejectionReason::IgnoredEventType);
    }

    let referrer_email = payload
        .referrer
        .and_then(|referrer| referrer.email)
        .as_deref()
        .and_then(parse_email)
        .ok_or_else(|| {
            tracing::info!(
                "No referrer found - this is a direct signup, not a referral: {}",
                referee_email
            );
            RejectionReason::MissingReferrer
        })?;

    let referral_code = clean_referral_code(user.referral_code.as_deref())?;

    Ok(ReferralEvent {
        event_type,
        referee_email,
        referrer_email,
        referral_code,
    })
}

/// Direct acceptance carries the same information as a participation
/// webhook, so it goes through the same rules.
pub fn validate_acceptance(body: AcceptReferralDto) -> Result<ReferralEvent, RejectionReason> {
    let referrer_email = if body.referrer_email.trim().is_empty() {
        None
    } else {
        Some(body.referrer_email)
    };

    validate_payload(WebhookPayload {
        event_type: Some(PARTICIPATION_EVENT.to_string()),
        user: Some(crate::dtos::referraldtos::WebhookUser {
            email: Some(body.new_user_email),
            referral_code: Some(body.referral_token),
        }),
        referrer: Some(crate::dtos::referraldtos::WebhookReferrer {
            email: referrer_email,
        }),
    })
}

fn clean_referral_code(raw: Option<&str>) -> Result<Option<String>, RejectionReason> {
    let Some(code) = raw.map(str::trim).filter(|code| !code.is_empty()) else {
        return Ok(None);
    };

    if code.chars().count() > MAX_REFERRAL_CODE_LEN || code.chars().any(char::is_control) {
        tracing::debug!("Rejecting unusable referral code");
        return Err(RejectionReason::MalformedPayload);
    }

    Ok(Some(code.to_string()))
}
