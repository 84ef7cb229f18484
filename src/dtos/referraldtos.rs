// dtos/referraldtos.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::models::{
    policymodel::DiscountType,
    referralmodel::{IssuedReward, RejectionReason},
    rewardmodel::{RewardFilter, RewardRecord, RewardTier},
};

/// Inbound webhook body as the referral platform sends it. Every field is
/// optional here; the event validator decides what is acceptable.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub user: Option<WebhookUser>,
    #[serde(default, deserialize_with = "lenient_referrer")]
    pub referrer: Option<WebhookReferrer>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct WebhookUser {
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(rename = "referralCode", default, deserialize_with = "string_or_number")]
    pub referral_code: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct WebhookReferrer {
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
}

// A wrongly typed email is treated as absent so the validator can report
// which address was unusable.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(value)) => Some(value),
        _ => None,
    })
}

// Some platforms send numeric referral codes.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(value)) => Some(value),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn lenient_referrer<'de, D>(deserializer: D) -> Result<Option<WebhookReferrer>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .and_then(|value| serde_json::from_value(value).ok()))
}

/// Direct acceptance, e.g. from a landing page after signup.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptReferralDto {
    #[validate(length(min = 1, max = 255, message = "Referral token is required"))]
    pub referral_token: String,

    #[serde(default)]
    pub referrer_email: String,

    #[validate(length(min = 1, message = "New user email is required"))]
    pub new_user_email: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RewardIssuedDto {
    pub code: String,
    pub referee_email: String,
    pub referrer_email: String,
    pub delivered: bool,
    pub already_issued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<RewardTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_type: Option<DiscountType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<IssuedReward> for RewardIssuedDto {
    fn from(reward: IssuedReward) -> Self {
        Self {
            code: reward.code,
            referee_email: reward.referee_email,
            referrer_email: reward.referrer_email,
            delivered: reward.delivered,
            already_issued: false,
            tier: Some(reward.tier),
            discount_type: Some(reward.discount_type),
            discount_amount: Some(reward.discount_amount),
            apply_url: Some(reward.apply_url),
            expires_at: reward.expires_at,
        }
    }
}

impl RewardIssuedDto {
    /// Replay of a referral that already has a reward. Nothing was sent.
    pub fn already_issued(code: String, referee_email: String, referrer_email: String) -> Self {
        Self {
            code,
            referee_email,
            referrer_email,
            delivered: false,
            already_issued: true,
            tier: None,
            discount_type: None,
            discount_amount: None,
            apply_url: None,
            expires_at: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferralApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: T,
}

impl<T> ReferralApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RejectionResponseDto {
    pub status: String,
    pub reason: String,
    pub message: String,
}

impl RejectionResponseDto {
    pub fn rejected(reason: RejectionReason) -> Self {
        let status = if reason == RejectionReason::IgnoredEventType {
            "ignored"
        } else {
            "error"
        };

        Self {
            status: status.to_string(),
            reason: reason.to_str().to_string(),
            message: reason.message().to_string(),
        }
    }

    pub fn issuance_failed() -> Self {
        Self {
            status: "error".to_string(),
            reason: "issuance_failed".to_string(),
            message: "Failed to create reward for referee, please retry".to_string(),
        }
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardListQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,

    pub referee_email: Option<String>,
    pub referrer_email: Option<String>,
    pub tier: Option<RewardTier>,
}

impl RewardListQueryDto {
    pub fn filter(&self) -> RewardFilter {
        RewardFilter {
            referee_email: self.referee_email.as_deref().map(crate::utils::email::normalize_email),
            referrer_email: self.referrer_email.as_deref().map(crate::utils::email::normalize_email),
            tier: self.tier,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RewardListResponseDto {
    pub status: String,
    pub rewards: Vec<RewardRecord>,
    pub results: usize,
    pub page: u32,
    pub limit: usize,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardStatsQueryDto {
    pub referrer_email: Option<String>,
}
