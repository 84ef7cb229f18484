// models/referralmodel.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{policymodel::DiscountType, rewardmodel::RewardTier};

pub const PARTICIPATION_EVENT: &str = "participation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    Participation,
    Other(String),
}

impl From<&str> for EventType {
    fn from(raw: &str) -> Self {
        if raw == PARTICIPATION_EVENT {
            EventType::Participation
        } else {
            EventType::Other(raw.to_string())
        }
    }
}

/// A referral that passed validation. Emails are already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralEvent {
    pub event_type: EventType,
    pub referee_email: String,
    pub referrer_email: String,
    pub referral_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    MalformedPayload,
    InvalidRefereeEmail,
    IgnoredEventType,
    MissingReferrer,
    SelfReferralBlocked,
}

impl RejectionReason {
    pub fn to_str(&self) -> &'static str {
        match self {
            RejectionReason::MalformedPayload => "malformed_payload",
            RejectionReason::InvalidRefereeEmail => "invalid_referee_email",
            RejectionReason::IgnoredEventType => "ignored_event_type",
            RejectionReason::MissingReferrer => "missing_referrer",
            RejectionReason::SelfReferralBlocked => "self_referral_blocked",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::MalformedPayload => "Invalid webhook data",
            RejectionReason::InvalidRefereeEmail => "Invalid or missing referee email",
            RejectionReason::IgnoredEventType => "Not a participation event - only processing when someone joins via referral",
            RejectionReason::MissingReferrer => "No referrer - this is a direct signup, not a referral",
            RejectionReason::SelfReferralBlocked => "Referrer cannot refer themselves",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedReward {
    pub code: String,
    pub referee_email: String,
    pub referrer_email: String,
    pub tier: RewardTier,
    pub discount_type: DiscountType,
    pub discount_amount: f64,
    pub apply_url: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub delivered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Issued(IssuedReward),
    /// Idempotent replay: a reward for this referral already exists.
    AlreadyIssued {
        code: String,
        referee_email: String,
        referrer_email: String,
    },
    Rejected(RejectionReason),
    /// Infrastructure failure; nothing was persisted and nothing was sent.
    IssuanceFailed(String),
}
