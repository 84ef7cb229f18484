// models/rewardmodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::policymodel::DiscountType;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "reward_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RewardTier {
    Standard,
    Enhanced,
    Custom,
}

impl RewardTier {
    pub fn to_str(&self) -> &str {
        match self {
            RewardTier::Standard => "standard",
            RewardTier::Enhanced => "enhanced",
            RewardTier::Custom => "custom",
        }
    }
}

/// Usage restrictions attached to an issued reward code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CouponTerms {
    pub usage_limit: i32,
    pub usage_limit_per_user: i32,
    pub minimum_amount: f64,
    pub individual_use: bool,
    pub free_shipping: bool,
    pub exclude_sale_items: bool,
    pub product_ids: Vec<i64>,
    pub excluded_product_ids: Vec<i64>,
    pub product_categories: Vec<i64>,
    pub excluded_product_categories: Vec<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RewardRecord {
    pub id: Uuid,
    pub code: String,
    pub referee_email: String,
    pub referrer_email: String,
    pub referral_token: String,
    pub tier: RewardTier,
    pub discount_type: DiscountType,
    pub discount_amount: f64,
    pub referrer_historical_count: i64,
    pub usage_limit: i32,
    pub usage_limit_per_user: i32,
    pub minimum_amount: f64,
    pub individual_use: bool,
    pub free_shipping: bool,
    pub exclude_sale_items: bool,
    pub product_ids: Vec<i64>,
    pub excluded_product_ids: Vec<i64>,
    pub product_categories: Vec<i64>,
    pub excluded_product_categories: Vec<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Everything the ledger needs to append a record; id and created_at are
/// assigned by the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRewardRecord {
    pub code: String,
    pub referee_email: String,
    pub referrer_email: String,
    pub referral_token: String,
    pub tier: RewardTier,
    pub discount_type: DiscountType,
    pub discount_amount: f64,
    pub referrer_historical_count: i64,
    pub terms: CouponTerms,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardFilter {
    pub referee_email: Option<String>,
    pub referrer_email: Option<String>,
    pub tier: Option<RewardTier>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RewardStats {
    pub total: i64,
    pub standard: i64,
    pub enhanced: i64,
    pub custom: i64,
}
