// service/policy.rs
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

use crate::models::{
    policymodel::{DiscountType, RewardPolicy},
    rewardmodel::{CouponTerms, RewardTier},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierDecision {
    pub tier: RewardTier,
    pub discount_type: DiscountType,
    pub discount_amount: f64,
}

/// Pick the reward bracket for a referrer with `historical_count` prior
/// non-custom rewards.
pub fn decide_tier(historical_count: i64, policy: &RewardPolicy) -> TierDecision {
    if policy.custom_mode_enabled {
        // Discount lives in the externally managed promotion.
        return TierDecision {
            tier: RewardTier::Custom,
            discount_type: DiscountType::Percent,
            discount_amount: 0.0,
        };
    }

    if policy.enable_tiered_referrals && historical_count >= policy.tier_threshold {
        return TierDecision {
            tier: RewardTier::Enhanced,
            discount_type: DiscountType::Percent,
            discount_amount: policy.enhanced_discount_amount,
        };
    }

    TierDecision {
        tier: RewardTier::Standard,
        discount_type: policy.discount_type,
        discount_amount: policy.discount_amount,
    }
}

pub fn coupon_terms(policy: &RewardPolicy, tier: RewardTier, now: DateTime<Utc>) -> CouponTerms {
    if tier == RewardTier::Custom {
        return CouponTerms {
            usage_limit: 0,
            usage_limit_per_user: 0,
            minimum_amount: 0.0,
            individual_use: true,
            free_shipping: false,
            exclude_sale_items: false,
            product_ids: Vec::new(),
            excluded_product_ids: Vec::new(),
            product_categories: Vec::new(),
            excluded_product_categories: Vec::new(),
            expires_at: None,
        };
    }

    let expires_at = (policy.expiry_days > 0).then(|| now + Duration::days(policy.expiry_days));

    CouponTerms {
        usage_limit: policy.usage_limit,
        usage_limit_per_user: policy.usage_limit_per_user,
        minimum_amount: policy.minimum_amount,
        individual_use: policy.individual_use,
        free_shipping: policy.free_shipping,
        exclude_sale_items: policy.exclude_sale_items,
        product_ids: policy.product_ids.clone(),
        excluded_product_ids: policy.excluded_product_ids.clone(),
        product_categories: policy.product_categories.clone(),
        excluded_product_categories: policy.excluded_product_categories.clone(),
        expires_at,
    }
}

pub fn discount_text(decision: &TierDecision, currency_suffix: &str) -> String {
    match (decision.tier, decision.discount_type) {
        (RewardTier::Custom, _) => "your special discount".to_string(),
        (_, DiscountType::Percent) => format!("{}%", format_amount(decision.discount_amount)),
        (_, DiscountType::FixedAmount) => format!("{:.2} {}", decision.discount_amount, currency_suffix),
    }
}

/// Link that lands the referee on the store with the code pre-applied.
pub fn apply_url(app_url: &str, code: &str, tier: RewardTier) -> String {
    let base = app_url.trim_end_matches('/');
    let code = urlencoding::encode(code);
    match tier {
        RewardTier::Custom => format!("{}/?tm-coupon={}&tm-page=referred", base, code),
        _ => format!("{}/?coupon-code={}&sc-page=referred", base, code),
    }
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{:.2}", amount)
    }
}

/// Holds the active policy. Each event works from one snapshot, so a
/// replacement only affects events that start after it.
#[derive(Debug)]
pub struct PolicyStore {
    current: RwLock<Arc<RewardPolicy>>,
}

impl PolicyStore {
    pub fn new(policy: RewardPolicy) -> Self {
        Self {
            current: RwLock::new(Arc::new(policy)),
        }
    }

    pub fn snapshot(&self) -> Arc<RewardPolicy> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, policy: RewardPolicy) {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(policy);
    }
}
