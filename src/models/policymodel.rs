// models/policymodel.rs
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "discount_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percent,
    FixedAmount,
}

/// Administrator-controlled reward configuration. Read-only to the
/// processor, which works from one snapshot per event.
#[derive(Validate, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RewardPolicy {
    pub discount_type: DiscountType,

    #[validate(range(min = 0.0, message = "Discount amount cannot be negative"))]
    pub discount_amount: f64,

    pub enable_tiered_referrals: bool,

    #[validate(range(min = 0, message = "Tier threshold cannot be negative"))]
    pub tier_threshold: i64,

    #[validate(range(min = 0.0, max = 100.0, message = "Enhanced discount must be a percentage between 0 and 100"))]
    pub enhanced_discount_amount: f64,

    pub custom_mode_enabled: bool,

    #[serde(default)]
    #[validate(length(max = 64, message = "Custom code must be at most 64 characters"))]
    pub custom_code: String,

    #[validate(range(min = 0, max = 3650, message = "Expiry days must be between 0 and 3650"))]
    pub expiry_days: i64,

    #[validate(range(min = 0, message = "Usage limit cannot be negative"))]
    pub usage_limit: i32,

    #[validate(range(min = 0, message = "Per-user usage limit cannot be negative"))]
    pub usage_limit_per_user: i32,

    #[validate(range(min = 0.0, message = "Minimum amount cannot be negative"))]
    pub minimum_amount: f64,

    pub individual_use: bool,
    pub free_shipping: bool,
    pub exclude_sale_items: bool,

    #[serde(default)]
    pub product_ids: Vec<i64>,

    #[serde(default)]
    pub excluded_product_ids: Vec<i64>,

    #[serde(default)]
    pub product_categories: Vec<i64>,

    #[serde(default)]
    pub excluded_product_categories: Vec<i64>,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            discount_type: DiscountType::Percent,
            discount_amount: 20.0,
            enable_tiered_referrals: true,
            tier_threshold: 3,
            enhanced_discount_amount: 10.0,
            custom_mode_enabled: false,
            custom_code: String::new(),
            expiry_days: 30,
            usage_limit: 1,
            usage_limit_per_user: 1,
            minimum_amount: 0.0,
            individual_use: true,
            free_shipping: false,
            exclude_sale_items: false,
            product_ids: Vec::new(),
            excluded_product_ids: Vec::new(),
            product_categories: Vec::new(),
            excluded_product_categories: Vec::new(),
        }
    }
}

impl RewardPolicy {
    /// Field rules plus the cross-field rule that custom mode needs a code.
    pub fn check(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())?;

        if self.custom_mode_enabled && self.custom_code.trim().is_empty() {
            return Err("customCode is required when customModeEnabled is true".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_passes() {
        assert_eq!(RewardPolicy::default().check(), Ok(()));
    }

    #[test]
    fn test_out_of_range_values_fail() {
        let negative = RewardPolicy {
            discount_amount: -5.0,
            ..RewardPolicy::default()
        };
        assert!(negative.check().is_err());

        let long_code = RewardPolicy {
            custom_code: "x".repeat(65),
            ..RewardPolicy::default()
        };
        assert!(long_code.check().is_err());
    }

    #[test]
    fn test_custom_mode_needs_code() {
        let policy = RewardPolicy {
            custom_mode_enabled: true,
            custom_code: "  ".to_string(),
            ..RewardPolicy::default()
        };
        assert!(policy.check().unwrap_err().contains("customCode"));

        let policy = RewardPolicy {
            custom_code: "SUMMER25".to_string(),
            ..policy
        };
        assert_eq!(policy.check(), Ok(()));
    }

    #[test]
    fn test_categories_default_to_empty_in_json() {
        let mut value = serde_json::to_value(RewardPolicy::default()).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("productCategories");
        object.remove("excludedProductCategories");

        let policy: RewardPolicy = serde_json::from_value(value).unwrap();
        assert!(policy.product_categories.is_empty());
        assert!(policy.excluded_product_categories.is_empty());
    }
}
