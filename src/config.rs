// config.rs
use std::str::FromStr;
use std::time::Duration;

use crate::{
    db::query_timeout::QueryTimeout,
    models::policymodel::{DiscountType, RewardPolicy},
};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub app_url: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    // Email service configurations
    pub resend_api_key: String,
    pub sender_name: String,
    pub sender_email: String,
    pub email_subject: String,
    pub currency_suffix: String,
    // Inbound webhook + admin access
    pub webhook_secret: Option<String>,
    pub admin_api_key: Option<String>,
    // Bounded waits on blocking collaborators
    pub ledger_timeout: Duration,
    pub notify_timeout: Duration,
    // Policy the service starts with
    pub initial_policy: RewardPolicy,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let port = env_or("PORT", 8000u16);
        let app_url = std::env::var("APP_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let resend_api_key = std::env::var("RESEND_API_KEY")
            .unwrap_or_else(|_| "".to_string());
        let sender_name = std::env::var("SENDER_NAME")
            .unwrap_or_else(|_| "Referral Rewards".to_string());
        let sender_email = std::env::var("SENDER_EMAIL")
            .unwrap_or_else(|_| "noreply@example.com".to_string());
        let email_subject = std::env::var("EMAIL_SUBJECT")
            .unwrap_or_else(|_| "Welcome! Your exclusive discount code is ready".to_string());
        let currency_suffix = std::env::var("CURRENCY_SUFFIX")
            .unwrap_or_else(|_| "kr".to_string());

        let webhook_secret = non_empty_var("WEBHOOK_SECRET");
        let admin_api_key = non_empty_var("ADMIN_API_KEY");

        let ledger_timeout = Duration::from_millis(env_or(
            "LEDGER_TIMEOUT_MS",
            QueryTimeout::DEFAULT_TIMEOUT.as_millis() as u64,
        ));
        let notify_timeout = Duration::from_millis(env_or("NOTIFY_TIMEOUT_MS", 10_000u64));

        let initial_policy = policy_from_env();
        initial_policy.check().expect("REWARD_* settings are invalid");

        Config {
            database_url,
            app_url,
            port,
            allowed_origins,
            resend_api_key,
            sender_name,
            sender_email,
            email_subject,
            currency_suffix,
            webhook_secret,
            admin_api_key,
            ledger_timeout,
            notify_timeout,
            initial_policy,
        }
    }
}

fn policy_from_env() -> RewardPolicy {
    let defaults = RewardPolicy::default();

    let discount_type = match std::env::var("REWARD_DISCOUNT_TYPE").as_deref() {
        Ok("fixed_amount") | Ok("fixed_cart") => DiscountType::FixedAmount,
        Ok("percent") => DiscountType::Percent,
        _ => defaults.discount_type,
    };

    RewardPolicy {
        discount_type,
        discount_amount: env_or("REWARD_DISCOUNT_AMOUNT", defaults.discount_amount),
        enable_tiered_referrals: env_or("REWARD_ENABLE_TIERED", defaults.enable_tiered_referrals),
        tier_threshold: env_or("REWARD_TIER_THRESHOLD", defaults.tier_threshold),
        enhanced_discount_amount: env_or("REWARD_ENHANCED_AMOUNT", defaults.enhanced_discount_amount),
        custom_mode_enabled: env_or("REWARD_CUSTOM_MODE", defaults.custom_mode_enabled),
        custom_code: std::env::var("REWARD_CUSTOM_CODE").unwrap_or(defaults.custom_code),
        expiry_days: env_or("REWARD_EXPIRY_DAYS", defaults.expiry_days).clamp(0, 3650),
        usage_limit: env_or("REWARD_USAGE_LIMIT", defaults.usage_limit),
        usage_limit_per_user: env_or("REWARD_USAGE_LIMIT_PER_USER", defaults.usage_limit_per_user),
        minimum_amount: env_or("REWARD_MINIMUM_AMOUNT", defaults.minimum_amount),
        individual_use: env_or("REWARD_INDIVIDUAL_USE", defaults.individual_use),
        free_shipping: env_or("REWARD_FREE_SHIPPING", defaults.free_shipping),
        exclude_sale_items: env_or("REWARD_EXCLUDE_SALE_ITEMS", defaults.exclude_sale_items),
        product_ids: id_list("REWARD_PRODUCT_IDS"),
        excluded_product_ids: id_list("REWARD_EXCLUDED_PRODUCT_IDS"),
        product_categories: id_list("REWARD_PRODUCT_CATEGORIES"),
        excluded_product_categories: id_list("REWARD_EXCLUDED_PRODUCT_CATEGORIES"),
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable value for {}: {:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn id_list(key: &str) -> Vec<i64> {
    std::env::var(key)
        .unwrap_or_default()
        .split(',')
        .filter_map(|id| id.trim().parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("REFERRAL_TEST_PORT_GARBAGE", "eighty");
        assert_eq!(env_or("REFERRAL_TEST_PORT_GARBAGE", 8000u16), 8000);

        std::env::set_var("REFERRAL_TEST_PORT_OK", " 9090 ");
        assert_eq!(env_or("REFERRAL_TEST_PORT_OK", 8000u16), 9090);

        assert!(env_or("REFERRAL_TEST_UNSET_FLAG", true));
    }

    #[test]
    fn test_id_list_skips_bad_entries() {
        std::env::set_var("REFERRAL_TEST_IDS", "12, 7,abc,,40");
        assert_eq!(id_list("REFERRAL_TEST_IDS"), vec![12, 7, 40]);
        assert!(id_list("REFERRAL_TEST_IDS_UNSET").is_empty());
    }

    #[test]
    fn test_blank_secrets_count_as_unset() {
        std::env::set_var("REFERRAL_TEST_BLANK_SECRET", "   ");
        assert_eq!(non_empty_var("REFERRAL_TEST_BLANK_SECRET"), None);
    }

    #[test]
    fn test_env_policy_is_checked() {
        std::env::set_var("REWARD_DISCOUNT_AMOUNT", "-5");
        std::env::set_var("REWARD_PRODUCT_CATEGORIES", "15,16");
        let policy = policy_from_env();
        std::env::remove_var("REWARD_DISCOUNT_AMOUNT");
        std::env::remove_var("REWARD_PRODUCT_CATEGORIES");

        assert_eq!(policy.product_categories, vec![15, 16]);
        assert!(policy.check().is_err());
    }
}
