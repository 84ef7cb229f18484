// db/rewarddb.rs
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::DBClient;
use crate::models::rewardmodel::{NewRewardRecord, RewardFilter, RewardRecord, RewardStats};

const CODE_UNIQUE_INDEX: &str = "reward_records_code_unique";
const REFERRAL_UNIQUE_INDEX: &str = "reward_records_referral_unique";

const RECORD_COLUMNS: &str = r#"
    id, code, referee_email, referrer_email, referral_token,
    tier, discount_type, discount_amount, referrer_historical_count,
    usage_limit, usage_limit_per_user, minimum_amount,
    individual_use, free_shipping, exclude_sale_items,
    product_ids, excluded_product_ids,
    product_categories, excluded_product_categories,
    expires_at, created_at
"#;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("A reward for {referee_email} with token {referral_token} already exists")]
    DuplicateReferral {
        referee_email: String,
        referral_token: String,
    },

    #[error("Reward code {0} is already taken")]
    DuplicateCode(String),

    #[error("Ledger call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Append-only reward store. The processor only reads, counts and inserts;
/// reporting callers additionally list and aggregate.
#[async_trait]
pub trait RewardLedgerExt: Send + Sync {
    async fn find_by_referee_and_token(
        &self,
        referee_email: &str,
        referral_token: &str,
    ) -> Result<Option<RewardRecord>, LedgerError>;

    async fn count_by_referrer(
        &self,
        referrer_email: &str,
        exclude_custom: bool,
    ) -> Result<i64, LedgerError>;

    async fn code_exists(&self, code: &str) -> Result<bool, LedgerError>;

    /// Must fail with `DuplicateReferral` / `DuplicateCode` rather than
    /// overwrite when a non-custom record collides.
    async fn insert_reward(&self, record: NewRewardRecord) -> Result<RewardRecord, LedgerError>;

    async fn list_rewards(
        &self,
        filter: &RewardFilter,
        page: u32,
        limit: usize,
    ) -> Result<Vec<RewardRecord>, LedgerError>;

    async fn reward_stats(&self, referrer_email: Option<&str>) -> Result<RewardStats, LedgerError>;
}

#[async_trait]
impl RewardLedgerExt for DBClient {
    async fn find_by_referee_and_token(
        &self,
        referee_email: &str,
        referral_token: &str,
    ) -> Result<Option<RewardRecord>, LedgerError> {
        let record = sqlx::query_as::<_, RewardRecord>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM reward_records
            WHERE referee_email = $1 AND referral_token = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#
        ))
        .bind(referee_email)
        .bind(referral_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn count_by_referrer(
        &self,
        referrer_email: &str,
        exclude_custom: bool,
    ) -> Result<i64, LedgerError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM reward_records
            WHERE referrer_email = $1
            AND ($2 = FALSE OR tier <> 'custom')
            "#
        )
        .bind(referrer_email)
        .bind(exclude_custom)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn code_exists(&self, code: &str) -> Result<bool, LedgerError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM reward_records WHERE code = $1)"
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_reward(&self, record: NewRewardRecord) -> Result<RewardRecord, LedgerError> {
        let result = sqlx::query_as::<_, RewardRecord>(&format!(
            r#"
            INSERT INTO reward_records (
                id, code, referee_email, referrer_email, referral_token,
                tier, discount_type, discount_amount, referrer_historical_count,
                usage_limit, usage_limit_per_user, minimum_amount,
                individual_use, free_shipping, exclude_sale_items,
                product_ids, excluded_product_ids,
                product_categories, excluded_product_categories, expires_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
            )
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&record.code)
        .bind(&record.referee_email)
        .bind(&record.referrer_email)
        .bind(&record.referral_token)
        .bind(record.tier)
        .bind(record.discount_type)
        .bind(record.discount_amount)
        .bind(record.referrer_historical_count)
        .bind(record.terms.usage_limit)
        .bind(record.terms.usage_limit_per_user)
        .bind(record.terms.minimum_amount)
        .bind(record.terms.individual_use)
        .bind(record.terms.free_shipping)
        .bind(record.terms.exclude_sale_items)
        .bind(&record.terms.product_ids)
        .bind(&record.terms.excluded_product_ids)
        .bind(&record.terms.product_categories)
        .bind(&record.terms.excluded_product_categories)
        .bind(record.terms.expires_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(inserted) => Ok(inserted),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let constraint = db_err.constraint().map(str::to_owned);
                match duplicate_error(constraint.as_deref(), record) {
                    Some(duplicate) => Err(duplicate),
                    None => Err(LedgerError::Database(sqlx::Error::Database(db_err))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_rewards(
        &self,
        filter: &RewardFilter,
        page: u32,
        limit: usize,
    ) -> Result<Vec<RewardRecord>, LedgerError> {
        let offset = (page.max(1) - 1) as i64 * limit as i64;

        let records = sqlx::query_as::<_, RewardRecord>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM reward_records
            WHERE ($1::text IS NULL OR referee_email = $1)
            AND ($2::text IS NULL OR referrer_email = $2)
            AND ($3::reward_tier IS NULL OR tier = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.referee_email.as_deref())
        .bind(filter.referrer_email.as_deref())
        .bind(filter.tier)
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn reward_stats(&self, referrer_email: Option<&str>) -> Result<RewardStats, LedgerError> {
        let stats = sqlx::query_as::<_, RewardStats>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE tier = 'standard') AS standard,
                COUNT(*) FILTER (WHERE tier = 'enhanced') AS enhanced,
                COUNT(*) FILTER (WHERE tier = 'custom') AS custom
            FROM reward_records
            WHERE ($1::text IS NULL OR referrer_email = $1)
            "#
        )
        .bind(referrer_email)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}

/// Names the collision behind a unique violation on `reward_records`.
fn duplicate_error(constraint: Option<&str>, record: NewRewardRecord) -> Option<LedgerError> {
    match constraint {
        Some(REFERRAL_UNIQUE_INDEX) => Some(LedgerError::DuplicateReferral {
            referee_email: record.referee_email,
            referral_token: record.referral_token,
        }),
        Some(CODE_UNIQUE_INDEX) => Some(LedgerError::DuplicateCode(record.code)),
        _ => None,
    }
}

impl LedgerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LedgerError::Timeout(_))
    }
}
