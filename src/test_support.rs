// In-memory collaborators for unit and router tests
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::Config,
    db::rewarddb::{LedgerError, RewardLedgerExt},
    mail::{mails::RewardEmailParams, notifier::RewardNotifier},
    models::{
        policymodel::RewardPolicy,
        rewardmodel::{NewRewardRecord, RewardFilter, RewardRecord, RewardStats, RewardTier},
    },
    AppState,
};

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/referral_rewards_test".to_string(),
        app_url: "https://shop.example".to_string(),
        port: 8000,
        allowed_origins: vec!["http://localhost:5173".to_string()],
        resend_api_key: String::new(),
        sender_name: "Shop".to_string(),
        sender_email: "noreply@shop.example".to_string(),
        email_subject: "Your discount code".to_string(),
        currency_suffix: "kr".to_string(),
        webhook_secret: None,
        admin_api_key: Some("admin-secret".to_string()),
        ledger_timeout: Duration::from_millis(200),
        notify_timeout: Duration::from_millis(200),
        initial_policy: RewardPolicy::default(),
    }
}

/// Ledger backed by a Vec that enforces the same uniqueness rules as the
/// Postgres indexes: codes and (referee, token) are unique among
/// non-custom records.
#[derive(Default)]
pub struct MemoryLedger {
    records: Mutex<Vec<RewardRecord>>,
    inserts: AtomicU32,
}

impl MemoryLedger {
    pub fn records(&self) -> Vec<RewardRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn insert_calls(&self) -> u32 {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Seed a prior reward without going through the processor.
    pub fn seed(&self, referee_email: &str, referrer_email: &str, token: &str, tier: RewardTier) {
        let record = to_record(NewRewardRecord {
            code: format!("ref-seed{:04}", self.records.lock().unwrap().len()),
            referee_email: referee_email.to_string(),
            referrer_email: referrer_email.to_string(),
            referral_token: token.to_string(),
            tier,
            discount_type: RewardPolicy::default().discount_type,
            discount_amount: 20.0,
            referrer_historical_count: 0,
            terms: crate::service::policy::coupon_terms(&RewardPolicy::default(), tier, Utc::now()),
        });
        self.records.lock().unwrap().push(record);
    }
}

fn to_record(new: NewRewardRecord) -> RewardRecord {
    RewardRecord {
        id: Uuid::new_v4(),
        code: new.code,
        referee_email: new.referee_email,
        referrer_email: new.referrer_email,
        referral_token: new.referral_token,
        tier: new.tier,
        discount_type: new.discount_type,
        discount_amount: new.discount_amount,
        referrer_historical_count: new.referrer_historical_count,
        usage_limit: new.terms.usage_limit,
        usage_limit_per_user: new.terms.usage_limit_per_user,
        minimum_amount: new.terms.minimum_amount,
        individual_use: new.terms.individual_use,
        free_shipping: new.terms.free_shipping,
        exclude_sale_items: new.terms.exclude_sale_items,
        product_ids: new.terms.product_ids,
        excluded_product_ids: new.terms.excluded_product_ids,
        product_categories: new.terms.product_categories,
        excluded_product_categories: new.terms.excluded_product_categories,
        expires_at: new.terms.expires_at,
        created_at: Utc::now(),
    }
}

fn matches_filter(record: &RewardRecord, filter: &RewardFilter) -> bool {
    filter.referee_email.as_deref().map_or(true, |e| record.referee_email == e)
        && filter.referrer_email.as_deref().map_or(true, |e| record.referrer_email == e)
        && filter.tier.map_or(true, |t| record.tier == t)
}

#[async_trait]
impl RewardLedgerExt for MemoryLedger {
    async fn find_by_referee_and_token(
        &self,
        referee_email: &str,
        referral_token: &str,
    ) -> Result<Option<RewardRecord>, LedgerError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.referee_email == referee_email && r.referral_token == referral_token)
            .cloned())
    }

    async fn count_by_referrer(
        &self,
        referrer_email: &str,
        exclude_custom: bool,
    ) -> Result<i64, LedgerError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.referrer_email == referrer_email)
            .filter(|r| !exclude_custom || r.tier != RewardTier::Custom)
            .count() as i64)
    }

    async fn code_exists(&self, code: &str) -> Result<bool, LedgerError> {
        Ok(self.records.lock().unwrap().iter().any(|r| r.code == code))
    }

    async fn insert_reward(&self, record: NewRewardRecord) -> Result<RewardRecord, LedgerError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();

        if record.tier != RewardTier::Custom {
            let non_custom = || records.iter().filter(|r| r.tier != RewardTier::Custom);

            if non_custom().any(|r| {
                r.referee_email == record.referee_email && r.referral_token == record.referral_token
            }) {
                return Err(LedgerError::DuplicateReferral {
                    referee_email: record.referee_email,
                    referral_token: record.referral_token,
                });
            }
            if non_custom().any(|r| r.code == record.code) {
                return Err(LedgerError::DuplicateCode(record.code));
            }
        }

        let stored = to_record(record);
        records.push(stored.clone());
        Ok(stored)
    }

    async fn list_rewards(
        &self,
        filter: &RewardFilter,
        page: u32,
        limit: usize,
    ) -> Result<Vec<RewardRecord>, LedgerError> {
        let skip = (page.max(1) as usize - 1) * limit;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| matches_filter(r, filter))
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn reward_stats(&self, referrer_email: Option<&str>) -> Result<RewardStats, LedgerError> {
        let records = self.records.lock().unwrap();
        let mut stats = RewardStats::default();
        for record in records
            .iter()
            .filter(|r| referrer_email.map_or(true, |e| r.referrer_email == e))
        {
            stats.total += 1;
            match record.tier {
                RewardTier::Standard => stats.standard += 1,
                RewardTier::Enhanced => stats.enhanced += 1,
                RewardTier::Custom => stats.custom += 1,
            }
        }
        Ok(stats)
    }
}

/// Every call fails as if the database were unreachable.
#[derive(Default)]
pub struct FailingLedger;

#[async_trait]
impl RewardLedgerExt for FailingLedger {
    async fn find_by_referee_and_token(&self, _: &str, _: &str) -> Result<Option<RewardRecord>, LedgerError> {
        Err(LedgerError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn count_by_referrer(&self, _: &str, _: bool) -> Result<i64, LedgerError> {
        Err(LedgerError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn code_exists(&self, _: &str) -> Result<bool, LedgerError> {
        Err(LedgerError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn insert_reward(&self, _: NewRewardRecord) -> Result<RewardRecord, LedgerError> {
        Err(LedgerError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn list_rewards(&self, _: &RewardFilter, _: u32, _: usize) -> Result<Vec<RewardRecord>, LedgerError> {
        Err(LedgerError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn reward_stats(&self, _: Option<&str>) -> Result<RewardStats, LedgerError> {
        Err(LedgerError::Database(sqlx::Error::PoolTimedOut))
    }
}

/// Reads work, inserts fail.
#[derive(Default)]
pub struct WriteFailingLedger {
    pub inner: MemoryLedger,
}

#[async_trait]
impl RewardLedgerExt for WriteFailingLedger {
    async fn find_by_referee_and_token(&self, referee: &str, token: &str) -> Result<Option<RewardRecord>, LedgerError> {
        self.inner.find_by_referee_and_token(referee, token).await
    }

    async fn count_by_referrer(&self, referrer: &str, exclude_custom: bool) -> Result<i64, LedgerError> {
        self.inner.count_by_referrer(referrer, exclude_custom).await
    }

    async fn code_exists(&self, code: &str) -> Result<bool, LedgerError> {
        self.inner.code_exists(code).await
    }

    async fn insert_reward(&self, _: NewRewardRecord) -> Result<RewardRecord, LedgerError> {
        Err(LedgerError::Database(sqlx::Error::PoolClosed))
    }

    async fn list_rewards(&self, filter: &RewardFilter, page: u32, limit: usize) -> Result<Vec<RewardRecord>, LedgerError> {
        self.inner.list_rewards(filter, page, limit).await
    }

    async fn reward_stats(&self, referrer: Option<&str>) -> Result<RewardStats, LedgerError> {
        self.inner.reward_stats(referrer).await
    }
}

/// Reports the first `collisions` codes as taken.
pub struct CollidingLedger {
    collisions: u32,
    checks: AtomicU32,
    inner: MemoryLedger,
}

impl CollidingLedger {
    pub fn new(collisions: u32) -> Self {
        Self {
            collisions,
            checks: AtomicU32::new(0),
            inner: MemoryLedger::default(),
        }
    }

    pub fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RewardLedgerExt for CollidingLedger {
    async fn find_by_referee_and_token(&self, referee: &str, token: &str) -> Result<Option<RewardRecord>, LedgerError> {
        self.inner.find_by_referee_and_token(referee, token).await
    }

    async fn count_by_referrer(&self, referrer: &str, exclude_custom: bool) -> Result<i64, LedgerError> {
        self.inner.count_by_referrer(referrer, exclude_custom).await
    }

    async fn code_exists(&self, _: &str) -> Result<bool, LedgerError> {
        let previous = self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(previous < self.collisions)
    }

    async fn insert_reward(&self, record: NewRewardRecord) -> Result<RewardRecord, LedgerError> {
        self.inner.insert_reward(record).await
    }

    async fn list_rewards(&self, filter: &RewardFilter, page: u32, limit: usize) -> Result<Vec<RewardRecord>, LedgerError> {
        self.inner.list_rewards(filter, page, limit).await
    }

    async fn reward_stats(&self, referrer: Option<&str>) -> Result<RewardStats, LedgerError> {
        self.inner.reward_stats(referrer).await
    }
}

/// Serves one stale "not found" from `find_by_referee_and_token` after
/// `hide_next_lookup`, as when a concurrent delivery has not committed yet.
#[derive(Default)]
pub struct StaleReadLedger {
    pub inner: MemoryLedger,
    hide_next: AtomicBool,
}

impl StaleReadLedger {
    pub fn hide_next_lookup(&self) {
        self.hide_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RewardLedgerExt for StaleReadLedger {
    async fn find_by_referee_and_token(&self, referee: &str, token: &str) -> Result<Option<RewardRecord>, LedgerError> {
        if self.hide_next.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_by_referee_and_token(referee, token).await
    }

    async fn count_by_referrer(&self, referrer: &str, exclude_custom: bool) -> Result<i64, LedgerError> {
        self.inner.count_by_referrer(referrer, exclude_custom).await
    }

    async fn code_exists(&self, code: &str) -> Result<bool, LedgerError> {
        self.inner.code_exists(code).await
    }

    async fn insert_reward(&self, record: NewRewardRecord) -> Result<RewardRecord, LedgerError> {
        self.inner.insert_reward(record).await
    }

    async fn list_rewards(&self, filter: &RewardFilter, page: u32, limit: usize) -> Result<Vec<RewardRecord>, LedgerError> {
        self.inner.list_rewards(filter, page, limit).await
    }

    async fn reward_stats(&self, referrer: Option<&str>) -> Result<RewardStats, LedgerError> {
        self.inner.reward_stats(referrer).await
    }
}

/// The free-code check passes but the insert loses the code to another writer.
#[derive(Default)]
pub struct CodeClashLedger {
    pub inner: MemoryLedger,
}

#[async_trait]
impl RewardLedgerExt for CodeClashLedger {
    async fn find_by_referee_and_token(&self, referee: &str, token: &str) -> Result<Option<RewardRecord>, LedgerError> {
        self.inner.find_by_referee_and_token(referee, token).await
    }

    async fn count_by_referrer(&self, referrer: &str, exclude_custom: bool) -> Result<i64, LedgerError> {
        self.inner.count_by_referrer(referrer, exclude_custom).await
    }

    async fn code_exists(&self, code: &str) -> Result<bool, LedgerError> {
        self.inner.code_exists(code).await
    }

    async fn insert_reward(&self, record: NewRewardRecord) -> Result<RewardRecord, LedgerError> {
        Err(LedgerError::DuplicateCode(record.code))
    }

    async fn list_rewards(&self, filter: &RewardFilter, page: u32, limit: usize) -> Result<Vec<RewardRecord>, LedgerError> {
        self.inner.list_rewards(filter, page, limit).await
    }

    async fn reward_stats(&self, referrer: Option<&str>) -> Result<RewardStats, LedgerError> {
        self.inner.reward_stats(referrer).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub destination: String,
    pub subject: String,
    pub params: RewardEmailParams,
}

/// Records every send and answers with a fixed result, optionally after a delay.
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMail>>,
    succeed: bool,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn succeeding() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            succeed: true,
            delay: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            succeed: false,
            ..Self::succeeding()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::succeeding()
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RewardNotifier for RecordingNotifier {
    async fn send(&self, destination: &str, subject: &str, params: &RewardEmailParams) -> bool {
        self.sent.lock().unwrap().push(SentMail {
            destination: destination.to_string(),
            subject: subject.to_string(),
            params: params.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.succeed
    }
}

/// Full router over the given collaborators, as `main` would build it.
pub fn test_app(
    config: Config,
    ledger: Arc<dyn RewardLedgerExt>,
    notifier: Arc<dyn RewardNotifier>,
) -> axum::Router {
    crate::routes::create_router(Arc::new(AppState::new(config, ledger, notifier)))
}
