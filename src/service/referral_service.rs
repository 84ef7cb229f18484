// service/referral_service.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::{
    config::Config,
    db::{
        query_timeout::QueryTimeout,
        rewarddb::{LedgerError, RewardLedgerExt},
    },
    mail::{
        mails::{format_expiry_date, RewardEmailParams},
        notifier::RewardNotifier,
    },
    models::{
        policymodel::RewardPolicy,
        referralmodel::{IssuedReward, ProcessOutcome, ReferralEvent, RejectionReason},
        rewardmodel::{NewRewardRecord, RewardRecord, RewardTier},
    },
    service::{
        code_generator::{fallback_token, generate_code},
        error::ServiceError,
        event_validator,
        policy::{apply_url, coupon_terms, decide_tier, discount_text, PolicyStore},
    },
};

/// Settings the processor needs besides the policy.
#[derive(Debug, Clone)]
pub struct ReferralSettings {
    pub app_url: String,
    pub email_subject: String,
    pub currency_suffix: String,
    pub ledger_timeout: Duration,
    pub notify_timeout: Duration,
}

impl From<&Config> for ReferralSettings {
    fn from(config: &Config) -> Self {
        Self {
            app_url: config.app_url.clone(),
            email_subject: config.email_subject.clone(),
            currency_suffix: config.currency_suffix.clone(),
            ledger_timeout: config.ledger_timeout,
            notify_timeout: config.notify_timeout,
        }
    }
}

pub struct ReferralService {
    ledger: Arc<dyn RewardLedgerExt>,
    notifier: Arc<dyn RewardNotifier>,
    policy_store: Arc<PolicyStore>,
    settings: ReferralSettings,
}

impl ReferralService {
    pub fn new(
        ledger: Arc<dyn RewardLedgerExt>,
        notifier: Arc<dyn RewardNotifier>,
        policy_store: Arc<PolicyStore>,
        settings: ReferralSettings,
    ) -> Self {
        Self {
            ledger,
            notifier,
            policy_store,
            settings,
        }
    }

    /// Full pipeline for one raw webhook body.
    pub async fn process(&self, raw: &[u8]) -> ProcessOutcome {
        match event_validator::validate(raw) {
            Ok(event) => self.process_event(event).await,
            Err(reason) => ProcessOutcome::Rejected(reason),
        }
    }

    /// Pipeline for an already validated event.
    pub async fn process_event(&self, event: ReferralEvent) -> ProcessOutcome {
        if event.referrer_email == event.referee_email {
            tracing::warn!("Self-referral attempt blocked: {}", event.referee_email);
            return ProcessOutcome::Rejected(RejectionReason::SelfReferralBlocked);
        }

        let policy = self.policy_store.snapshot();
        let referral_token = event
            .referral_code
            .clone()
            .unwrap_or_else(|| fallback_token(&event.referee_email, &event.referrer_email));

        match self.issue(&event, &referral_token, &policy).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    "Failed to create reward for referee {} (referred by {}): {}",
                    event.referee_email,
                    event.referrer_email,
                    e
                );
                ProcessOutcome::IssuanceFailed(e.to_string())
            }
        }
    }

    async fn issue(
        &self,
        event: &ReferralEvent,
        referral_token: &str,
        policy: &RewardPolicy,
    ) -> Result<ProcessOutcome, ServiceError> {
        let timeout = self.settings.ledger_timeout;

        // Custom codes are shared by design, so replays are not suppressed.
        if !policy.custom_mode_enabled {
            let existing = QueryTimeout::run(
                timeout,
                self.ledger.find_by_referee_and_token(&event.referee_email, referral_token),
            )
            .await?;

            if let Some(record) = existing {
                tracing::info!(
                    "Reward {} already exists for referee {}",
                    record.code,
                    record.referee_email
                );
                return Ok(already_issued(record));
            }
        }

        let historical_count = QueryTimeout::run(
            timeout,
            self.ledger.count_by_referrer(&event.referrer_email, true),
        )
        .await?;

        let decision = decide_tier(historical_count, policy);

        let code = if decision.tier == RewardTier::Custom {
            let custom_code = policy.custom_code.trim();
            if custom_code.is_empty() {
                return Err(ServiceError::MissingCustomCode);
            }
            custom_code.to_string()
        } else {
            let seed = format!("{}{}", referral_token, event.referee_email);
            tokio::time::timeout(timeout, generate_code(self.ledger.as_ref(), &seed))
                .await
                .map_err(|_| LedgerError::Timeout(timeout))??
        };

        let now = Utc::now();
        let new_record = NewRewardRecord {
            code,
            referee_email: event.referee_email.clone(),
            referrer_email: event.referrer_email.clone(),
            referral_token: referral_token.to_string(),
            tier: decision.tier,
            discount_type: decision.discount_type,
            discount_amount: decision.discount_amount,
            referrer_historical_count: historical_count,
            terms: coupon_terms(policy, decision.tier, now),
        };

        let record = match QueryTimeout::run(timeout, self.ledger.insert_reward(new_record)).await {
            Ok(record) => record,
            Err(LedgerError::DuplicateReferral { referee_email, referral_token }) => {
                // Lost a race with a concurrent delivery of the same event.
                let existing = QueryTimeout::run(
                    timeout,
                    self.ledger.find_by_referee_and_token(&referee_email, &referral_token),
                )
                .await?
                .ok_or(ServiceError::MissingExistingReward(referee_email))?;
                return Ok(already_issued(existing));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            "Created {} reward {} for REFEREE {} (referred by {}, {} prior referrals)",
            record.tier.to_str(),
            record.code,
            record.referee_email,
            record.referrer_email,
            historical_count
        );

        let apply_url = apply_url(&self.settings.app_url, &record.code, record.tier);
        let discount_text = discount_text(&decision, &self.settings.currency_suffix);
        let delivered = self.notify(&record, &apply_url, &discount_text).await;

        Ok(ProcessOutcome::Issued(IssuedReward {
            code: record.code,
            referee_email: record.referee_email,
            referrer_email: record.referrer_email,
            tier: record.tier,
            discount_type: record.discount_type,
            discount_amount: record.discount_amount,
            apply_url,
            expires_at: record.expires_at,
            delivered,
        }))
    }

    /// Mail goes to the referee only. Failure or timeout is reported, not raised.
    async fn notify(&self, record: &RewardRecord, apply_url: &str, discount_text: &str) -> bool {
        let params = RewardEmailParams {
            tier: record.tier,
            code: record.code.clone(),
            apply_url: apply_url.to_string(),
            discount_text: discount_text.to_string(),
            expiry_date: record.expires_at.map(format_expiry_date),
            referrer_email: record.referrer_email.clone(),
        };

        let send = self
            .notifier
            .send(&record.referee_email, &self.settings.email_subject, &params);

        match tokio::time::timeout(self.settings.notify_timeout, send).await {
            Ok(delivered) => {
                if !delivered {
                    tracing::warn!(
                        "Reward {} issued but mail to {} was not delivered",
                        record.code,
                        record.referee_email
                    );
                }
                delivered
            }
            Err(_) => {
                tracing::warn!(
                    "Reward mail to {} timed out after {:?}",
                    record.referee_email,
                    self.settings.notify_timeout
                );
                false
            }
        }
    }
}

fn already_issued(record: RewardRecord) -> ProcessOutcome {
    ProcessOutcome::AlreadyIssued {
        code: record.code,
        referee_email: record.referee_email,
        referrer_email: record.referrer_email,
    }
}
