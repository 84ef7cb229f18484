// service/code_generator.rs
use chrono::Utc;
use rand::Rng;

use crate::{db::rewarddb::RewardLedgerExt, service::error::ServiceError};

pub const CODE_PREFIX: &str = "ref-";
const CODE_HASH_LEN: usize = 8;

/// First try plus one salted retry.
pub const MAX_ATTEMPTS: u32 = 2;

/// Short lowercase code from a one-way hash of the seed, the time and an
/// optional salt. Collision resistant, not secret.
pub fn derive_code(seed: &str, timestamp: i64, salt: Option<u32>) -> String {
    let material = match salt {
        Some(salt) => format!("{}{}{}", seed, timestamp, salt),
        None => format!("{}{}", seed, timestamp),
    };
    let digest = format!("{:x}", md5::compute(material.as_bytes()));
    format!("{}{}", CODE_PREFIX, &digest[..CODE_HASH_LEN])
}

/// Stable idempotency token for events that carry no referral code.
pub fn fallback_token(referee_email: &str, referrer_email: &str) -> String {
    let digest = md5::compute(format!("{}|{}", referee_email, referrer_email).as_bytes());
    format!("auto-{:x}", digest)
}

/// Produce a code the ledger does not know yet, giving up after
/// `MAX_ATTEMPTS` collisions.
pub async fn generate_code(ledger: &dyn RewardLedgerExt, seed: &str) -> Result<String, ServiceError> {
    let timestamp = Utc::now().timestamp();

    for attempt in 0..MAX_ATTEMPTS {
        let salt = (attempt > 0).then(|| rand::rng().random::<u32>());
        let code = derive_code(seed, timestamp, salt);

        if !ledger.code_exists(&code).await? {
            return Ok(code);
        }

        tracing::warn!("Reward code collision on attempt {}: {}", attempt + 1, code);
    }

    Err(ServiceError::CodeSpaceExhausted(MAX_ATTEMPTS))
}
