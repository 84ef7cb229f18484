// Ledger call timeout protection
use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use super::rewarddb::LedgerError;

pub struct QueryTimeout;

impl QueryTimeout {
    /// Run a ledger call, turning an overrun into `LedgerError::Timeout`
    pub async fn run<F, T>(timeout_duration: Duration, query_fn: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        match timeout(timeout_duration, query_fn).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(timeout_duration)),
        }
    }

    /// Default timeout for ledger calls (5 seconds)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
}
