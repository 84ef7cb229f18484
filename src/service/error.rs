use thiserror::Error;

use crate::{db::rewarddb::LedgerError, error::HttpError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Could not find a free reward code after {0} attempts")]
    CodeSpaceExhausted(u32),

    #[error("Custom reward mode is enabled but no custom code is configured")]
    MissingCustomCode,

    #[error("Ledger rejected the duplicate but the existing reward for {0} could not be found")]
    MissingExistingReward(String),
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Ledger(ref e) if e.is_timeout() => HttpError::service_unavailable(error.to_string()),

            _ => HttpError::server_error(error.to_string()),
        }
    }
}
