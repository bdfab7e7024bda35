use core_logic::HttpError;
use thiserror::Error;

/// Errors raised by the checker layer on top of the HTTP client.
#[derive(Error, Debug)]
pub enum CheckerError {
    /// Not a failure: the account holds too little to be worth expanding.
    #[error("total balance {balance} is at or below minimum {min}")]
    BelowThreshold { balance: f64, min: f64 },

    #[error("no chains found")]
    NoChains,

    #[error("endpoint {key} not found")]
    EndpointNotFound { key: String },

    #[error("payload carries no address (expected 'id' or 'user_addr')")]
    MissingAddress,

    #[error("invalid address: '{0}'")]
    InvalidAddress(String),

    #[error("signer error: {0}")]
    Signer(String),

    #[error(transparent)]
    Http(#[from] HttpError),
}

impl CheckerError {
    pub fn is_below_threshold(&self) -> bool {
        matches!(self, CheckerError::BelowThreshold { .. })
    }
}
