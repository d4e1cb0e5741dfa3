use thiserror::Error;

use crate::models::{Month, ReceiptStatus};

#[derive(Error, Debug)]
pub enum HoaError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("A rate change already exists for {0}")]
    DuplicateRateDate(Month),

    #[error("The initial rate ({0}) cannot be deleted")]
    CannotDeleteInitialRate(Month),

    #[error("No rate change exists for {0}")]
    RateNotFound(Month),

    #[error("End month {end} is before start month {start}")]
    InvalidMonthRange { start: Month, end: Month },

    #[error("Invalid month '{0}' (expected YYYY-MM)")]
    InvalidMonth(String),

    #[error("Receipt is already {0}; it cannot advance further")]
    InvalidTransition(ReceiptStatus),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database schema version {found} is newer than this build supports ({supported})")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl HoaError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        HoaError::NotFound { entity, id }
    }
}

pub type Result<T> = std::result::Result<T, HoaError>;
