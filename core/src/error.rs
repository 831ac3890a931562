use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChasingError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Lock '{name}' is held by another run")]
    LockUnavailable { name: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ChasingResult<T> = Result<T, ChasingError>;
