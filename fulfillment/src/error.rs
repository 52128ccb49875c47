use crate::model::ModelId;
use thiserror::Error;

/// Tagged error taxonomy for the fulfillment workflows. Variants map to user
/// messages and HTTP statuses only at the API boundary.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("no stock available for product {product_id}")]
    StockExhausted { product_id: ModelId },

    #[error("insufficient points: need {needed}, have {available}")]
    InsufficientPoints { needed: i64, available: i64 },

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
