use thiserror::Error;

use models::errors::ModelError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("deserialization error: {0}")]
    Deserialization(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl ServiceError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 1001,
            ServiceError::Serialization(_) => 1101,
            ServiceError::Deserialization(_) => 1102,
            ServiceError::StoreUnavailable(_) => 1200,
            ServiceError::Cancelled(_) => 1300,
        }
    }

    /// Short label used as a metrics dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::Serialization(_) => "serialization",
            ServiceError::Deserialization(_) => "deserialization",
            ServiceError::StoreUnavailable(_) => "store_unavailable",
            ServiceError::Cancelled(_) => "cancelled",
        }
    }

    /// Only store outages are worth retrying; the service never retries itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::StoreUnavailable(_))
    }

    pub(crate) fn store(e: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<ModelError> for ServiceError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Validation(m) => ServiceError::Validation(m),
            ModelError::Encode(m) => ServiceError::Serialization(m),
            ModelError::Decode(m) => ServiceError::Deserialization(m),
            ModelError::Db(m) => ServiceError::StoreUnavailable(m),
        }
    }
}
