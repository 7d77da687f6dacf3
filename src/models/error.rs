use thiserror::Error;

/// Failure kinds surfaced by the store. Callers can always tell a missing
/// conversation apart from bad input or an unusable database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation {0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("conversation {0} already exists")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] tokio_rusqlite::Error),
}

impl StoreError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
