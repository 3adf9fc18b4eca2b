use carelink_ids::IdError;
use carelink_types::ValueError;

/// Failure taxonomy shared by every core operation.
///
/// The first four variants are the workflow outcomes callers are expected to branch on; the
/// rest are infrastructure failures.
#[derive(Debug, thiserror::Error)]
pub enum CareError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("state conflict: {0}")]
    StateConflict(String),
    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
    #[error("invalid value: {0}")]
    InvalidValue(#[from] ValueError),
    #[error("failed to persist store snapshot: {0}")]
    Persistence(#[from] std::io::Error),
    #[error("failed to (de)serialise store snapshot: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("entity store is unavailable (lock poisoned)")]
    StoreUnavailable,
}

impl CareError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        CareError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        CareError::Permission(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CareError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        CareError::StateConflict(msg.into())
    }
}

pub type CareResult<T> = std::result::Result<T, CareError>;
