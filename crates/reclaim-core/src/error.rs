use thiserror::Error;

/// Reclaim core errors.
///
/// Every engine operation fails fast with one of these kinds and rolls back
/// its enclosing transaction; no operation is retried automatically. The
/// calling layer owns the translation into user-visible responses.
#[derive(Debug, Error)]
pub enum ReclaimError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Posters may not claim their own found items")]
    SelfClaimForbidden,

    /// Declared for operations invoked against a state they do not guard.
    /// `resolve` and `submit` intentionally do not raise it today; see the
    /// claim engine docs before wiring it in.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for ReclaimError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl ReclaimError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }
}
