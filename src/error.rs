//! Error kinds shared by the lifecycle, ledger and store layers.

use thiserror::Error;

use crate::bounty::{BountyAction, BountyStatus};

pub type Result<T> = std::result::Result<T, BountyError>;

#[derive(Debug, Error)]
pub enum BountyError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Cannot {action} a bounty that is {status}")]
    InvalidTransition {
        action: BountyAction,
        status: BountyStatus,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bounty {0} has already been claimed")]
    AlreadyClaimed(i64),

    #[error("Bounty {0} is already completed")]
    AlreadyCompleted(i64),

    #[error("Version conflict on {entity} {id}")]
    Conflict { entity: &'static str, id: String },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Content store error: {0}")]
    Content(String),
}

impl BountyError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl ToString) -> Self {
        Self::Conflict {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for BountyError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::not_found("row", "query returned no rows"),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // serialization_failure, deadlock_detected, unique_violation
                Some("40001") | Some("40P01") | Some("23505") => Self::Conflict {
                    entity: "row",
                    id: db.message().to_string(),
                },
                _ => Self::StoreUnavailable(err.to_string()),
            },
            _ => Self::StoreUnavailable(err.to_string()),
        }
    }
}
