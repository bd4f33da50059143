//! Error kinds surfaced by the core (see spec §7).
//!
//! Domain errors flow back to callers unchanged; infrastructure errors
//! (repository, cache, queue, executor) are wrapped into `CoreError::Internal`
//! or mapped onto the closest domain kind (e.g. a unique-violation from the
//! repository becomes `Conflict`). Cache-write and broadcast failures never
//! reach this type at all — they are logged and swallowed at the call site.

use crate::utils::validation::{FieldError, ValidationErrors};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum CoreError {
    /// malformed input
    #[error("validation error: {0:?}")]
    Validation(#[from] ValidationErrors),

    /// single field validation error
    #[error("field validation error: {0}")]
    Field(#[from] FieldError),

    /// referenced entity absent
    #[error("not found: {0}")]
    NotFound(String),

    /// state transition or lock rejected
    #[error("conflict: {0}")]
    Conflict(String),

    /// tournament has reached max_participants
    #[error("tournament is full")]
    TournamentFull,

    /// tournament is no longer pending
    #[error("tournament already started")]
    TournamentStarted,

    /// actor is not permitted to perform this operation
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// unexpected repository/cache/queue/executor failure
    #[error("internal error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::Conflict(_) | CoreError::TournamentFull | CoreError::TournamentStarted)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound(_))
    }

    pub fn get_field_error(&self) -> Option<&FieldError> {
        match self {
            CoreError::Field(field_error) => Some(field_error),
            _ => None,
        }
    }

    /// Exit code for the admin CLI surface (spec §6).
    pub fn cli_exit_code(&self) -> i32 {
        match self {
            CoreError::Validation(_) | CoreError::Field(_) => 2,
            CoreError::Conflict(_) | CoreError::TournamentFull | CoreError::TournamentStarted => 3,
            CoreError::NotFound(_) => 4,
            CoreError::Forbidden(_) => 4,
            CoreError::Internal(_) => 1,
        }
    }
}
