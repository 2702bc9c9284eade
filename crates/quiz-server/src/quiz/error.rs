use std::fmt;

use thiserror::Error;

/// The store operation a failure happened in.
///
/// Carried by [`QuizError::Internal`] so logs and tests can tell a failed
/// lookup from a failed delete or a failed renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Begin,
    List,
    Lookup,
    MaxOrder,
    Insert,
    Delete,
    Renumber,
    Commit,
}

impl Step {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::List => "list",
            Self::Lookup => "lookup",
            Self::MaxOrder => "max_order",
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Renumber => "renumber",
            Self::Commit => "commit",
        }
    }

    /// Client-facing summary of a failure at this step. Never includes
    /// storage details.
    pub const fn public_message(self) -> &'static str {
        match self {
            Self::Begin => "Failed to start transaction",
            Self::List => "Failed to fetch quizzes",
            Self::Lookup => "Failed to look up quiz",
            Self::MaxOrder => "Failed to get max display order",
            Self::Insert => "Failed to create quiz",
            Self::Delete => "Failed to delete quiz",
            Self::Renumber => "Failed to renumber quizzes",
            Self::Commit => "Failed to commit transaction",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a [`QuizStore`](super::store::QuizStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("constraint violation: {0}")]
    Conflict(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_string())
            }
            _ => Self::Backend(err.to_string()),
        }
    }
}

/// Error kinds surfaced by [`QuizService`](super::QuizService).
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("quiz not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{step} failed: {source}")]
    Internal {
        step: Step,
        #[source]
        source: StoreError,
    },
}

impl QuizError {
    /// Classify a store failure that happened during `step`.
    ///
    /// A missing row is `NotFound` only while looking up or deleting; a
    /// uniqueness violation is `Conflict` only while inserting or committing.
    /// Anything else, including a conflict raised by the renumber, is
    /// `Internal`.
    pub fn from_store(step: Step, err: StoreError) -> Self {
        match (step, err) {
            (Step::Lookup | Step::Delete, StoreError::NotFound) => Self::NotFound,
            (Step::Insert | Step::Commit, StoreError::Conflict(msg)) => Self::Conflict(msg),
            (step, source) => Self::Internal { step, source },
        }
    }

    /// Shorthand for `map_err(|e| QuizError::from_store(step, e))`.
    pub fn at(step: Step) -> impl FnOnce(StoreError) -> Self {
        move |err| Self::from_store(step, err)
    }

    /// The failing step, for internal errors.
    pub const fn step(&self) -> Option<Step> {
        match self {
            Self::Internal { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// True when a delete went through but shifting the remaining quizzes
    /// down failed, i.e. the order sequence would have been left with a gap.
    pub const fn is_renumber_failure(&self) -> bool {
        matches!(
            self,
            Self::Internal {
                step: Step::Renumber,
                ..
            }
        )
    }
}
