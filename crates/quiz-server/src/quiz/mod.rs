//! Quiz questions kept in a dense, gap-free display order.
//!
//! Every live quiz has a `display_order` in `1..=N` where `N` is the number of
//! live quizzes. New quizzes are appended at `N + 1`; deleting the quiz at `k`
//! shifts every quiz above `k` down by one. [`QuizService`] composes the store
//! operations that maintain this inside a single transaction.

pub mod error;
pub mod service;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use error::{QuizError, Step, StoreError};
pub use service::QuizService;

/// A persisted quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Quiz {
    pub id: Uuid,
    pub question: String,
    pub choice1: String,
    pub choice2: String,
    pub choice3: String,
    pub choice4: String,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inbound payload for creating a quiz.
///
/// Missing fields deserialize as empty strings so they fail validation with
/// the same error as blank ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateQuizRequest {
    pub question: String,
    pub choice1: String,
    pub choice2: String,
    pub choice3: String,
    pub choice4: String,
}

/// A validated, trimmed quiz that has not been assigned an order yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuiz {
    pub id: Uuid,
    pub question: String,
    pub choice1: String,
    pub choice2: String,
    pub choice3: String,
    pub choice4: String,
}

pub const INVALID_QUIZ_MESSAGE: &str = "Question and all 4 choices are required";

impl CreateQuizRequest {
    /// Trim every field and reject the request if any of them ends up empty.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::InvalidInput`] when the question or any choice is
    /// empty or whitespace-only.
    pub fn validate(&self) -> Result<NewQuiz, QuizError> {
        let fields = [
            self.question.trim(),
            self.choice1.trim(),
            self.choice2.trim(),
            self.choice3.trim(),
            self.choice4.trim(),
        ];
        if fields.iter().any(|f| f.is_empty()) {
            return Err(QuizError::InvalidInput(INVALID_QUIZ_MESSAGE.to_string()));
        }
        let [question, choice1, choice2, choice3, choice4] = fields.map(str::to_string);
        Ok(NewQuiz {
            id: Uuid::new_v4(),
            question,
            choice1,
            choice2,
            choice3,
            choice4,
        })
    }
}
