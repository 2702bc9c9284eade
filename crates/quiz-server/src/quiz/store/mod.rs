// Public: the binary selects it with `STORE_BACKEND=memory` and integration
// test binaries build routers on top of it.
pub mod mock;
pub mod pg;

use uuid::Uuid;

use super::{NewQuiz, Quiz, StoreError};

/// Read access to the quiz collection plus the entry point for mutations.
///
/// Reads outside a transaction only ever observe committed state. Every
/// mutation goes through a [`QuizTx`] obtained from [`QuizStore::begin`];
/// backends guarantee that at most one transaction mutates the collection at
/// a time.
#[async_trait::async_trait]
pub trait QuizStore: Send + Sync {
    /// All live quizzes, ascending by `display_order`. Empty when there are none.
    async fn list_all(&self) -> Result<Vec<Quiz>, StoreError>;

    /// Returns [`StoreError::NotFound`] if no live quiz has this id.
    async fn get_by_id(&self, id: Uuid) -> Result<Quiz, StoreError>;

    /// Highest `display_order` in use, or `0` for an empty collection.
    async fn max_order(&self) -> Result<i32, StoreError>;

    /// Open a transaction. Waits for any other open transaction to finish.
    async fn begin(&self) -> Result<Box<dyn QuizTx>, StoreError>;

    /// Cheap connectivity probe used by the readiness endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// A single all-or-nothing unit of work over the quiz collection.
///
/// Nothing done through a transaction is visible to readers until
/// [`QuizTx::commit`] succeeds. Dropping the handle without committing rolls
/// everything back.
#[async_trait::async_trait]
pub trait QuizTx: Send {
    async fn get_by_id(&mut self, id: Uuid) -> Result<Quiz, StoreError>;

    async fn max_order(&mut self) -> Result<i32, StoreError>;

    /// Insert `quiz` at `order`. Fails with [`StoreError::Conflict`] if the
    /// order is already taken.
    async fn create(&mut self, quiz: &NewQuiz, order: i32) -> Result<Quiz, StoreError>;

    /// Returns [`StoreError::NotFound`] if no live quiz has this id.
    async fn delete(&mut self, id: Uuid) -> Result<(), StoreError>;

    /// Shift every quiz with `display_order > threshold` down by one and
    /// refresh its `updated_at`. Returns the number of quizzes moved.
    async fn decrement_orders_above(&mut self, threshold: i32) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
