use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{QuizStore, QuizTx};
use crate::quiz::{NewQuiz, Quiz, StoreError};

const LIST_SQL: &str = "SELECT id, question, choice1, choice2, choice3, choice4, display_order, created_at, updated_at
     FROM quizzes ORDER BY display_order ASC";

const GET_SQL: &str = "SELECT id, question, choice1, choice2, choice3, choice4, display_order, created_at, updated_at
     FROM quizzes WHERE id = $1";

const MAX_ORDER_SQL: &str = "SELECT COALESCE(MAX(display_order), 0) FROM quizzes";

// Inserts nothing (and returns no row) when the order is already taken.
const INSERT_SQL: &str = "INSERT INTO quizzes
        (id, question, choice1, choice2, choice3, choice4, display_order, created_at, updated_at)
     SELECT $1, $2, $3, $4, $5, $6, $7, NOW(), NOW()
     WHERE NOT EXISTS (SELECT 1 FROM quizzes WHERE display_order = $7)
     RETURNING id, question, choice1, choice2, choice3, choice4, display_order, created_at, updated_at";

const DELETE_SQL: &str = "DELETE FROM quizzes WHERE id = $1";

const DECREMENT_SQL: &str = "UPDATE quizzes
     SET display_order = display_order - 1, updated_at = NOW()
     WHERE display_order > $1";

// Touching the table (rather than SELECT 1) fails until the schema exists,
// however it was applied.
const PING_SQL: &str = "SELECT 1 FROM quizzes LIMIT 1";

// EXCLUSIVE conflicts with every writer lock but not with ACCESS SHARE, so
// concurrent mutations queue up while plain SELECTs keep running against the
// last committed snapshot.
const LOCK_SQL: &str = "LOCK TABLE quizzes IN EXCLUSIVE MODE";

/// PostgreSQL-backed quiz store.
#[derive(Clone)]
pub struct PgQuizStore {
    pool: PgPool,
}

impl PgQuizStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QuizStore for PgQuizStore {
    async fn list_all(&self) -> Result<Vec<Quiz>, StoreError> {
        let quizzes = sqlx::query_as::<_, Quiz>(LIST_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(quizzes)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Quiz, StoreError> {
        sqlx::query_as::<_, Quiz>(GET_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn max_order(&self) -> Result<i32, StoreError> {
        let max = sqlx::query_scalar::<_, i32>(MAX_ORDER_SQL)
            .fetch_one(&self.pool)
            .await?;
        Ok(max)
    }

    async fn begin(&self) -> Result<Box<dyn QuizTx>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(LOCK_SQL).execute(&mut *tx).await?;
        Ok(Box::new(PgQuizTx { tx }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query(PING_SQL).fetch_optional(&self.pool).await?;
        Ok(())
    }
}

/// An open PostgreSQL transaction holding the collection's writer lock.
///
/// Dropping it without committing rolls back (sqlx issues the ROLLBACK when
/// the connection returns to the pool).
pub struct PgQuizTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl QuizTx for PgQuizTx {
    async fn get_by_id(&mut self, id: Uuid) -> Result<Quiz, StoreError> {
        sqlx::query_as::<_, Quiz>(GET_SQL)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn max_order(&mut self) -> Result<i32, StoreError> {
        let max = sqlx::query_scalar::<_, i32>(MAX_ORDER_SQL)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(max)
    }

    async fn create(&mut self, quiz: &NewQuiz, order: i32) -> Result<Quiz, StoreError> {
        sqlx::query_as::<_, Quiz>(INSERT_SQL)
            .bind(quiz.id)
            .bind(&quiz.question)
            .bind(&quiz.choice1)
            .bind(&quiz.choice2)
            .bind(&quiz.choice3)
            .bind(&quiz.choice4)
            .bind(order)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| StoreError::Conflict(format!("display_order {order} is already taken")))
    }

    async fn delete(&mut self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(DELETE_SQL)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn decrement_orders_above(&mut self, threshold: i32) -> Result<u64, StoreError> {
        let result = sqlx::query(DECREMENT_SQL)
            .bind(threshold)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
