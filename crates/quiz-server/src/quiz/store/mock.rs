use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use super::{QuizStore, QuizTx};
use crate::quiz::{NewQuiz, Quiz, Step, StoreError};

/// In-memory quiz store, used by tests and by `STORE_BACKEND=memory`.
///
/// Committed state is an immutable snapshot swapped under a lock, so readers
/// never see a transaction half-applied. Transactions serialize on an async
/// writer mutex and work on a private copy of the snapshot.
///
/// Failures can be injected per [`Step`] with [`InMemoryQuizStore::fail_once`].
#[derive(Clone, Default)]
pub struct InMemoryQuizStore {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    committed: RwLock<Arc<Vec<Quiz>>>,
    writer: Arc<tokio::sync::Mutex<()>>,
    failures: Mutex<HashSet<Step>>,
    unavailable: AtomicBool,
    commits: AtomicUsize,
}

impl Shared {
    fn snapshot(&self) -> Arc<Vec<Quiz>> {
        Arc::clone(&self.committed.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn check(&self, step: Step) -> Result<(), StoreError> {
        let injected = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&step);
        if injected {
            return Err(StoreError::Backend(format!("injected {step} failure")));
        }
        Ok(())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("store unavailable".to_string()));
        }
        Ok(())
    }
}

impl InMemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next operation performed at `step` fail with a backend error.
    pub fn fail_once(&self, step: Step) {
        self.shared
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(step);
    }

    /// Simulate an outage: reads, `begin` and `ping` fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Number of transactions committed so far.
    pub fn commit_count(&self) -> usize {
        self.shared.commits.load(Ordering::Relaxed)
    }
}

fn sorted(records: &[Quiz]) -> Vec<Quiz> {
    let mut out = records.to_vec();
    out.sort_by_key(|q| q.display_order);
    out
}

fn find(records: &[Quiz], id: Uuid) -> Result<Quiz, StoreError> {
    records
        .iter()
        .find(|q| q.id == id)
        .cloned()
        .ok_or(StoreError::NotFound)
}

fn max_order(records: &[Quiz]) -> i32 {
    records.iter().map(|q| q.display_order).max().unwrap_or(0)
}

#[async_trait::async_trait]
impl QuizStore for InMemoryQuizStore {
    async fn list_all(&self) -> Result<Vec<Quiz>, StoreError> {
        self.shared.check_available()?;
        self.shared.check(Step::List)?;
        Ok(sorted(&self.shared.snapshot()))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Quiz, StoreError> {
        self.shared.check_available()?;
        self.shared.check(Step::Lookup)?;
        find(&self.shared.snapshot(), id)
    }

    async fn max_order(&self) -> Result<i32, StoreError> {
        self.shared.check_available()?;
        self.shared.check(Step::MaxOrder)?;
        Ok(max_order(&self.shared.snapshot()))
    }

    async fn begin(&self) -> Result<Box<dyn QuizTx>, StoreError> {
        self.shared.check_available()?;
        self.shared.check(Step::Begin)?;
        let permit = Arc::clone(&self.shared.writer).lock_owned().await;
        let working = self.shared.snapshot().as_ref().clone();
        Ok(Box::new(InMemoryQuizTx {
            shared: Arc::clone(&self.shared),
            working,
            _permit: permit,
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.shared.check_available()
    }
}

/// Transaction over a private copy of the committed records.
pub struct InMemoryQuizTx {
    shared: Arc<Shared>,
    working: Vec<Quiz>,
    _permit: OwnedMutexGuard<()>,
}

#[async_trait::async_trait]
impl QuizTx for InMemoryQuizTx {
    async fn get_by_id(&mut self, id: Uuid) -> Result<Quiz, StoreError> {
        self.shared.check(Step::Lookup)?;
        find(&self.working, id)
    }

    async fn max_order(&mut self) -> Result<i32, StoreError> {
        self.shared.check(Step::MaxOrder)?;
        Ok(max_order(&self.working))
    }

    async fn create(&mut self, quiz: &NewQuiz, order: i32) -> Result<Quiz, StoreError> {
        self.shared.check(Step::Insert)?;
        if self.working.iter().any(|q| q.display_order == order) {
            return Err(StoreError::Conflict(format!(
                "display_order {order} is already taken"
            )));
        }
        if self.working.iter().any(|q| q.id == quiz.id) {
            return Err(StoreError::Conflict(format!("id {} already exists", quiz.id)));
        }
        let now = Utc::now();
        let record = Quiz {
            id: quiz.id,
            question: quiz.question.clone(),
            choice1: quiz.choice1.clone(),
            choice2: quiz.choice2.clone(),
            choice3: quiz.choice3.clone(),
            choice4: quiz.choice4.clone(),
            display_order: order,
            created_at: now,
            updated_at: now,
        };
        self.working.push(record.clone());
        Ok(record)
    }

    async fn delete(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.shared.check(Step::Delete)?;
        let before = self.working.len();
        self.working.retain(|q| q.id != id);
        if self.working.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn decrement_orders_above(&mut self, threshold: i32) -> Result<u64, StoreError> {
        self.shared.check(Step::Renumber)?;
        let now = Utc::now();
        let mut moved = 0;
        for quiz in self.working.iter_mut().filter(|q| q.display_order > threshold) {
            quiz.display_order -= 1;
            quiz.updated_at = now;
            moved += 1;
        }
        Ok(moved)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.shared.check(Step::Commit)?;
        let Self {
            shared, working, ..
        } = *self;
        *shared
            .committed
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(working);
        shared.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
