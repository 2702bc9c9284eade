use std::sync::Arc;

use uuid::Uuid;

use super::store::QuizStore;
use super::{CreateQuizRequest, Quiz, QuizError, Step};

/// Business rules for quizzes: validation, order assignment and renumbering.
///
/// Every mutation runs inside one store transaction, so concurrent creates
/// never share an order and a failed renumber never leaves a gap behind.
#[derive(Clone)]
pub struct QuizService {
    store: Arc<dyn QuizStore>,
}

impl QuizService {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn QuizStore {
        self.store.as_ref()
    }

    /// All quizzes in display order.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Internal`] if the store cannot be read.
    pub async fn list(&self) -> Result<Vec<Quiz>, QuizError> {
        self.store.list_all().await.map_err(QuizError::at(Step::List))
    }

    /// Look up a single quiz. Ids that are not UUIDs cannot exist, so they are
    /// reported as not found.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::NotFound`] for unknown ids.
    pub async fn get(&self, id: &str) -> Result<Quiz, QuizError> {
        let id = parse_id(id)?;
        self.store
            .get_by_id(id)
            .await
            .map_err(QuizError::at(Step::Lookup))
    }

    /// Validate and append a quiz at the end of the order.
    ///
    /// Reading the current maximum and inserting happen in the same
    /// transaction, which holds the collection's writer lock.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::InvalidInput`] before touching the store if any
    /// field is blank, [`QuizError::Conflict`] if the order is taken, and
    /// [`QuizError::Internal`] for storage failures.
    pub async fn create(&self, request: &CreateQuizRequest) -> Result<Quiz, QuizError> {
        let new_quiz = request.validate()?;

        let mut tx = self.store.begin().await.map_err(QuizError::at(Step::Begin))?;
        let max = tx.max_order().await.map_err(QuizError::at(Step::MaxOrder))?;
        let order = max
            .checked_add(1)
            .ok_or_else(|| QuizError::Conflict("display order space exhausted".to_string()))?;
        let quiz = tx
            .create(&new_quiz, order)
            .await
            .map_err(QuizError::at(Step::Insert))?;
        tx.commit().await.map_err(QuizError::at(Step::Commit))?;

        tracing::info!(quiz_id = %quiz.id, display_order = quiz.display_order, "quiz created");
        Ok(quiz)
    }

    /// Delete a quiz and close the gap it leaves in the order.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::NotFound`] for unknown ids. A failed renumber is
    /// [`QuizError::Internal`] with [`Step::Renumber`]
    /// (see [`QuizError::is_renumber_failure`]); the delete is rolled back
    /// with it.
    pub async fn delete(&self, id: &str) -> Result<(), QuizError> {
        let id = parse_id(id)?;

        let mut tx = self.store.begin().await.map_err(QuizError::at(Step::Begin))?;
        let quiz = tx
            .get_by_id(id)
            .await
            .map_err(QuizError::at(Step::Lookup))?;
        tx.delete(id).await.map_err(QuizError::at(Step::Delete))?;
        let shifted = match tx.decrement_orders_above(quiz.display_order).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(
                    quiz_id = %id,
                    display_order = quiz.display_order,
                    "renumber after delete failed, rolling back: {e}"
                );
                return Err(QuizError::from_store(Step::Renumber, e));
            }
        };
        tx.commit().await.map_err(QuizError::at(Step::Commit))?;

        tracing::info!(
            quiz_id = %id,
            display_order = quiz.display_order,
            shifted,
            "quiz deleted"
        );
        Ok(())
    }
}

fn parse_id(raw: &str) -> Result<Uuid, QuizError> {
    Uuid::parse_str(raw.trim()).map_err(|_| QuizError::NotFound)
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss
    )]

    use std::collections::BTreeSet;

    use super::*;
    use crate::quiz::store::mock::InMemoryQuizStore;

    fn service() -> (QuizService, InMemoryQuizStore) {
        let store = InMemoryQuizStore::new();
        (QuizService::new(Arc::new(store.clone())), store)
    }

    fn request(question: &str) -> CreateQuizRequest {
        CreateQuizRequest {
            question: question.to_string(),
            choice1: "A".to_string(),
            choice2: "B".to_string(),
            choice3: "C".to_string(),
            choice4: "D".to_string(),
        }
    }

    async fn orders(svc: &QuizService) -> Vec<i32> {
        svc.list()
            .await
            .unwrap()
            .iter()
            .map(|q| q.display_order)
            .collect()
    }

    /// Orders are exactly 1..=N in listing order.
    async fn assert_dense(svc: &QuizService) {
        let got = orders(svc).await;
        let expected: Vec<i32> = (1..=got.len() as i32).collect();
        assert_eq!(got, expected, "display orders must be dense");
    }

    // ── create ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn first_quiz_gets_order_one() {
        let (svc, _) = service();
        let quiz = svc.create(&request("What is 1+1?")).await.unwrap();
        assert_eq!(quiz.display_order, 1);
        assert_eq!(quiz.question, "What is 1+1?");
        assert_eq!(quiz.created_at, quiz.updated_at);
    }

    #[tokio::test]
    async fn create_appends_after_current_max() {
        let (svc, _) = service();
        for i in 0..3 {
            svc.create(&request(&format!("Q{i}"))).await.unwrap();
        }
        let quiz = svc.create(&request("X + 2 = 4")).await.unwrap();
        assert_eq!(quiz.display_order, 4);
    }

    #[tokio::test]
    async fn create_stores_trimmed_fields() {
        let (svc, _) = service();
        let mut req = request("  spaced  ");
        req.choice3 = "\tC\n".to_string();
        let quiz = svc.create(&req).await.unwrap();
        let stored = svc.get(&quiz.id.to_string()).await.unwrap();
        assert_eq!(stored.question, "spaced");
        assert_eq!(stored.choice3, "C");
    }

    #[tokio::test]
    async fn invalid_create_leaves_store_untouched() {
        let (svc, store) = service();
        svc.create(&request("keep me")).await.unwrap();
        let before = svc.list().await.unwrap();

        let mut req = request("Q");
        req.choice2 = "   ".to_string();
        let err = svc.create(&req).await.unwrap_err();
        assert!(matches!(err, QuizError::InvalidInput(_)));

        let err = svc.create(&request("")).await.unwrap_err();
        assert!(matches!(err, QuizError::InvalidInput(_)));

        assert_eq!(svc.list().await.unwrap(), before);
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn create_insert_failure_is_internal_and_persists_nothing() {
        let (svc, store) = service();
        store.fail_once(Step::Insert);
        let err = svc.create(&request("Q")).await.unwrap_err();
        assert_eq!(err.step(), Some(Step::Insert));
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_max_order_failure_is_internal() {
        let (svc, store) = service();
        store.fail_once(Step::MaxOrder);
        let err = svc.create(&request("Q")).await.unwrap_err();
        assert_eq!(err.step(), Some(Step::MaxOrder));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_never_share_an_order() {
        let (svc, _) = service();
        let mut handles = Vec::new();
        for i in 0..32 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.create(&request(&format!("Q{i}"))).await.unwrap()
            }));
        }
        let mut assigned = BTreeSet::new();
        for h in handles {
            assert!(assigned.insert(h.await.unwrap().display_order));
        }
        assert_eq!(assigned, (1..=32).collect::<BTreeSet<i32>>());
        assert_dense(&svc).await;
    }

    // ── list / get ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn list_on_empty_store_is_empty() {
        let (svc, _) = service();
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_idempotent() {
        let (svc, _) = service();
        for i in 0..5 {
            svc.create(&request(&format!("Q{i}"))).await.unwrap();
        }
        let first = svc.list().await.unwrap();
        let second = svc.list().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn list_failure_is_internal() {
        let (svc, store) = service();
        store.fail_once(Step::List);
        let err = svc.list().await.unwrap_err();
        assert_eq!(err.step(), Some(Step::List));
    }

    #[tokio::test]
    async fn get_unknown_or_malformed_id_is_not_found() {
        let (svc, _) = service();
        let err = svc.get(&Uuid::new_v4().to_string()).await.unwrap_err();
        assert!(matches!(err, QuizError::NotFound));
        let err = svc.get("not-a-uuid").await.unwrap_err();
        assert!(matches!(err, QuizError::NotFound));
    }

    // ── delete ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn deleting_middle_renumbers_the_tail() {
        let (svc, _) = service();
        let q1 = svc.create(&request("Q1")).await.unwrap();
        let q2 = svc.create(&request("Q2")).await.unwrap();
        let q3 = svc.create(&request("Q3")).await.unwrap();

        svc.delete(&q2.id.to_string()).await.unwrap();

        let listed = svc.list().await.unwrap();
        let pairs: Vec<(Uuid, i32)> = listed.iter().map(|q| (q.id, q.display_order)).collect();
        assert_eq!(pairs, vec![(q1.id, 1), (q3.id, 2)]);
        assert!(listed[1].updated_at >= q3.updated_at);
    }

    #[tokio::test]
    async fn deleting_first_shifts_everything_down() {
        let (svc, _) = service();
        let q1 = svc.create(&request("Q1")).await.unwrap();
        let q2 = svc.create(&request("Q2")).await.unwrap();
        let q3 = svc.create(&request("Q3")).await.unwrap();

        svc.delete(&q1.id.to_string()).await.unwrap();

        let pairs: Vec<(Uuid, i32)> = svc
            .list()
            .await
            .unwrap()
            .iter()
            .map(|q| (q.id, q.display_order))
            .collect();
        assert_eq!(pairs, vec![(q2.id, 1), (q3.id, 2)]);
    }

    #[tokio::test]
    async fn deleting_last_leaves_others_alone() {
        let (svc, _) = service();
        let q1 = svc.create(&request("Q1")).await.unwrap();
        let q2 = svc.create(&request("Q2")).await.unwrap();

        svc.delete(&q2.id.to_string()).await.unwrap();

        let listed = svc.list().await.unwrap();
        assert_eq!(listed, vec![q1]);
    }

    #[tokio::test]
    async fn create_after_delete_reuses_freed_tail_order() {
        let (svc, _) = service();
        let q1 = svc.create(&request("Q1")).await.unwrap();
        svc.create(&request("Q2")).await.unwrap();
        svc.delete(&q1.id.to_string()).await.unwrap();
        let q3 = svc.create(&request("Q3")).await.unwrap();
        assert_eq!(q3.display_order, 2);
        assert_dense(&svc).await;
    }

    #[tokio::test]
    async fn delete_unknown_id_is_not_found_and_changes_nothing() {
        let (svc, store) = service();
        svc.create(&request("Q1")).await.unwrap();
        let before = svc.list().await.unwrap();

        let err = svc.delete(&Uuid::new_v4().to_string()).await.unwrap_err();
        assert!(matches!(err, QuizError::NotFound));
        let err = svc.delete("garbage").await.unwrap_err();
        assert!(matches!(err, QuizError::NotFound));

        assert_eq!(svc.list().await.unwrap(), before);
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn renumber_failure_is_distinguishable_and_rolled_back() {
        let (svc, store) = service();
        let q1 = svc.create(&request("Q1")).await.unwrap();
        svc.create(&request("Q2")).await.unwrap();
        let before = svc.list().await.unwrap();

        store.fail_once(Step::Renumber);
        let err = svc.delete(&q1.id.to_string()).await.unwrap_err();

        assert!(err.is_renumber_failure());
        assert!(!matches!(err, QuizError::NotFound));
        assert_eq!(svc.list().await.unwrap(), before, "delete must be rolled back");
    }

    #[tokio::test]
    async fn delete_step_failure_is_not_a_renumber_failure() {
        let (svc, store) = service();
        let q1 = svc.create(&request("Q1")).await.unwrap();
        store.fail_once(Step::Delete);
        let err = svc.delete(&q1.id.to_string()).await.unwrap_err();
        assert_eq!(err.step(), Some(Step::Delete));
        assert!(!err.is_renumber_failure());
        assert_eq!(svc.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commit_failure_on_delete_keeps_sequence_intact() {
        let (svc, store) = service();
        let q1 = svc.create(&request("Q1")).await.unwrap();
        svc.create(&request("Q2")).await.unwrap();
        store.fail_once(Step::Commit);
        let err = svc.delete(&q1.id.to_string()).await.unwrap_err();
        assert_eq!(err.step(), Some(Step::Commit));
        assert_eq!(orders(&svc).await, vec![1, 2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deletes_keep_orders_dense() {
        let (svc, _) = service();
        let mut ids = Vec::new();
        for i in 0..20 {
            ids.push(svc.create(&request(&format!("Q{i}"))).await.unwrap().id);
        }
        let mut handles = Vec::new();
        for id in ids.iter().step_by(2).copied() {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move { svc.delete(&id.to_string()).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let listed = svc.list().await.unwrap();
        assert_eq!(listed.len(), 10);
        let survivors: Vec<Uuid> = listed.iter().map(|q| q.id).collect();
        let expected: Vec<Uuid> = ids.iter().skip(1).step_by(2).copied().collect();
        assert_eq!(survivors, expected, "relative order must be preserved");
        assert_dense(&svc).await;
    }

    // ── invariant over random histories ─────────────────────────────────

    #[tokio::test]
    async fn random_histories_keep_orders_dense() {
        for _round in 0..20 {
            let (svc, _) = service();
            let mut live: Vec<Uuid> = Vec::new();
            for step in 0..60 {
                let delete = !live.is_empty() && rand::random::<u8>() % 3 == 0;
                if delete {
                    let idx = rand::random::<u32>() as usize % live.len();
                    let id = live.remove(idx);
                    svc.delete(&id.to_string()).await.unwrap();
                } else {
                    let quiz = svc.create(&request(&format!("step {step}"))).await.unwrap();
                    assert_eq!(quiz.display_order as usize, live.len() + 1);
                    live.push(quiz.id);
                }
                let listed = svc.list().await.unwrap();
                let ids: Vec<Uuid> = listed.iter().map(|q| q.id).collect();
                assert_eq!(ids, live, "listing must follow insertion order of survivors");
                assert_dense(&svc).await;
            }
        }
    }
}
