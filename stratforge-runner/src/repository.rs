//! In-memory strategy repository.
//!
//! Records live in a map keyed by id behind one async `RwLock`; every
//! compare-and-set runs under the write lock, so a transition is visible
//! completely or not at all. Data is lost when the process exits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use stratforge_core::domain::{LifecycleState, StrategyId};
use tokio::sync::RwLock;

use crate::ports::{PersistenceError, StrategyRepository};
use crate::record::{StageMetrics, StrategyRecord};

#[derive(Debug, Default)]
pub struct InMemoryStrategyRepository {
    records: RwLock<HashMap<StrategyId, StrategyRecord>>,
    /// Remaining calls that fail with `Unavailable`.
    injected_failures: AtomicU32,
}

impl InMemoryStrategyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` repository calls fail with `Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.injected_failures.store(n, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        let take = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match take {
            Ok(_) => Err(PersistenceError::Unavailable("injected failure".into())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl StrategyRepository for InMemoryStrategyRepository {
    async fn save(&self, record: StrategyRecord) -> Result<(), PersistenceError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let id = record.id().clone();
        if records.contains_key(&id) {
            return Err(PersistenceError::Duplicate(id));
        }
        records.insert(id, record);
        Ok(())
    }

    async fn load(&self, id: &StrategyId) -> Result<StrategyRecord, PersistenceError> {
        self.check_available()?;
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))
    }

    async fn list_by_state(
        &self,
        state: LifecycleState,
    ) -> Result<Vec<StrategyRecord>, PersistenceError> {
        self.check_available()?;
        let records = self.records.read().await;
        let mut out: Vec<StrategyRecord> =
            records.values().filter(|r| r.state == state).cloned().collect();
        out.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(out)
    }

    async fn list_all(&self) -> Result<Vec<StrategyRecord>, PersistenceError> {
        self.check_available()?;
        let mut out: Vec<StrategyRecord> = self.records.read().await.values().cloned().collect();
        out.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(out)
    }

    async fn update_state(
        &self,
        id: &StrategyId,
        expected: LifecycleState,
        state: LifecycleState,
        metrics: Option<StageMetrics>,
    ) -> Result<StrategyRecord, PersistenceError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))?;
        if record.state != expected {
            return Err(PersistenceError::Conflict {
                id: id.clone(),
                expected,
                actual: record.state,
            });
        }
        if !expected.can_transition_to(state) {
            return Err(PersistenceError::IllegalTransition {
                id: id.clone(),
                from: expected,
                to: state,
            });
        }
        record.apply(state, metrics);
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratforge_core::domain::RetireReason;
    use stratforge_core::{StrategyFactory, StrategyType};

    fn record(seed: u64) -> StrategyRecord {
        let mut factory = StrategyFactory::new(seed);
        let spec = factory
            .generate(&["BTCUSDT".to_string()], &StrategyType::ALL)
            .unwrap();
        StrategyRecord::new(spec)
    }

    #[tokio::test]
    async fn save_and_load() {
        let repo = InMemoryStrategyRepository::new();
        let r = record(1);
        repo.save(r.clone()).await.unwrap();
        assert_eq!(repo.load(r.id()).await.unwrap(), r);
        assert!(matches!(
            repo.save(r.clone()).await,
            Err(PersistenceError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn compare_and_set_rejects_stale_expectation() {
        let repo = InMemoryStrategyRepository::new();
        let r = record(2);
        let id = r.id().clone();
        repo.save(r).await.unwrap();

        repo.update_state(&id, LifecycleState::Generated, LifecycleState::QueuedBacktest, None)
            .await
            .unwrap();
        let err = repo
            .update_state(&id, LifecycleState::Generated, LifecycleState::QueuedBacktest, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict { .. }));

        let loaded = repo.load(&id).await.unwrap();
        assert_eq!(loaded.state, LifecycleState::QueuedBacktest);
        assert_eq!(loaded.history.len(), 1);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected_without_change() {
        let repo = InMemoryStrategyRepository::new();
        let r = record(3);
        let id = r.id().clone();
        repo.save(r).await.unwrap();

        let err = repo
            .update_state(&id, LifecycleState::Generated, LifecycleState::Live, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::IllegalTransition { .. }));
        assert_eq!(repo.load(&id).await.unwrap().state, LifecycleState::Generated);
    }

    #[tokio::test]
    async fn injected_failures_are_transient_and_counted() {
        let repo = InMemoryStrategyRepository::new();
        let r = record(4);
        repo.fail_next(2);
        assert!(repo.save(r.clone()).await.unwrap_err().is_transient());
        assert!(repo.save(r.clone()).await.unwrap_err().is_transient());
        repo.save(r).await.unwrap();
    }

    #[tokio::test]
    async fn counts_by_state_uses_display_form() {
        let repo = InMemoryStrategyRepository::new();
        let a = record(5);
        let id = a.id().clone();
        repo.save(a).await.unwrap();
        repo.save(record(6)).await.unwrap();
        repo.update_state(
            &id,
            LifecycleState::Generated,
            LifecycleState::Retired(RetireReason::Manual),
            None,
        )
        .await
        .unwrap();

        let counts = repo.counts_by_state().await.unwrap();
        assert_eq!(counts.get("generated"), Some(&1));
        assert_eq!(counts.get("retired(manual)"), Some(&1));
    }
}
