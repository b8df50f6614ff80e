//! Reputation ledger
//!
//! Every score change is a locked read-modify-write of the user's row, so
//! concurrent updates for the same user serialize and none is lost.

use std::sync::Arc;
use tracing::debug;

use crate::database::{Store, StoreTransaction};
use crate::error::{BountyError, Result};
use crate::identity::canonical_address;
use crate::reputation::Reputation;

/// Default points for a completed bounty
pub const DEFAULT_COMPLETION_POINTS: i64 = 50;

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Add `points` to the user's score in its own transaction.
    pub async fn update_score(&self, user_id: &str, points: i64) -> Result<Reputation> {
        let user_id = canonical_address(user_id)?;
        let mut tx = self.store.begin().await?;
        let reputation = self.apply(tx.as_mut(), &user_id, points).await?;
        tx.commit().await?;
        Ok(reputation)
    }

    /// Add `points` inside a transaction the caller owns and commits.
    /// `user_id` must already be canonical.
    pub async fn apply(
        &self,
        tx: &mut dyn StoreTransaction,
        user_id: &str,
        points: i64,
    ) -> Result<Reputation> {
        tx.ensure_user(user_id).await?;
        let current = tx.lock_reputation(user_id).await?;
        let next = current.with_points(points).ok_or_else(|| {
            BountyError::validation(format!(
                "score overflow for {user_id}: {} + {points}",
                current.score
            ))
        })?;
        tx.save_reputation(&next).await?;

        debug!(
            user_id = %user_id,
            points,
            score = next.score,
            level = next.level,
            "Reputation updated"
        );
        Ok(next)
    }

    /// Reputation with badges; users seen for the first time get a zero
    /// record.
    pub async fn get_reputation(&self, user_id: &str) -> Result<Reputation> {
        let user_id = canonical_address(user_id)?;
        if let Some(reputation) = self.store.get_reputation(&user_id).await? {
            return Ok(reputation);
        }

        let mut tx = self.store.begin().await?;
        tx.ensure_user(&user_id).await?;
        let reputation = tx.lock_reputation(&user_id).await?;
        tx.commit().await?;
        Ok(reputation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    const USER: &str = "0x4444444444444444444444444444444444444444";

    #[tokio::test]
    async fn test_update_score_creates_record() {
        let ledger = Ledger::new(Arc::new(MemoryStore::new()));
        let reputation = ledger.update_score(USER, 150).await.unwrap();
        assert_eq!(reputation.score, 150);
        assert_eq!(reputation.level, 1);

        let reputation = ledger.update_score(USER, 50).await.unwrap();
        assert_eq!(reputation.score, 200);
        assert_eq!(reputation.level, 2);
    }

    #[tokio::test]
    async fn test_update_score_canonicalizes() {
        let ledger = Ledger::new(Arc::new(MemoryStore::new()));
        ledger.update_score(&USER[2..], 10).await.unwrap();
        assert_eq!(ledger.get_reputation(USER).await.unwrap().score, 10);
    }

    #[tokio::test]
    async fn test_overflow_is_validation_and_not_persisted() {
        let ledger = Ledger::new(Arc::new(MemoryStore::new()));
        ledger.update_score(USER, i64::MAX).await.unwrap();
        let err = ledger.update_score(USER, 1).await.unwrap_err();
        assert!(matches!(err, BountyError::Validation(_)));
        assert_eq!(ledger.get_reputation(USER).await.unwrap().score, i64::MAX);
    }

    #[tokio::test]
    async fn test_get_reputation_provisions() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::new(store.clone());
        let reputation = ledger.get_reputation(USER).await.unwrap();
        assert_eq!(reputation.score, 0);
        assert_eq!(reputation.level, 1);
        assert!(store.get_user(USER).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_user_rejected() {
        let ledger = Ledger::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            ledger.update_score("nobody", 5).await,
            Err(BountyError::Validation(_))
        ));
    }
}
