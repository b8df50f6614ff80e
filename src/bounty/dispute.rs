//! Arbiter-only dispute resolution

use std::sync::Arc;
use tracing::info;

use crate::bounty::lifecycle::{lock, Completion, LifecycleManager};
use crate::bounty::{BountyAction, SubmissionStatus};
use crate::error::{BountyError, Result};
use crate::identity::canonical_address;

/// Closes disputes on behalf of a single configured arbiter.
///
/// Resolution drives the `disputed -> completed` edge through the same
/// settlement path as a normal completion. The hunter is credited only when
/// the hunter wins; a creator win records the outcome and nothing else.
pub struct DisputeResolver {
    lifecycle: Arc<LifecycleManager>,
    arbiter: String,
}

impl DisputeResolver {
    pub fn new(lifecycle: Arc<LifecycleManager>, arbiter: &str) -> Result<Self> {
        Ok(Self {
            lifecycle,
            arbiter: canonical_address(arbiter)?,
        })
    }

    pub fn arbiter(&self) -> &str {
        &self.arbiter
    }

    pub async fn resolve(
        &self,
        actor: &str,
        bounty_id: i64,
        winner: &str,
        resolution: &str,
    ) -> Result<Completion> {
        let actor = canonical_address(actor)?;
        let winner = canonical_address(winner)?;

        let mut tx = self.lifecycle.store().begin().await?;
        let bounty = lock(tx.as_mut(), bounty_id).await?;
        bounty.ensure_allows(BountyAction::Resolve)?;
        if actor != self.arbiter {
            return Err(BountyError::Unauthorized(
                "only the arbiter can resolve disputes".to_string(),
            ));
        }

        let next = bounty.resolved(&winner, resolution)?;
        let hunter_wins = next.is_hunter(&winner);
        let outcome = if hunter_wins {
            SubmissionStatus::Accepted
        } else {
            SubmissionStatus::Rejected
        };

        info!(
            bounty_id,
            winner = %winner,
            hunter_wins,
            "Resolving dispute"
        );
        self.lifecycle
            .settle(tx, next, outcome, hunter_wins.then_some(winner))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounty::{BountyStatus, CreateBounty};
    use crate::content::MemoryContentStore;
    use crate::database::{MemoryStore, Store};
    use chrono::Utc;

    const CREATOR: &str = "0x1111111111111111111111111111111111111111";
    const HUNTER: &str = "0x2222222222222222222222222222222222222222";
    const ARBITER: &str = "0x9999999999999999999999999999999999999999";

    async fn disputed() -> (Arc<MemoryStore>, DisputeResolver, i64) {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = Arc::new(LifecycleManager::new(
            store.clone(),
            Arc::new(MemoryContentStore::new()),
        ));
        let bounty = lifecycle
            .create_bounty(
                CREATOR,
                CreateBounty {
                    external_id: None,
                    title: "Bridge audit".to_string(),
                    description: "Check the relayer".to_string(),
                    reward: "1".parse().unwrap(),
                    deadline: Utc::now() + chrono::Duration::days(2),
                },
            )
            .await
            .unwrap();
        lifecycle.claim(HUNTER, bounty.id).await.unwrap();
        lifecycle.dispute(CREATOR, bounty.id, "incomplete").await.unwrap();
        let resolver = DisputeResolver::new(lifecycle, ARBITER).unwrap();
        (store, resolver, bounty.id)
    }

    #[tokio::test]
    async fn test_only_arbiter_resolves() {
        let (_, resolver, id) = disputed().await;
        assert!(matches!(
            resolver.resolve(CREATOR, id, CREATOR, "mine").await,
            Err(BountyError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_creator_win_has_no_award() {
        let (store, resolver, id) = disputed().await;
        let completion = resolver
            .resolve(ARBITER, id, CREATOR, "work not delivered")
            .await
            .unwrap();
        assert_eq!(completion.bounty.status, BountyStatus::Completed);
        assert_eq!(completion.bounty.dispute_winner.as_deref(), Some(CREATOR));
        assert!(completion.award.is_none());
        assert_eq!(store.get_reputation(HUNTER).await.unwrap().unwrap().score, 0);
    }

    #[tokio::test]
    async fn test_second_resolution_is_already_completed() {
        let (_, resolver, id) = disputed().await;
        resolver.resolve(ARBITER, id, HUNTER, "delivered").await.unwrap();
        assert!(matches!(
            resolver.resolve(ARBITER, id, HUNTER, "delivered").await,
            Err(BountyError::AlreadyCompleted(_))
        ));
    }

    #[test]
    fn test_arbiter_is_canonicalized() {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = Arc::new(LifecycleManager::new(
            store,
            Arc::new(MemoryContentStore::new()),
        ));
        let resolver =
            DisputeResolver::new(lifecycle, "0XABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
        assert_eq!(resolver.arbiter(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }
}
