//! In-memory store for tests and local development
//!
//! Transactions are serialized through a single async mutex and work on a
//! private copy of the state; commit swaps the copy in. This gives the same
//! atomicity and row-lock guarantees the PostgreSQL store provides, at the
//! cost of no parallelism between transactions.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashSet;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::bounty::{
    Bounty, BountyComment, BountyFilter, BountyStatus, BountySubmission, NewBounty, NewComment,
    NewSubmission, SubmissionStatus,
};
use crate::database::store::{Store, StoreTransaction};
use crate::error::{BountyError, Result};
use crate::identity::User;
use crate::reputation::{Badge, NewBadge, Reputation};

/// Operations that can be made to fail, to exercise rollback paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    SaveReputation,
    InsertBadge,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    sequence: i64,
    bounties: BTreeMap<i64, Bounty>,
    submissions: BTreeMap<i64, BountySubmission>,
    comments: BTreeMap<i64, BountyComment>,
    users: HashMap<String, User>,
    /// Stored without badges; badges live in `badges`
    reputations: HashMap<String, Reputation>,
    badges: BTreeMap<i64, Badge>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.sequence += 1;
        self.sequence
    }

    fn reputation_with_badges(&self, user_id: &str) -> Option<Reputation> {
        let mut reputation = self.reputations.get(user_id)?.clone();
        reputation.badges = self
            .badges
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        Some(reputation)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    failpoints: Arc<DashSet<FailPoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call reaching `point` fail until cleared.
    pub fn fail_on(&self, point: FailPoint) {
        self.failpoints.insert(point);
    }

    pub fn clear_failures(&self) {
        self.failpoints.clear();
    }

    pub async fn badge_count(&self, user_id: &str, name: &str) -> usize {
        let state = self.state.lock().await;
        state
            .badges
            .values()
            .filter(|b| b.user_id == user_id && b.name == name)
            .count()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            failpoints: self.failpoints.clone(),
        }))
    }

    async fn get_bounty(&self, id: i64) -> Result<Option<Bounty>> {
        Ok(self.state.lock().await.bounties.get(&id).cloned())
    }

    async fn list_bounties(&self, filter: &BountyFilter) -> Result<Vec<Bounty>> {
        let state = self.state.lock().await;
        Ok(state
            .bounties
            .values()
            .rev()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect())
    }

    async fn list_submissions(&self, bounty_id: i64) -> Result<Vec<BountySubmission>> {
        let state = self.state.lock().await;
        Ok(state
            .submissions
            .values()
            .filter(|s| s.bounty_id == bounty_id)
            .cloned()
            .collect())
    }

    async fn list_comments(&self, bounty_id: i64) -> Result<Vec<BountyComment>> {
        let state = self.state.lock().await;
        Ok(state
            .comments
            .values()
            .filter(|c| c.bounty_id == bounty_id)
            .cloned()
            .collect())
    }

    async fn get_reputation(&self, user_id: &str) -> Result<Option<Reputation>> {
        Ok(self.state.lock().await.reputation_with_badges(user_id))
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.state.lock().await.users.get(user_id).cloned())
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    failpoints: Arc<DashSet<FailPoint>>,
}

impl MemoryTransaction {
    fn check(&self, point: FailPoint) -> Result<()> {
        if self.failpoints.contains(&point) {
            warn!(?point, "Injected store failure");
            return Err(BountyError::StoreUnavailable(format!(
                "injected failure at {point:?}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn insert_bounty(&mut self, bounty: &NewBounty) -> Result<Bounty> {
        if let Some(external_id) = bounty.external_id {
            if self
                .working
                .bounties
                .values()
                .any(|b| b.external_id == Some(external_id))
            {
                return Err(BountyError::conflict("bounty external id", external_id));
            }
        }

        let now = Utc::now();
        let id = self.working.next_id();
        let record = Bounty {
            id,
            external_id: bounty.external_id,
            title: bounty.title.clone(),
            description: bounty.description.clone(),
            reward: bounty.reward,
            creator_id: bounty.creator_id.clone(),
            hunter_id: None,
            status: BountyStatus::Open,
            deadline: bounty.deadline,
            dispute_reason: None,
            dispute_winner: None,
            dispute_resolution: None,
            resolved_at: None,
            metadata_hash: bounty.metadata_hash.clone(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.working.bounties.insert(id, record.clone());
        Ok(record)
    }

    async fn lock_bounty(&mut self, id: i64) -> Result<Option<Bounty>> {
        Ok(self.working.bounties.get(&id).cloned())
    }

    async fn update_bounty(&mut self, bounty: &Bounty) -> Result<Bounty> {
        let stored = self
            .working
            .bounties
            .get_mut(&bounty.id)
            .ok_or_else(|| BountyError::not_found("bounty", bounty.id))?;
        if stored.version != bounty.version || stored.status.is_terminal() {
            return Err(BountyError::conflict("bounty", bounty.id));
        }

        stored.hunter_id = bounty.hunter_id.clone();
        stored.status = bounty.status;
        stored.dispute_reason = bounty.dispute_reason.clone();
        stored.dispute_winner = bounty.dispute_winner.clone();
        stored.dispute_resolution = bounty.dispute_resolution.clone();
        stored.resolved_at = bounty.resolved_at;
        stored.version += 1;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn insert_submission(
        &mut self,
        submission: &NewSubmission,
    ) -> Result<BountySubmission> {
        let now = Utc::now();
        let id = self.working.next_id();
        let record = BountySubmission {
            id,
            bounty_id: submission.bounty_id,
            hunter_id: submission.hunter_id.clone(),
            content: submission.content.clone(),
            content_hash: submission.content_hash.clone(),
            status: SubmissionStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.working.submissions.insert(id, record.clone());
        Ok(record)
    }

    async fn set_submission_status(
        &mut self,
        bounty_id: i64,
        from: SubmissionStatus,
        to: SubmissionStatus,
    ) -> Result<u64> {
        let now = Utc::now();
        let mut changed = 0;
        for submission in self
            .working
            .submissions
            .values_mut()
            .filter(|s| s.bounty_id == bounty_id && s.status == from)
        {
            submission.status = to;
            submission.updated_at = now;
            changed += 1;
        }
        Ok(changed)
    }

    async fn insert_comment(&mut self, comment: &NewComment) -> Result<BountyComment> {
        let id = self.working.next_id();
        let record = BountyComment {
            id,
            bounty_id: comment.bounty_id,
            author_id: comment.author_id.clone(),
            content: comment.content.clone(),
            created_at: Utc::now(),
        };
        self.working.comments.insert(id, record.clone());
        Ok(record)
    }

    async fn lock_reputation(&mut self, user_id: &str) -> Result<Reputation> {
        self.working
            .reputations
            .entry(user_id.to_string())
            .or_insert_with(|| Reputation::new(user_id.to_string()));
        self.working
            .reputation_with_badges(user_id)
            .ok_or_else(|| BountyError::not_found("reputation", user_id))
    }

    async fn save_reputation(&mut self, reputation: &Reputation) -> Result<()> {
        self.check(FailPoint::SaveReputation)?;
        let mut stored = reputation.clone();
        stored.badges.clear();
        self.working
            .reputations
            .insert(reputation.user_id.clone(), stored);
        Ok(())
    }

    async fn find_badge(&mut self, user_id: &str, name: &str) -> Result<Option<Badge>> {
        Ok(self
            .working
            .badges
            .values()
            .find(|b| b.user_id == user_id && b.name == name)
            .cloned())
    }

    async fn insert_badge(&mut self, badge: &NewBadge) -> Result<Option<Badge>> {
        self.check(FailPoint::InsertBadge)?;
        // unique (user_id, name)
        if self
            .working
            .badges
            .values()
            .any(|b| b.user_id == badge.user_id && b.name == badge.name)
        {
            return Ok(None);
        }

        let id = self.working.next_id();
        let record = Badge {
            id,
            user_id: badge.user_id.clone(),
            name: badge.name.clone(),
            description: badge.description.clone(),
            proof_uri: badge.proof_uri.clone(),
            tx_hash: None,
            awarded_at: Utc::now(),
        };
        self.working.badges.insert(id, record.clone());
        Ok(Some(record))
    }

    async fn ensure_user(&mut self, address: &str) -> Result<(User, bool)> {
        if let Some(user) = self.working.users.get(address) {
            return Ok((user.clone(), false));
        }

        let user = User::new(address.to_string());
        self.working.users.insert(address.to_string(), user.clone());
        self.working
            .reputations
            .entry(address.to_string())
            .or_insert_with(|| Reputation::new(address.to_string()));
        Ok((user, true))
    }

    async fn update_user(&mut self, user: &User) -> Result<User> {
        if let Some(username) = &user.username {
            if self
                .working
                .users
                .values()
                .any(|u| u.id != user.id && u.username.as_ref() == Some(username))
            {
                return Err(BountyError::conflict("username", username));
            }
        }

        let stored = self
            .working
            .users
            .get_mut(&user.id)
            .ok_or_else(|| BountyError::not_found("user", &user.id))?;
        stored.username = user.username.clone();
        stored.bio = user.bio.clone();
        stored.avatar = user.avatar.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.check(FailPoint::Commit)?;
        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}
