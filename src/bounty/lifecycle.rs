//! Bounty lifecycle orchestration
//!
//! Every mutating action follows the same shape: canonicalize identities,
//! open a transaction, lock the bounty row, let the state machine compute the
//! next value, persist it against the version that was read, commit.
//! Completion additionally credits the hunter and evaluates badges inside
//! that same transaction, so either all of it happens or none of it does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bounty::{
    Bounty, BountyComment, BountyFilter, BountySubmission, NewBounty, NewComment, NewSubmission,
    SubmissionStatus, TokenAmount,
};
use crate::content::ContentStore;
use crate::database::{Store, StoreTransaction};
use crate::error::{BountyError, Result};
use crate::identity::canonical_address;
use crate::reputation::{Badge, BadgeEngine, Ledger, Reputation, DEFAULT_COMPLETION_POINTS};

const MAX_TITLE_LEN: usize = 255;

/// Input for [`LifecycleManager::create_bounty`]
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBounty {
    #[serde(default)]
    pub external_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub reward: TokenAmount,
    pub deadline: DateTime<Utc>,
}

/// Reputation credited by a completion
#[derive(Debug, Clone, Serialize)]
pub struct Award {
    pub user_id: String,
    pub points: i64,
    pub reputation: Reputation,
    pub new_badges: Vec<Badge>,
}

/// Result of a completion or a dispute resolution
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub bounty: Bounty,
    pub award: Option<Award>,
}

#[derive(Serialize)]
struct BountyMetadata<'a> {
    title: &'a str,
    description: &'a str,
    reward: TokenAmount,
    deadline: DateTime<Utc>,
    creator: &'a str,
}

#[derive(Serialize)]
struct SubmissionDocument<'a> {
    content: &'a str,
    hunter: &'a str,
    time: DateTime<Utc>,
}

pub struct LifecycleManager {
    store: Arc<dyn Store>,
    content: Arc<dyn ContentStore>,
    ledger: Ledger,
    badges: BadgeEngine,
    completion_points: i64,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn Store>, content: Arc<dyn ContentStore>) -> Self {
        Self {
            ledger: Ledger::new(store.clone()),
            badges: BadgeEngine::new(store.clone()).with_content_store(content.clone()),
            store,
            content,
            completion_points: DEFAULT_COMPLETION_POINTS,
        }
    }

    pub fn with_completion_points(mut self, points: i64) -> Self {
        self.completion_points = points;
        self
    }

    pub fn with_badge_engine(mut self, badges: BadgeEngine) -> Self {
        self.badges = badges;
        self
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn badges(&self) -> &BadgeEngine {
        &self.badges
    }

    pub fn completion_points(&self) -> i64 {
        self.completion_points
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub async fn create_bounty(&self, actor: &str, request: CreateBounty) -> Result<Bounty> {
        let creator = canonical_address(actor)?;
        let title = request.title.trim();
        let description = request.description.trim();
        if title.is_empty() || title.len() > MAX_TITLE_LEN {
            return Err(BountyError::validation(format!(
                "title must be between 1 and {MAX_TITLE_LEN} characters"
            )));
        }
        if description.is_empty() {
            return Err(BountyError::validation("description is required"));
        }
        if request.deadline <= Utc::now() {
            return Err(BountyError::validation("deadline must be in the future"));
        }

        let metadata = BountyMetadata {
            title,
            description,
            reward: request.reward,
            deadline: request.deadline,
            creator: &creator,
        };
        let metadata_hash = self.publish_metadata(&metadata).await;

        let new_bounty = NewBounty {
            external_id: request.external_id,
            title: title.to_string(),
            description: description.to_string(),
            reward: request.reward,
            creator_id: creator.clone(),
            deadline: request.deadline,
            metadata_hash,
        };

        let mut tx = self.store.begin().await?;
        tx.ensure_user(&creator).await?;
        let bounty = tx.insert_bounty(&new_bounty).await?;
        tx.commit().await?;

        info!(
            bounty_id = bounty.id,
            creator = %creator,
            reward = %bounty.reward,
            "Bounty created"
        );
        Ok(bounty)
    }

    pub async fn claim(&self, actor: &str, bounty_id: i64) -> Result<Bounty> {
        let hunter = canonical_address(actor)?;

        let mut tx = self.store.begin().await?;
        let bounty = lock(tx.as_mut(), bounty_id).await?;
        let next = bounty.claimed_by(&hunter)?;
        tx.ensure_user(&hunter).await?;
        let saved = tx.update_bounty(&next).await?;
        tx.commit().await?;

        info!(bounty_id, hunter = %hunter, "Bounty claimed");
        Ok(saved)
    }

    /// Store the work in the content store and record a pending submission.
    /// The bounty status is left as it is.
    pub async fn submit(&self, actor: &str, bounty_id: i64, content: &str) -> Result<BountySubmission> {
        let hunter = canonical_address(actor)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(BountyError::validation("submission content is required"));
        }

        // Cheap rejection before touching the content store
        self.get_stored(bounty_id).await?.ensure_submitter(&hunter)?;

        let document = SubmissionDocument {
            content,
            hunter: &hunter,
            time: Utc::now(),
        };
        let bytes = serde_json::to_vec(&document)
            .map_err(|e| BountyError::Content(format!("Failed to encode submission: {e}")))?;
        let content_hash = self.content.put(bytes).await?;

        let mut tx = self.store.begin().await?;
        let bounty = lock(tx.as_mut(), bounty_id).await?;
        bounty.ensure_submitter(&hunter)?;
        let submission = tx
            .insert_submission(&NewSubmission {
                bounty_id,
                hunter_id: hunter.clone(),
                content: content.to_string(),
                content_hash,
            })
            .await?;
        tx.commit().await?;

        info!(
            bounty_id,
            submission_id = submission.id,
            hunter = %hunter,
            "Work submitted"
        );
        Ok(submission)
    }

    pub async fn complete(&self, actor: &str, bounty_id: i64) -> Result<Completion> {
        let creator = canonical_address(actor)?;

        let mut tx = self.store.begin().await?;
        let bounty = lock(tx.as_mut(), bounty_id).await?;
        let next = bounty.completed_by(&creator)?;
        let hunter = next.hunter_id.clone();

        self.settle(tx, next, SubmissionStatus::Accepted, hunter)
            .await
    }

    pub async fn dispute(&self, actor: &str, bounty_id: i64, reason: &str) -> Result<Bounty> {
        let creator = canonical_address(actor)?;

        let mut tx = self.store.begin().await?;
        let bounty = lock(tx.as_mut(), bounty_id).await?;
        let next = bounty.disputed_by(&creator, reason)?;
        let saved = tx.update_bounty(&next).await?;
        tx.commit().await?;

        info!(bounty_id, creator = %creator, "Bounty disputed");
        Ok(saved)
    }

    pub async fn add_comment(
        &self,
        actor: &str,
        bounty_id: i64,
        content: &str,
    ) -> Result<BountyComment> {
        let author = canonical_address(actor)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(BountyError::validation("comment content is required"));
        }

        let mut tx = self.store.begin().await?;
        let bounty = lock(tx.as_mut(), bounty_id).await?;
        bounty.ensure_commenter(&author)?;
        let comment = tx
            .insert_comment(&NewComment {
                bounty_id,
                author_id: author.clone(),
                content: content.to_string(),
            })
            .await?;
        tx.commit().await?;

        debug!(bounty_id, author = %author, "Comment added");
        Ok(comment)
    }

    /// Persist a terminal bounty value, settle its submissions and credit
    /// `beneficiary`, then commit. Nothing is written if any step fails.
    pub(crate) async fn settle(
        &self,
        mut tx: Box<dyn StoreTransaction>,
        next: Bounty,
        outcome: SubmissionStatus,
        beneficiary: Option<String>,
    ) -> Result<Completion> {
        let bounty = tx.update_bounty(&next).await?;
        let settled = tx
            .set_submission_status(bounty.id, SubmissionStatus::Pending, outcome)
            .await?;

        let award = match beneficiary {
            Some(user_id) => Some(
                self.credit(tx.as_mut(), user_id, self.completion_points)
                    .await?,
            ),
            None => None,
        };

        tx.commit().await?;

        info!(
            bounty_id = bounty.id,
            submissions = settled,
            outcome = outcome.as_str(),
            credited = award.as_ref().map(|a| a.user_id.as_str()).unwrap_or("none"),
            "Bounty completed"
        );
        Ok(Completion { bounty, award })
    }

    /// Manual score adjustment. The score change and any badges it earns
    /// commit together or not at all.
    pub async fn adjust_score(&self, user_id: &str, points: i64) -> Result<Award> {
        let user_id = canonical_address(user_id)?;

        let mut tx = self.store.begin().await?;
        let award = self.credit(tx.as_mut(), user_id, points).await?;
        tx.commit().await?;

        info!(
            user_id = %award.user_id,
            points,
            score = award.reputation.score,
            badges = award.new_badges.len(),
            "Reputation adjusted"
        );
        Ok(award)
    }

    /// Ledger update plus badge evaluation inside `tx`
    async fn credit(
        &self,
        tx: &mut dyn StoreTransaction,
        user_id: String,
        points: i64,
    ) -> Result<Award> {
        let mut reputation = self.ledger.apply(tx, &user_id, points).await?;
        let new_badges = self.badges.award_in(tx, &user_id, &reputation).await?;
        reputation.badges.extend(new_badges.iter().cloned());
        Ok(Award {
            user_id,
            points,
            reputation,
            new_badges,
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Fetch a bounty, replacing the description with the one from its
    /// metadata document when that can be loaded.
    pub async fn get_bounty(&self, bounty_id: i64) -> Result<Bounty> {
        let mut bounty = self.get_stored(bounty_id).await?;

        if let Some(hash) = bounty.metadata_hash.as_deref() {
            match self.content.get(hash).await {
                Ok(bytes) => match metadata_description(&bytes) {
                    Some(description) => bounty.description = description,
                    None => debug!(bounty_id, hash, "Metadata has no description"),
                },
                Err(e) => {
                    warn!(bounty_id, hash, error = %e, "Metadata unavailable, using stored description");
                }
            }
        }

        Ok(bounty)
    }

    pub async fn list_bounties(&self, filter: BountyFilter) -> Result<Vec<Bounty>> {
        let filter = BountyFilter {
            creator_id: filter.creator_id.as_deref().map(canonical_address).transpose()?,
            hunter_id: filter.hunter_id.as_deref().map(canonical_address).transpose()?,
            status: filter.status,
        };
        self.store.list_bounties(&filter).await
    }

    pub async fn list_submissions(&self, bounty_id: i64) -> Result<Vec<BountySubmission>> {
        self.get_stored(bounty_id).await?;
        self.store.list_submissions(bounty_id).await
    }

    pub async fn list_comments(&self, bounty_id: i64) -> Result<Vec<BountyComment>> {
        self.get_stored(bounty_id).await?;
        self.store.list_comments(bounty_id).await
    }

    async fn get_stored(&self, bounty_id: i64) -> Result<Bounty> {
        self.store
            .get_bounty(bounty_id)
            .await?
            .ok_or_else(|| BountyError::not_found("bounty", bounty_id))
    }

    /// Upload the metadata document. Failure leaves the bounty without one.
    async fn publish_metadata(&self, metadata: &BountyMetadata<'_>) -> Option<String> {
        let bytes = match serde_json::to_vec(metadata) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to encode bounty metadata");
                return None;
            }
        };
        match self.content.put(bytes).await {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!(error = %e, "Bounty metadata upload failed, continuing without it");
                None
            }
        }
    }
}

pub(crate) async fn lock(tx: &mut dyn StoreTransaction, bounty_id: i64) -> Result<Bounty> {
    tx.lock_bounty(bounty_id)
        .await?
        .ok_or_else(|| BountyError::not_found("bounty", bounty_id))
}

fn metadata_description(bytes: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    value
        .get("description")?
        .as_str()
        .map(str::to_string)
        .filter(|d| !d.trim().is_empty())
}
