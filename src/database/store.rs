//! Persistence contract shared by every component.
//!
//! A [`Store`] hands out [`StoreTransaction`]s. Nothing a transaction writes
//! is visible until [`StoreTransaction::commit`] succeeds; dropping a
//! transaction without committing rolls it back.

use async_trait::async_trait;

use crate::bounty::{
    Bounty, BountyComment, BountyFilter, BountySubmission, NewBounty, NewComment, NewSubmission,
    SubmissionStatus,
};
use crate::error::Result;
use crate::identity::User;
use crate::reputation::{Badge, NewBadge, Reputation};

#[async_trait]
pub trait Store: Send + Sync {
    /// Start a unit of work
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    async fn get_bounty(&self, id: i64) -> Result<Option<Bounty>>;

    /// Newest first
    async fn list_bounties(&self, filter: &BountyFilter) -> Result<Vec<Bounty>>;

    async fn list_submissions(&self, bounty_id: i64) -> Result<Vec<BountySubmission>>;

    async fn list_comments(&self, bounty_id: i64) -> Result<Vec<BountyComment>>;

    /// Reputation with badges, or `None` if the user has no record yet
    async fn get_reputation(&self, user_id: &str) -> Result<Option<Reputation>>;

    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    async fn insert_bounty(&mut self, bounty: &NewBounty) -> Result<Bounty>;

    /// Read a bounty and hold its row lock until the transaction ends
    async fn lock_bounty(&mut self, id: i64) -> Result<Option<Bounty>>;

    /// Persist lifecycle fields if the stored version still equals
    /// `bounty.version` and the stored row is not completed; fails with
    /// `Conflict` otherwise. Returns the row with its new version.
    async fn update_bounty(&mut self, bounty: &Bounty) -> Result<Bounty>;

    async fn insert_submission(&mut self, submission: &NewSubmission)
        -> Result<BountySubmission>;

    /// Move every submission of a bounty in status `from` to `to`.
    /// Returns the number of submissions changed.
    async fn set_submission_status(
        &mut self,
        bounty_id: i64,
        from: SubmissionStatus,
        to: SubmissionStatus,
    ) -> Result<u64>;

    async fn insert_comment(&mut self, comment: &NewComment) -> Result<BountyComment>;

    /// Fetch-or-create the user's reputation and hold its row lock
    async fn lock_reputation(&mut self, user_id: &str) -> Result<Reputation>;

    async fn save_reputation(&mut self, reputation: &Reputation) -> Result<()>;

    async fn find_badge(&mut self, user_id: &str, name: &str) -> Result<Option<Badge>>;

    /// Insert a badge unless (user_id, name) already exists. A duplicate
    /// yields `Ok(None)`.
    async fn insert_badge(&mut self, badge: &NewBadge) -> Result<Option<Badge>>;

    /// Create the user and its initial reputation if absent.
    /// Returns the user and whether it was created by this call.
    async fn ensure_user(&mut self, address: &str) -> Result<(User, bool)>;

    async fn update_user(&mut self, user: &User) -> Result<User>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
