//! Database Connection Pool using sqlx

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::Transaction;
use tracing::{error, info};

use crate::bounty::{
    Bounty, BountyComment, BountyFilter, BountySubmission, NewBounty, NewComment, NewSubmission,
    SubmissionStatus,
};
use crate::database::store::{Store, StoreTransaction};
use crate::database::{bounties, reputation, users};
use crate::error::{BountyError, Result};
use crate::identity::User;
use crate::reputation::{Badge, NewBadge, Reputation};

/// PostgreSQL-backed [`Store`]
#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    pub async fn connect(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .map_err(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                BountyError::StoreUnavailable(format!("Failed to connect to PostgreSQL: {e}"))
            })?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create schemas and tables. Order matters for foreign keys.
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema...");
        users::init_schema(&self.pool).await?;
        bounties::init_schema(&self.pool).await?;
        reputation::init_schema(&self.pool).await?;
        info!("Database schema initialized");
        Ok(())
    }
}

#[async_trait]
impl Store for DatabasePool {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn get_bounty(&self, id: i64) -> Result<Option<Bounty>> {
        let mut conn = self.pool.acquire().await?;
        bounties::get_bounty(&mut *conn, id).await
    }

    async fn list_bounties(&self, filter: &BountyFilter) -> Result<Vec<Bounty>> {
        let mut conn = self.pool.acquire().await?;
        bounties::list_bounties(&mut *conn, filter).await
    }

    async fn list_submissions(&self, bounty_id: i64) -> Result<Vec<BountySubmission>> {
        let mut conn = self.pool.acquire().await?;
        bounties::list_submissions(&mut *conn, bounty_id).await
    }

    async fn list_comments(&self, bounty_id: i64) -> Result<Vec<BountyComment>> {
        let mut conn = self.pool.acquire().await?;
        bounties::list_comments(&mut *conn, bounty_id).await
    }

    async fn get_reputation(&self, user_id: &str) -> Result<Option<Reputation>> {
        let mut conn = self.pool.acquire().await?;
        reputation::get_reputation(&mut *conn, user_id).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        users::get_user(&mut *conn, user_id).await
    }
}

/// Rolls back on drop unless committed
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn insert_bounty(&mut self, bounty: &NewBounty) -> Result<Bounty> {
        bounties::insert_bounty(&mut *self.tx, bounty).await
    }

    async fn lock_bounty(&mut self, id: i64) -> Result<Option<Bounty>> {
        bounties::lock_bounty(&mut *self.tx, id).await
    }

    async fn update_bounty(&mut self, bounty: &Bounty) -> Result<Bounty> {
        bounties::update_bounty(&mut *self.tx, bounty).await
    }

    async fn insert_submission(
        &mut self,
        submission: &NewSubmission,
    ) -> Result<BountySubmission> {
        bounties::insert_submission(&mut *self.tx, submission).await
    }

    async fn set_submission_status(
        &mut self,
        bounty_id: i64,
        from: SubmissionStatus,
        to: SubmissionStatus,
    ) -> Result<u64> {
        bounties::set_submission_status(&mut *self.tx, bounty_id, from, to).await
    }

    async fn insert_comment(&mut self, comment: &NewComment) -> Result<BountyComment> {
        bounties::insert_comment(&mut *self.tx, comment).await
    }

    async fn lock_reputation(&mut self, user_id: &str) -> Result<Reputation> {
        reputation::lock_reputation(&mut *self.tx, user_id).await
    }

    async fn save_reputation(&mut self, score: &Reputation) -> Result<()> {
        reputation::save_score(&mut *self.tx, score).await
    }

    async fn find_badge(&mut self, user_id: &str, name: &str) -> Result<Option<Badge>> {
        reputation::find_badge(&mut *self.tx, user_id, name).await
    }

    async fn insert_badge(&mut self, badge: &NewBadge) -> Result<Option<Badge>> {
        reputation::insert_badge(&mut *self.tx, badge).await
    }

    async fn ensure_user(&mut self, address: &str) -> Result<(User, bool)> {
        users::ensure_user(&mut *self.tx, address).await
    }

    async fn update_user(&mut self, user: &User) -> Result<User> {
        users::update_user(&mut *self.tx, user).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let PgTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
