//! Bounty, submission and comment persistence
//!
//! Every query takes a `&mut PgConnection` so it can run either inside a
//! transaction or on a plain pooled connection.

use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::Row;
use tracing::info;

use crate::bounty::{
    Bounty, BountyComment, BountyFilter, BountySubmission, NewBounty, NewComment, NewSubmission,
    SubmissionStatus, TokenAmount,
};
use crate::error::{BountyError, Result};

const BOUNTY_COLUMNS: &str = r#"
    id, external_id, title, description, reward::TEXT AS reward, creator_id, hunter_id,
    status, deadline, dispute_reason, dispute_winner, dispute_resolution, resolved_at,
    metadata_hash, version, created_at, updated_at
"#;

/// Create the bounty tables. Users must exist first.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing bounty schema...");

    sqlx::query("CREATE SCHEMA IF NOT EXISTS bounty")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bounty.bounties (
            id BIGSERIAL PRIMARY KEY,
            external_id BIGINT UNIQUE,
            title VARCHAR(255) NOT NULL,
            description TEXT NOT NULL,
            reward NUMERIC(32,18) NOT NULL CHECK (reward >= 0),
            creator_id VARCHAR(42) NOT NULL REFERENCES bounty.users(id),
            hunter_id VARCHAR(42) REFERENCES bounty.users(id),
            status VARCHAR(20) NOT NULL DEFAULT 'open'
                CHECK (status IN ('open', 'claimed', 'submitted', 'disputed', 'completed')),
            deadline TIMESTAMP WITH TIME ZONE NOT NULL,
            dispute_reason TEXT,
            dispute_winner VARCHAR(42),
            dispute_resolution TEXT,
            resolved_at TIMESTAMP WITH TIME ZONE,
            metadata_hash VARCHAR(255),
            version BIGINT NOT NULL DEFAULT 0,
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
            CHECK ((status = 'open') = (hunter_id IS NULL))
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bounty.submissions (
            id BIGSERIAL PRIMARY KEY,
            bounty_id BIGINT NOT NULL REFERENCES bounty.bounties(id),
            hunter_id VARCHAR(42) NOT NULL REFERENCES bounty.users(id),
            content TEXT NOT NULL,
            content_hash VARCHAR(255) NOT NULL,
            status VARCHAR(20) NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'accepted', 'rejected')),
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bounty.comments (
            id BIGSERIAL PRIMARY KEY,
            bounty_id BIGINT NOT NULL REFERENCES bounty.bounties(id),
            author_id VARCHAR(42) NOT NULL REFERENCES bounty.users(id),
            content TEXT NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )
    "#,
    )
    .execute(pool)
    .await?;

    for index in [
        "CREATE INDEX IF NOT EXISTS idx_bounties_creator ON bounty.bounties(creator_id)",
        "CREATE INDEX IF NOT EXISTS idx_bounties_hunter ON bounty.bounties(hunter_id)",
        "CREATE INDEX IF NOT EXISTS idx_bounties_status ON bounty.bounties(status)",
        "CREATE INDEX IF NOT EXISTS idx_submissions_bounty ON bounty.submissions(bounty_id)",
        "CREATE INDEX IF NOT EXISTS idx_comments_bounty ON bounty.comments(bounty_id)",
    ] {
        sqlx::query(index).execute(pool).await?;
    }

    info!("Bounty schema initialized");
    Ok(())
}

fn bounty_from_row(row: &PgRow) -> Result<Bounty> {
    let reward: String = row.try_get("reward")?;
    let reward: TokenAmount = reward
        .parse()
        .map_err(|e| BountyError::StoreUnavailable(format!("corrupt reward column: {e}")))?;
    let status: String = row.try_get("status")?;

    Ok(Bounty {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        reward,
        creator_id: row.try_get("creator_id")?,
        hunter_id: row.try_get("hunter_id")?,
        status: status.parse()?,
        deadline: row.try_get("deadline")?,
        dispute_reason: row.try_get("dispute_reason")?,
        dispute_winner: row.try_get("dispute_winner")?,
        dispute_resolution: row.try_get("dispute_resolution")?,
        resolved_at: row.try_get("resolved_at")?,
        metadata_hash: row.try_get("metadata_hash")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn submission_from_row(row: &PgRow) -> Result<BountySubmission> {
    let status: String = row.try_get("status")?;
    Ok(BountySubmission {
        id: row.try_get("id")?,
        bounty_id: row.try_get("bounty_id")?,
        hunter_id: row.try_get("hunter_id")?,
        content: row.try_get("content")?,
        content_hash: row.try_get("content_hash")?,
        status: status.parse()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn comment_from_row(row: &PgRow) -> Result<BountyComment> {
    Ok(BountyComment {
        id: row.try_get("id")?,
        bounty_id: row.try_get("bounty_id")?,
        author_id: row.try_get("author_id")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_bounty(conn: &mut PgConnection, bounty: &NewBounty) -> Result<Bounty> {
    let query = format!(
        r#"
        INSERT INTO bounty.bounties
            (external_id, title, description, reward, creator_id, deadline, metadata_hash)
        VALUES ($1, $2, $3, $4::NUMERIC, $5, $6, $7)
        RETURNING {BOUNTY_COLUMNS}
    "#
    );
    let row = sqlx::query(&query)
        .bind(bounty.external_id)
        .bind(&bounty.title)
        .bind(&bounty.description)
        .bind(bounty.reward.to_string())
        .bind(&bounty.creator_id)
        .bind(bounty.deadline)
        .bind(&bounty.metadata_hash)
        .fetch_one(&mut *conn)
        .await?;
    bounty_from_row(&row)
}

pub async fn get_bounty(conn: &mut PgConnection, id: i64) -> Result<Option<Bounty>> {
    let query = format!("SELECT {BOUNTY_COLUMNS} FROM bounty.bounties WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(bounty_from_row).transpose()
}

/// `SELECT ... FOR UPDATE`; the row stays locked until the transaction ends.
pub async fn lock_bounty(conn: &mut PgConnection, id: i64) -> Result<Option<Bounty>> {
    let query = format!("SELECT {BOUNTY_COLUMNS} FROM bounty.bounties WHERE id = $1 FOR UPDATE");
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(bounty_from_row).transpose()
}

/// Write lifecycle fields guarded by the version the caller read.
pub async fn update_bounty(conn: &mut PgConnection, bounty: &Bounty) -> Result<Bounty> {
    let query = format!(
        r#"
        UPDATE bounty.bounties SET
            hunter_id = $3,
            status = $4,
            dispute_reason = $5,
            dispute_winner = $6,
            dispute_resolution = $7,
            resolved_at = $8,
            version = version + 1,
            updated_at = NOW()
        WHERE id = $1 AND version = $2 AND status <> 'completed'
        RETURNING {BOUNTY_COLUMNS}
    "#
    );
    let row = sqlx::query(&query)
        .bind(bounty.id)
        .bind(bounty.version)
        .bind(&bounty.hunter_id)
        .bind(bounty.status.as_str())
        .bind(&bounty.dispute_reason)
        .bind(&bounty.dispute_winner)
        .bind(&bounty.dispute_resolution)
        .bind(bounty.resolved_at)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => bounty_from_row(&row),
        None => Err(BountyError::conflict("bounty", bounty.id)),
    }
}

pub async fn list_bounties(conn: &mut PgConnection, filter: &BountyFilter) -> Result<Vec<Bounty>> {
    let query = format!(
        r#"
        SELECT {BOUNTY_COLUMNS} FROM bounty.bounties
        WHERE ($1::VARCHAR IS NULL OR creator_id = $1)
          AND ($2::VARCHAR IS NULL OR hunter_id = $2)
          AND ($3::VARCHAR IS NULL OR status = $3)
        ORDER BY created_at DESC, id DESC
    "#
    );
    let rows = sqlx::query(&query)
        .bind(&filter.creator_id)
        .bind(&filter.hunter_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(bounty_from_row).collect()
}

pub async fn insert_submission(
    conn: &mut PgConnection,
    submission: &NewSubmission,
) -> Result<BountySubmission> {
    let row = sqlx::query(
        r#"
        INSERT INTO bounty.submissions (bounty_id, hunter_id, content, content_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING id, bounty_id, hunter_id, content, content_hash, status, created_at, updated_at
    "#,
    )
    .bind(submission.bounty_id)
    .bind(&submission.hunter_id)
    .bind(&submission.content)
    .bind(&submission.content_hash)
    .fetch_one(&mut *conn)
    .await?;
    submission_from_row(&row)
}

pub async fn set_submission_status(
    conn: &mut PgConnection,
    bounty_id: i64,
    from: SubmissionStatus,
    to: SubmissionStatus,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE bounty.submissions SET status = $3, updated_at = NOW()
        WHERE bounty_id = $1 AND status = $2
    "#,
    )
    .bind(bounty_id)
    .bind(from.as_str())
    .bind(to.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn list_submissions(
    conn: &mut PgConnection,
    bounty_id: i64,
) -> Result<Vec<BountySubmission>> {
    let rows = sqlx::query(
        r#"
        SELECT id, bounty_id, hunter_id, content, content_hash, status, created_at, updated_at
        FROM bounty.submissions
        WHERE bounty_id = $1
        ORDER BY created_at, id
    "#,
    )
    .bind(bounty_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(submission_from_row).collect()
}

pub async fn insert_comment(conn: &mut PgConnection, comment: &NewComment) -> Result<BountyComment> {
    let row = sqlx::query(
        r#"
        INSERT INTO bounty.comments (bounty_id, author_id, content)
        VALUES ($1, $2, $3)
        RETURNING id, bounty_id, author_id, content, created_at
    "#,
    )
    .bind(comment.bounty_id)
    .bind(&comment.author_id)
    .bind(&comment.content)
    .fetch_one(&mut *conn)
    .await?;
    comment_from_row(&row)
}

pub async fn list_comments(conn: &mut PgConnection, bounty_id: i64) -> Result<Vec<BountyComment>> {
    let rows = sqlx::query(
        r#"
        SELECT id, bounty_id, author_id, content, created_at
        FROM bounty.comments
        WHERE bounty_id = $1
        ORDER BY created_at, id
    "#,
    )
    .bind(bounty_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(comment_from_row).collect()
}
