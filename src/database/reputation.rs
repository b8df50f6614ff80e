//! Reputation persistence - scores and milestone badges
//!
//! Scores are locked with `SELECT ... FOR UPDATE` before every
//! read-modify-write so concurrent awards serialize per user.

use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::error::{BountyError, Result};
use crate::reputation::{Badge, NewBadge, Reputation};

const BADGE_COLUMNS: &str = "id, user_id, name, description, proof_uri, tx_hash, awarded_at";

/// Initialize reputation schema and tables
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing reputation schema...");

    sqlx::query("CREATE SCHEMA IF NOT EXISTS reputation")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reputation.scores (
            user_id VARCHAR(42) PRIMARY KEY REFERENCES bounty.users(id),
            score BIGINT NOT NULL DEFAULT 0,
            level BIGINT NOT NULL DEFAULT 1,
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reputation.badges (
            id BIGSERIAL PRIMARY KEY,
            user_id VARCHAR(42) NOT NULL REFERENCES reputation.scores(user_id),
            name VARCHAR(100) NOT NULL,
            description TEXT NOT NULL,
            proof_uri TEXT,
            tx_hash VARCHAR(66),
            awarded_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
            UNIQUE(user_id, name)
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_badges_user ON reputation.badges(user_id)")
        .execute(pool)
        .await?;

    info!("Reputation schema initialized");
    Ok(())
}

fn score_from_row(row: &PgRow) -> Result<Reputation> {
    Ok(Reputation {
        user_id: row.try_get("user_id")?,
        score: row.try_get("score")?,
        level: row.try_get("level")?,
        badges: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn badge_from_row(row: &PgRow) -> Result<Badge> {
    Ok(Badge {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        proof_uri: row.try_get("proof_uri")?,
        tx_hash: row.try_get("tx_hash")?,
        awarded_at: row.try_get("awarded_at")?,
    })
}

/// Insert the zero record for a user if there is none yet.
pub async fn insert_initial(conn: &mut PgConnection, user_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reputation.scores (user_id, score, level)
        VALUES ($1, 0, 1)
        ON CONFLICT (user_id) DO NOTHING
    "#,
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Get reputation with its badges
pub async fn get_reputation(conn: &mut PgConnection, user_id: &str) -> Result<Option<Reputation>> {
    let row = sqlx::query(
        r#"
        SELECT user_id, score, level, created_at, updated_at
        FROM reputation.scores
        WHERE user_id = $1
    "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let mut reputation = score_from_row(&row)?;
            reputation.badges = list_badges(conn, user_id).await?;
            Ok(Some(reputation))
        }
        None => Ok(None),
    }
}

/// Fetch-or-create, then lock the score row for the rest of the transaction.
pub async fn lock_reputation(conn: &mut PgConnection, user_id: &str) -> Result<Reputation> {
    insert_initial(conn, user_id).await?;

    let row = sqlx::query(
        r#"
        SELECT user_id, score, level, created_at, updated_at
        FROM reputation.scores
        WHERE user_id = $1
        FOR UPDATE
    "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    let mut reputation = match row {
        Some(row) => score_from_row(&row)?,
        None => return Err(BountyError::not_found("reputation", user_id)),
    };
    reputation.badges = list_badges(conn, user_id).await?;
    debug!(user_id = %user_id, score = reputation.score, "Locked reputation");
    Ok(reputation)
}

pub async fn save_score(conn: &mut PgConnection, reputation: &Reputation) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE reputation.scores SET score = $2, level = $3, updated_at = $4
        WHERE user_id = $1
    "#,
    )
    .bind(&reputation.user_id)
    .bind(reputation.score)
    .bind(reputation.level)
    .bind(reputation.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(BountyError::not_found("reputation", &reputation.user_id));
    }
    Ok(())
}

pub async fn list_badges(conn: &mut PgConnection, user_id: &str) -> Result<Vec<Badge>> {
    let query = format!(
        "SELECT {BADGE_COLUMNS} FROM reputation.badges WHERE user_id = $1 ORDER BY awarded_at, id"
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(badge_from_row).collect()
}

pub async fn find_badge(conn: &mut PgConnection, user_id: &str, name: &str) -> Result<Option<Badge>> {
    let query =
        format!("SELECT {BADGE_COLUMNS} FROM reputation.badges WHERE user_id = $1 AND name = $2");
    let row = sqlx::query(&query)
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(badge_from_row).transpose()
}

/// Insert guarded by UNIQUE(user_id, name). `None` when the badge already
/// exists.
pub async fn insert_badge(conn: &mut PgConnection, badge: &NewBadge) -> Result<Option<Badge>> {
    let query = format!(
        r#"
        INSERT INTO reputation.badges (user_id, name, description, proof_uri)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, name) DO NOTHING
        RETURNING {BADGE_COLUMNS}
    "#
    );
    let row = sqlx::query(&query)
        .bind(&badge.user_id)
        .bind(&badge.name)
        .bind(&badge.description)
        .bind(&badge.proof_uri)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(badge_from_row).transpose()
}
