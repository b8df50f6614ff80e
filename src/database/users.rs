//! User persistence

use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::Row;
use tracing::info;

use crate::database::reputation;
use crate::error::{BountyError, Result};
use crate::identity::User;

const USER_COLUMNS: &str = "id, address, username, bio, avatar, created_at, updated_at";

pub async fn init_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing user schema...");

    sqlx::query("CREATE SCHEMA IF NOT EXISTS bounty")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bounty.users (
            id VARCHAR(42) PRIMARY KEY,
            address VARCHAR(42) NOT NULL UNIQUE,
            username VARCHAR(64) UNIQUE,
            bio TEXT NOT NULL DEFAULT '',
            avatar TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )
    "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        address: row.try_get("address")?,
        username: row.try_get("username")?,
        bio: row.try_get("bio")?,
        avatar: row.try_get("avatar")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn get_user(conn: &mut PgConnection, user_id: &str) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM bounty.users WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

/// Create the user and its zero reputation. Losing a concurrent insert is
/// not an error: the existing row is returned with `created = false`.
pub async fn ensure_user(conn: &mut PgConnection, address: &str) -> Result<(User, bool)> {
    let query = format!(
        r#"
        INSERT INTO bounty.users (id, address)
        VALUES ($1, $1)
        ON CONFLICT (id) DO NOTHING
        RETURNING {USER_COLUMNS}
    "#
    );
    let inserted = sqlx::query(&query)
        .bind(address)
        .fetch_optional(&mut *conn)
        .await?;

    let (user, created) = match inserted {
        Some(row) => (user_from_row(&row)?, true),
        None => match get_user(conn, address).await? {
            Some(user) => (user, false),
            None => return Err(BountyError::conflict("user", address)),
        },
    };

    reputation::insert_initial(conn, address).await?;
    Ok((user, created))
}

pub async fn update_user(conn: &mut PgConnection, user: &User) -> Result<User> {
    let query = format!(
        r#"
        UPDATE bounty.users SET username = $2, bio = $3, avatar = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
    "#
    );
    let row = sqlx::query(&query)
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.bio)
        .bind(&user.avatar)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => user_from_row(&row),
        None => Err(BountyError::not_found("user", &user.id)),
    }
}
