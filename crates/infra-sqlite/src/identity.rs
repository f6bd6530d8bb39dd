// SQLite IdentityResolver

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use sqlx::SqlitePool;
use sweeper_core::domain::UserId;
use sweeper_core::error::Result;
use sweeper_core::port::{Identity, IdentityResolver};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    display_name: String,
    email: Option<String>,
}

pub struct SqliteIdentityResolver {
    pool: SqlitePool,
}

impl SqliteIdentityResolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update a user
    pub async fn upsert(&self, identity: &Identity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, display_name, email) VALUES (?, ?, ?)
            ON CONFLICT (id) DO UPDATE
            SET display_name = excluded.display_name, email = excluded.email
            "#,
        )
        .bind(identity.id)
        .bind(&identity.display_name)
        .bind(&identity.email)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl IdentityResolver for SqliteIdentityResolver {
    async fn resolve(&self, id: UserId) -> Result<Option<Identity>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, display_name, email FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|r| Identity {
            id: r.id,
            display_name: r.display_name,
            email: r.email,
        }))
    }
}
