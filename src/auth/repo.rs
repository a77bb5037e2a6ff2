use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::repo_types::{RefreshToken, User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user with an already hashed password. Returns `None` when the
    /// email is already taken.
    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Store `token` as the user's refresh token, replacing any previous one.
    async fn upsert(&self, user_id: i64, token: &str) -> anyhow::Result<RefreshToken>;
    async fn find_by_token(&self, token: &str) -> anyhow::Result<Option<RefreshToken>>;
    async fn delete_by_user_id(&self, user_id: i64) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<User>> {
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await;
        match inserted {
            Ok(user) => Ok(Some(user)),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context("insert user")),
        }
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }
}

#[derive(Clone)]
pub struct PgRefreshTokenRepository {
    db: PgPool,
}

impl PgRefreshTokenRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn upsert(&self, user_id: i64, token: &str) -> anyhow::Result<RefreshToken> {
        let row = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_token (user_id, refresh_token)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET refresh_token = EXCLUDED.refresh_token
            RETURNING id, user_id, refresh_token
            "#,
        )
        .bind(user_id)
        .bind(token)
        .fetch_one(&self.db)
        .await
        .context("upsert refresh token")?;
        Ok(row)
    }

    async fn find_by_token(&self, token: &str) -> anyhow::Result<Option<RefreshToken>> {
        let row = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, user_id, refresh_token
            FROM refresh_token
            WHERE refresh_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .context("find refresh token")?;
        Ok(row)
    }

    async fn delete_by_user_id(&self, user_id: i64) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM refresh_token WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete refresh token")?;
        Ok(())
    }
}
