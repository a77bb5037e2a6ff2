//! In-process implementations of the repository traits.
//!
//! Used when no `DATABASE_URL` is configured and by the test suite. Ids are
//! assigned from a per-store counter starting at 1, like a `BIGSERIAL` column.

use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::{
    articles::{
        repo::ArticleRepository,
        repo_types::{Article, NewArticle},
    },
    auth::{
        repo::{RefreshTokenRepository, UserRepository},
        repo_types::{RefreshToken, User},
    },
};

struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    table: RwLock<Table<User>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<User>> {
        let mut table = self.table.write().await;
        if table.rows.values().any(|u| u.email == email) {
            return Ok(None);
        }
        let user = User {
            id: table.next_id(),
            email: email.to_owned(),
            password_hash: password_hash.to_owned(),
            created_at: OffsetDateTime::now_utc(),
        };
        table.rows.insert(user.id, user.clone());
        Ok(Some(user))
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let table = self.table.read().await;
        Ok(table.rows.values().find(|u| u.email == email).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryRefreshTokenRepository {
    table: RwLock<Table<RefreshToken>>,
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn upsert(&self, user_id: i64, token: &str) -> anyhow::Result<RefreshToken> {
        let mut table = self.table.write().await;
        if let Some(row) = table.rows.values_mut().find(|r| r.user_id == user_id) {
            row.refresh_token = token.to_owned();
            return Ok(row.clone());
        }
        let row = RefreshToken {
            id: table.next_id(),
            user_id,
            refresh_token: token.to_owned(),
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_token(&self, token: &str) -> anyhow::Result<Option<RefreshToken>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .find(|r| r.refresh_token == token)
            .cloned())
    }

    async fn delete_by_user_id(&self, user_id: i64) -> anyhow::Result<()> {
        self.table
            .write()
            .await
            .rows
            .retain(|_, r| r.user_id != user_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryArticleRepository {
    table: RwLock<Table<Article>>,
}

#[async_trait]
impl ArticleRepository for InMemoryArticleRepository {
    async fn create(&self, article: NewArticle) -> anyhow::Result<Article> {
        let mut table = self.table.write().await;
        let now = OffsetDateTime::now_utc();
        let row = Article {
            id: table.next_id(),
            title: article.title,
            content: article.content,
            author: article.author,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_all(&self) -> anyhow::Result<Vec<Article>> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Article>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn update(
        &self,
        id: i64,
        title: &str,
        content: &str,
    ) -> anyhow::Result<Option<Article>> {
        let mut table = self.table.write().await;
        Ok(table.rows.get_mut(&id).map(|a| {
            a.title = title.to_owned();
            a.content = content.to_owned();
            a.updated_at = OffsetDateTime::now_utc();
            a.clone()
        }))
    }

    async fn delete_by_id(&self, id: i64) -> anyhow::Result<bool> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}
