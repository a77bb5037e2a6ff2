use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::articles::repo_types::{Article, NewArticle};

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn create(&self, article: NewArticle) -> anyhow::Result<Article>;
    async fn find_all(&self) -> anyhow::Result<Vec<Article>>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Article>>;
    /// Returns `None` when no article has this id.
    async fn update(&self, id: i64, title: &str, content: &str)
        -> anyhow::Result<Option<Article>>;
    /// Returns whether a row was deleted.
    async fn delete_by_id(&self, id: i64) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgArticleRepository {
    db: PgPool,
}

impl PgArticleRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ArticleRepository for PgArticleRepository {
    async fn create(&self, article: NewArticle) -> anyhow::Result<Article> {
        let row = sqlx::query_as::<_, Article>(
            r#"
            INSERT INTO articles (title, content, author)
            VALUES ($1, $2, $3)
            RETURNING id, title, content, author, created_at, updated_at
            "#,
        )
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.author)
        .fetch_one(&self.db)
        .await
        .context("insert article")?;
        Ok(row)
    }

    async fn find_all(&self) -> anyhow::Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, title, content, author, created_at, updated_at
            FROM articles
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list articles")?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Article>> {
        let row = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, title, content, author, created_at, updated_at
            FROM articles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find article by id")?;
        Ok(row)
    }

    async fn update(
        &self,
        id: i64,
        title: &str,
        content: &str,
    ) -> anyhow::Result<Option<Article>> {
        let row = sqlx::query_as::<_, Article>(
            r#"
            UPDATE articles
               SET title = $2, content = $3, updated_at = now()
             WHERE id = $1
            RETURNING id, title, content, author, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(content)
        .fetch_optional(&self.db)
        .await
        .context("update article")?;
        Ok(row)
    }

    async fn delete_by_id(&self, id: i64) -> anyhow::Result<bool> {
        let deleted = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete article")?
            .rows_affected();
        Ok(deleted > 0)
    }
}
