use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, warn};

use crate::{
    articles::{
        dto::ArticleRequest,
        repo::ArticleRepository,
        repo_types::{Article, NewArticle},
    },
    auth::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

/// Only the recorded author may mutate an article.
pub fn authorize(article: &Article, principal: &AuthUser) -> AppResult<()> {
    if article.author != principal.email {
        warn!(article_id = article.id, user_id = principal.id, "not the article author");
        return Err(AppError::NotAuthorized);
    }
    Ok(())
}

fn validate(req: &ArticleRequest) -> AppResult<()> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be blank".into()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ArticleService {
    articles: Arc<dyn ArticleRepository>,
}

impl FromRef<AppState> for ArticleService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.articles.clone())
    }
}

impl ArticleService {
    pub fn new(articles: Arc<dyn ArticleRepository>) -> Self {
        Self { articles }
    }

    pub async fn create(&self, req: ArticleRequest, principal: &AuthUser) -> AppResult<Article> {
        validate(&req)?;
        let article = self
            .articles
            .create(NewArticle {
                title: req.title,
                content: req.content,
                author: principal.email.clone(),
            })
            .await?;
        info!(article_id = article.id, user_id = principal.id, "article created");
        Ok(article)
    }

    pub async fn find_all(&self) -> AppResult<Vec<Article>> {
        Ok(self.articles.find_all().await?)
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Article> {
        self.articles
            .find_by_id(id)
            .await?
            .ok_or(AppError::ArticleNotFound(id))
    }

    pub async fn update(
        &self,
        id: i64,
        req: ArticleRequest,
        principal: &AuthUser,
    ) -> AppResult<Article> {
        let article = self.find_by_id(id).await?;
        authorize(&article, principal)?;
        validate(&req)?;
        let updated = self
            .articles
            .update(id, &req.title, &req.content)
            .await?
            .ok_or(AppError::ArticleNotFound(id))?;
        info!(article_id = id, user_id = principal.id, "article updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64, principal: &AuthUser) -> AppResult<()> {
        let article = self.find_by_id(id).await?;
        authorize(&article, principal)?;
        if !self.articles.delete_by_id(id).await? {
            return Err(AppError::ArticleNotFound(id));
        }
        info!(article_id = id, user_id = principal.id, "article deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ArticleService {
        ArticleService::from_ref(&AppState::fake())
    }

    fn author() -> AuthUser {
        AuthUser {
            id: 1,
            email: "author@email.com".into(),
        }
    }

    fn stranger() -> AuthUser {
        AuthUser {
            id: 2,
            email: "stranger@email.com".into(),
        }
    }

    fn request(title: &str, content: &str) -> ArticleRequest {
        ArticleRequest {
            title: title.into(),
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn create_then_find() {
        let svc = service();
        let created = svc.create(request("title", "content"), &author()).await.unwrap();
        assert_eq!(created.author, "author@email.com");

        let found = svc.find_by_id(created.id).await.unwrap();
        assert_eq!(found.title, "title");
        assert_eq!(found.content, "content");

        let all = svc.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], found);
    }

    #[tokio::test]
    async fn missing_article_is_not_found() {
        let svc = service();
        assert!(matches!(
            svc.find_by_id(99).await.unwrap_err(),
            AppError::ArticleNotFound(99)
        ));
        assert!(matches!(
            svc.update(99, request("t", "c"), &author()).await.unwrap_err(),
            AppError::ArticleNotFound(99)
        ));
        assert!(matches!(
            svc.delete(99, &author()).await.unwrap_err(),
            AppError::ArticleNotFound(99)
        ));
    }

    #[tokio::test]
    async fn author_can_update() {
        let svc = service();
        let a = svc.create(request("title", "content"), &author()).await.unwrap();
        let updated = svc
            .update(a.id, request("new title", "new content"), &author())
            .await
            .unwrap();
        assert_eq!(updated.title, "new title");
        assert_eq!(updated.content, "new content");
        assert!(updated.updated_at >= a.updated_at);
        assert_eq!(svc.find_by_id(a.id).await.unwrap().title, "new title");
    }

    #[tokio::test]
    async fn non_author_cannot_update_or_delete() {
        let svc = service();
        let a = svc.create(request("title", "content"), &author()).await.unwrap();

        let err = svc
            .update(a.id, request("hijacked", "x"), &stranger())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized));
        let err = svc.delete(a.id, &stranger()).await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized));

        assert_eq!(svc.find_by_id(a.id).await.unwrap().title, "title");
    }

    #[tokio::test]
    async fn delete_empties_the_list() {
        let svc = service();
        let a = svc.create(request("title", "content"), &author()).await.unwrap();
        svc.delete(a.id, &author()).await.unwrap();
        assert!(svc.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let svc = service();
        let err = svc.create(request("   ", "content"), &author()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn update_checks_existence_and_author_before_input() {
        let svc = service();
        let a = svc.create(request("title", "content"), &author()).await.unwrap();

        assert!(matches!(
            svc.update(99, request(" ", "c"), &author()).await.unwrap_err(),
            AppError::ArticleNotFound(99)
        ));
        assert!(matches!(
            svc.update(a.id, request(" ", "c"), &stranger()).await.unwrap_err(),
            AppError::NotAuthorized
        ));
        assert!(matches!(
            svc.update(a.id, request(" ", "c"), &author()).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn authorize_compares_author_with_principal() {
        let now = time::OffsetDateTime::now_utc();
        let article = Article {
            id: 1,
            title: "t".into(),
            content: "c".into(),
            author: "author@email.com".into(),
            created_at: now,
            updated_at: now,
        };
        assert!(authorize(&article, &author()).is_ok());
        assert!(matches!(
            authorize(&article, &stranger()),
            Err(AppError::NotAuthorized)
        ));
    }
}
