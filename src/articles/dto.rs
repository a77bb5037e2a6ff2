use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::articles::repo_types::Article;

/// Body of both create and update requests.
#[derive(Debug, Deserialize)]
pub struct ArticleRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Article> for ArticleResponse {
    fn from(a: Article) -> Self {
        Self {
            id: a.id,
            title: a.title,
            content: a.content,
            author: a.author,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}
