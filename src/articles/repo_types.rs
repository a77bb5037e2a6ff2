use sqlx::FromRow;
use time::OffsetDateTime;

/// Article record in the database.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: String, // author's email
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields of an article before it has an id.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub author: String,
}
