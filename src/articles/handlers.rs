use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    articles::{
        dto::{ArticleRequest, ArticleResponse},
        services::ArticleService,
    },
    auth::AuthUser,
    error::AppResult,
    state::AppState,
};

pub fn article_routes() -> Router<AppState> {
    Router::new()
        .route("/api/articles", get(find_all_articles).post(add_article))
        .route(
            "/api/articles/:id",
            get(find_article).put(update_article).delete(delete_article),
        )
}

#[instrument(skip(articles, payload))]
pub async fn add_article(
    State(articles): State<ArticleService>,
    principal: AuthUser,
    Json(payload): Json<ArticleRequest>,
) -> AppResult<(StatusCode, Json<ArticleResponse>)> {
    let article = articles.create(payload, &principal).await?;
    Ok((StatusCode::CREATED, Json(article.into())))
}

#[instrument(skip(articles))]
pub async fn find_all_articles(
    State(articles): State<ArticleService>,
) -> AppResult<Json<Vec<ArticleResponse>>> {
    let all = articles.find_all().await?;
    Ok(Json(all.into_iter().map(ArticleResponse::from).collect()))
}

#[instrument(skip(articles))]
pub async fn find_article(
    State(articles): State<ArticleService>,
    Path(id): Path<i64>,
) -> AppResult<Json<ArticleResponse>> {
    let article = articles.find_by_id(id).await?;
    Ok(Json(article.into()))
}

#[instrument(skip(articles, payload))]
pub async fn update_article(
    State(articles): State<ArticleService>,
    principal: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<ArticleRequest>,
) -> AppResult<Json<ArticleResponse>> {
    let article = articles.update(id, payload, &principal).await?;
    Ok(Json(article.into()))
}

#[instrument(skip(articles))]
pub async fn delete_article(
    State(articles): State<ArticleService>,
    principal: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    articles.delete(id, &principal).await?;
    Ok(StatusCode::OK)
}
