use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    articles::repo::{ArticleRepository, PgArticleRepository},
    auth::{
        repo::{
            PgRefreshTokenRepository, PgUserRepository, RefreshTokenRepository, UserRepository,
        },
        session::SessionStore,
    },
    config::AppConfig,
    memory::{InMemoryArticleRepository, InMemoryRefreshTokenRepository, InMemoryUserRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub sessions: SessionStore,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let Some(database_url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set; using in-memory stores, data is lost on exit");
            return Ok(Self::in_memory(config));
        };

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        Ok(Self {
            users: Arc::new(PgUserRepository::new(db.clone())),
            articles: Arc::new(PgArticleRepository::new(db.clone())),
            refresh_tokens: Arc::new(PgRefreshTokenRepository::new(db)),
            sessions: SessionStore::new(&config.session),
            config,
        })
    }

    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::default()),
            articles: Arc::new(InMemoryArticleRepository::default()),
            refresh_tokens: Arc::new(InMemoryRefreshTokenRepository::default()),
            sessions: SessionStore::new(&config.session),
            config,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            session: crate::config::SessionConfig {
                ttl_minutes: 30,
                cookie_secure: false,
            },
        });
        Self::in_memory(config)
    }
}
