use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use serde::Serialize;

use super::{repo_types::User, services::TokenService, session};
use crate::{error::AppError, state::AppState};

/// The authenticated principal, resolved from a bearer token or the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // A present Authorization header wins over the cookie.
        if let Some(auth) = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
        {
            let token = auth
                .strip_prefix("Bearer ")
                .or_else(|| auth.strip_prefix("bearer "))
                .ok_or(AppError::InvalidToken)?;
            return TokenService::from_ref(state).validate(token);
        }

        let id = session::session_id(&parts.headers).ok_or(AppError::Unauthenticated)?;
        let s = state
            .sessions
            .get(id)
            .await
            .ok_or(AppError::Unauthenticated)?;
        Ok(AuthUser {
            id: s.user_id,
            email: s.email,
        })
    }
}
