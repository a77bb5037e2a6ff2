use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::{RefreshTokenRepository, UserRepository},
        repo_types::User,
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues, validates and exchanges JWTs.
#[derive(Clone)]
pub struct TokenService {
    keys: JwtKeys,
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            JwtKeys::from_ref(state),
            state.users.clone(),
            state.refresh_tokens.clone(),
        )
    }
}

impl TokenService {
    pub fn new(
        keys: JwtKeys,
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenRepository>,
    ) -> Self {
        Self {
            keys,
            users,
            refresh_tokens,
        }
    }

    pub fn issue_access_token(&self, principal: &AuthUser) -> AppResult<String> {
        Ok(self.keys.sign_access(principal.id, &principal.email)?)
    }

    /// Signs a refresh token and stores it as the user's only one.
    pub async fn issue_refresh_token(&self, user_id: i64) -> AppResult<String> {
        let token = self.keys.sign_refresh(user_id)?;
        self.refresh_tokens.upsert(user_id, &token).await?;
        Ok(token)
    }

    pub async fn issue_pair(&self, user: &User) -> AppResult<TokenPair> {
        let access_token = self.issue_access_token(&AuthUser::from(user))?;
        let refresh_token = self.issue_refresh_token(user.id).await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Resolves a bearer access token to its principal.
    pub fn validate(&self, token: &str) -> AppResult<AuthUser> {
        let claims = self
            .keys
            .verify_access(token)
            .map_err(|_| AppError::InvalidToken)?;
        let id = claims.user_id().ok_or(AppError::InvalidToken)?;
        let email = claims.email.ok_or(AppError::InvalidToken)?;
        Ok(AuthUser { id, email })
    }

    /// Exchanges a stored refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<String> {
        let claims = self
            .keys
            .verify_refresh(refresh_token)
            .map_err(|_| AppError::InvalidToken)?;

        let user_id = claims.user_id().ok_or(AppError::InvalidToken)?;
        let stored = self
            .refresh_tokens
            .find_by_token(refresh_token)
            .await?
            .ok_or(AppError::UnknownToken)?;
        if stored.user_id != user_id {
            warn!(user_id, stored_user_id = stored.user_id, "refresh token subject mismatch");
            return Err(AppError::UnknownToken);
        }

        let user = self
            .users
            .find_by_id(stored.user_id)
            .await?
            .ok_or(AppError::UnknownToken)?;

        let token = self.issue_access_token(&AuthUser::from(&user))?;
        info!(user_id = user.id, "access token refreshed");
        Ok(token)
    }

    pub async fn revoke(&self, user_id: i64) -> AppResult<()> {
        self.refresh_tokens.delete_by_user_id(user_id).await?;
        Ok(())
    }
}

/// Signup and credential checks.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone())
    }
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    pub async fn signup(&self, email: &str, password: &str) -> AppResult<User> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::Validation("Invalid email".into()));
        }
        if password.len() < 8 {
            warn!("password too short");
            return Err(AppError::Validation("Password too short".into()));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AppError::EmailTaken);
        }

        let hash = hash_password(password)?;
        // A concurrent signup may have claimed the email while we were hashing.
        let Some(user) = self.users.create(&email, &hash).await? else {
            warn!(email = %email, "email already registered");
            return Err(AppError::EmailTaken);
        };
        info!(user_id = user.id, email = %user.email, "user registered");
        Ok(user)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<User> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }
        info!(user_id = user.id, "user authenticated");
        Ok(user)
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<User> {
        self.users.find_by_id(id).await?.ok_or(AppError::UserNotFound)
    }
}
