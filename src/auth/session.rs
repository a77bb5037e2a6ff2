//! Server-side login sessions referenced by an HttpOnly cookie.

use std::{collections::HashMap, sync::Arc};

use axum::http::{header, HeaderMap};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::config::SessionConfig;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub email: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct SessionStore {
    ttl: Duration,
    secure: bool,
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new(cfg: &SessionConfig) -> Self {
        Self {
            ttl: Duration::minutes(cfg.ttl_minutes),
            secure: cfg.cookie_secure,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Starts a session. Sessions that have already expired are dropped first.
    pub async fn create(&self, user_id: i64, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let session = Session {
            user_id,
            email: email.to_owned(),
            expires_at: now + self.ttl,
        };
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        let pruned = before - sessions.len();
        sessions.insert(id, session);
        debug!(user_id, pruned, "session created");
        id
    }

    /// Returns a live session and slides its expiry; expired ones are evicted.
    pub async fn get(&self, id: Uuid) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let now = OffsetDateTime::now_utc();
        match sessions.get_mut(&id) {
            Some(s) if s.expires_at > now => {
                s.expires_at = now + self.ttl;
                Some(s.clone())
            }
            Some(_) => {
                sessions.remove(&id);
                debug!(session_id = %id, "session expired");
                None
            }
            None => None,
        }
    }

    pub async fn remove(&self, id: Uuid) -> Option<Session> {
        self.sessions.write().await.remove(&id)
    }

    /// Set-Cookie header value for a new session.
    pub fn set_cookie(&self, id: Uuid) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            SESSION_COOKIE,
            id,
            self.ttl.whole_seconds()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn clear_cookie(&self) -> String {
        format!("{}=; HttpOnly; Path=/; Max-Age=0", SESSION_COOKIE)
    }
}

/// Session id from the request's Cookie header, if present and well formed.
pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}
