use anyhow::Context;
use serde::Deserialize;

/// Largest accepted TTL, ten years. Keeps expiry arithmetic far from overflow.
const MAX_TTL_MINUTES: i64 = 60 * 24 * 365 * 10;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub ttl_minutes: i64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Postgres connection string. Without one the app runs on in-memory stores.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "blog".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "blog-users".into()),
            ttl_minutes: ttl_from_env("JWT_TTL_MINUTES", 120)?,
            refresh_ttl_minutes: ttl_from_env("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14)?,
        };
        let session = SessionConfig {
            ttl_minutes: ttl_from_env("SESSION_TTL_MINUTES", 30)?,
            cookie_secure: env_parse("COOKIE_SECURE").unwrap_or(false),
        };
        Ok(Self {
            database_url,
            jwt,
            session,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

fn ttl_from_env(key: &str, default: i64) -> anyhow::Result<i64> {
    match std::env::var(key) {
        Ok(raw) => parse_ttl(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_ttl(key: &str, raw: &str) -> anyhow::Result<i64> {
    let minutes: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a whole number of minutes"))?;
    anyhow::ensure!(
        (1..=MAX_TTL_MINUTES).contains(&minutes),
        "{key} must be between 1 and {MAX_TTL_MINUTES} minutes, got {minutes}"
    );
    Ok(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_accepts_values_in_range() {
        assert_eq!(parse_ttl("SESSION_TTL_MINUTES", " 45 ").unwrap(), 45);
        assert_eq!(
            parse_ttl("SESSION_TTL_MINUTES", &MAX_TTL_MINUTES.to_string()).unwrap(),
            MAX_TTL_MINUTES
        );
    }

    #[test]
    fn ttl_rejects_overflowing_and_malformed_values() {
        let err = parse_ttl("JWT_TTL_MINUTES", &i64::MAX.to_string()).unwrap_err();
        assert!(err.to_string().contains("JWT_TTL_MINUTES"));
        assert!(parse_ttl("JWT_TTL_MINUTES", "0").is_err());
        assert!(parse_ttl("JWT_TTL_MINUTES", "-5").is_err());
        let err = parse_ttl("SESSION_TTL_MINUTES", "soon").unwrap_err();
        assert!(err.to_string().contains("SESSION_TTL_MINUTES"));
    }
}
