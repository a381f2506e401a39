//! Sign-in sessions carried by the `nolivos_auth_token` cookie.
//!
//! Tokens are opaque random strings. The table only keeps their SHA-256, so
//! a dump of it cannot be replayed as a cookie.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

pub const AUTH_COOKIE: &str = "nolivos_auth_token";

/// One week, also used as the cookie's `Max-Age`.
pub const AUTH_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);

const CLEARED: &str = "nolivos_auth_token=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0";
const CLEARED_SECURE: &str =
    "nolivos_auth_token=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0; Secure";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

pub struct AuthSessions {
    sessions: RwLock<HashMap<String, AuthSession>>,
    ttl: Duration,
}

fn token_key(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

impl AuthSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session for `user_id` and return its cookie token. Expired
    /// sessions are swept on the way.
    pub async fn issue(&self, user_id: i64) -> String {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let now = Utc::now();
        let expires_at = now + TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::days(7));

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(
            token_key(&token),
            AuthSession {
                user_id,
                expires_at,
            },
        );
        token
    }

    /// `None` for unknown or expired tokens.
    pub async fn lookup(&self, token: &str) -> Option<AuthSession> {
        let key = token_key(token);
        let now = Utc::now();
        match self.sessions.read().await.get(&key) {
            Some(session) if session.expires_at > now => return Some(*session),
            Some(_) => {}
            None => return None,
        }
        self.sessions.write().await.remove(&key);
        None
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions
            .write()
            .await
            .remove(&token_key(token))
            .is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// The auth token inside a `Cookie` header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{AUTH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn cleared_cookie(secure: bool) -> &'static str {
    if secure { CLEARED_SECURE } else { CLEARED }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn issued_tokens_resolve_until_revoked() {
        let auth = AuthSessions::new(AUTH_TTL);
        let token = auth.issue(7).await;
        assert_eq!(token.len(), 64);
        assert_eq!(auth.lookup(&token).await.map(|s| s.user_id), Some(7));
        assert_eq!(auth.lookup("not-a-token").await, None);

        assert!(auth.revoke(&token).await);
        assert!(!auth.revoke(&token).await);
        assert_eq!(auth.lookup(&token).await, None);
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected_and_swept() {
        let auth = AuthSessions::new(Duration::ZERO);
        let stale = auth.issue(1).await;
        assert_eq!(auth.lookup(&stale).await, None);
        assert_eq!(auth.len().await, 0);

        auth.issue(2).await;
        auth.issue(3).await;
        assert_eq!(auth.len().await, 1);
    }

    #[test]
    fn cookie_header_parsing() {
        assert_eq!(
            token_from_cookie_header("theme=dark; nolivos_auth_token=abc123; other=1"),
            Some("abc123")
        );
        assert_eq!(token_from_cookie_header("nolivos_auth_token="), None);
        assert_eq!(token_from_cookie_header("x_nolivos_auth_token=abc"), None);
        assert_eq!(token_from_cookie_header(""), None);
    }

    #[test]
    fn cookie_attributes() {
        assert_eq!(
            session_cookie("t0k", Duration::from_secs(60), false),
            "nolivos_auth_token=t0k; Path=/; HttpOnly; SameSite=Strict; Max-Age=60"
        );
        assert!(session_cookie("t0k", AUTH_TTL, true).ends_with("Max-Age=604800; Secure"));
        assert!(cleared_cookie(false).contains("Max-Age=0"));
    }
}
