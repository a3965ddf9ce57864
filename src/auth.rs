//! Password hashing and cookie-based session authentication.
//!
//! Passwords are stored as `{salt}:{sha256(salt + password)}` hex. Sessions
//! live in memory; the `session_id` cookie carries an opaque random token.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Session, User};
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session_id";

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = digest_with_salt(&salt, password);
    format!("{salt}:{digest}")
}

/// Check a password against a stored `{salt}:{digest}` hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, digest)) = stored.split_once(':') else {
        return false;
    };
    digest_with_salt(salt, password) == digest
}

fn digest_with_salt(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create a new session for a user with the given lifetime.
pub fn new_session(user_id: Uuid, ttl_secs: u64) -> Session {
    let now = Utc::now();
    Session {
        token: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
        user_id,
        created_at: now,
        expires_at: now + Duration::seconds(ttl_secs as i64),
    }
}

pub fn session_expired(session: &Session) -> bool {
    session.expires_at <= Utc::now()
}

/// Build the `Set-Cookie` value for a freshly created session.
pub fn session_cookie(token: &str, ttl_secs: u64) -> String {
    format!("{SESSION_COOKIE}={token}; HttpOnly; Path=/; Max-Age={ttl_secs}; SameSite=Lax")
}

/// `Set-Cookie` value that clears the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax")
}

/// Pull the session token out of a `Cookie` header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
    })
}

/// Extractor for the authenticated user. Rejects with 401 when the cookie is
/// missing, unknown, or expired, and 403 when the account is deactivated.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let unauthorized = || (StatusCode::UNAUTHORIZED, "Not authenticated".to_string());

        let token = parts
            .headers
            .get(axum::http::header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(token_from_cookie_header)
            .ok_or_else(unauthorized)?;

        let user_id = {
            let sessions = state.sessions.read();
            let session = sessions.get(token).ok_or_else(unauthorized)?;
            if session_expired(session) {
                return Err(unauthorized());
            }
            session.user_id
        };

        let user = {
            let users = state.users.read();
            users
                .iter()
                .find(|u| u.id == user_id)
                .cloned()
                .ok_or_else(unauthorized)?
        };

        if !user.is_active {
            return Err((StatusCode::FORBIDDEN, "Account is disabled".to_string()));
        }

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_round_trip() {
        let hash = hash_password("hunter2");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same-password");
        let b = hash_password("same-password");
        assert_ne!(a, b);
        assert!(verify_password("same-password", &a));
        assert!(verify_password("same-password", &b));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "no-colon-here"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn test_session_expiry() {
        let fresh = new_session(Uuid::new_v4(), 3600);
        assert!(!session_expired(&fresh));

        let mut stale = new_session(Uuid::new_v4(), 3600);
        stale.expires_at = Utc::now() - Duration::seconds(1);
        assert!(session_expired(&stale));
    }

    #[test]
    fn test_token_from_cookie_header() {
        assert_eq!(
            token_from_cookie_header("theme=dark; session_id=abc123; lang=en"),
            Some("abc123")
        );
        assert_eq!(token_from_cookie_header("session_id=xyz"), Some("xyz"));
        assert_eq!(token_from_cookie_header("theme=dark"), None);
        assert_eq!(token_from_cookie_header("session_id="), None);
        assert_eq!(token_from_cookie_header(""), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok", 600);
        assert!(cookie.contains("session_id=tok"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=600"));
    }
}
