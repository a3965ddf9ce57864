//! Account signup, login, logout, the current-user endpoint, and the OAuth
//! authorization-code login flow.

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect};
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::ApiError;
use crate::auth::{
    self, clear_session_cookie, hash_password, session_cookie, token_from_cookie_header,
    verify_password, CurrentUser,
};
use crate::config::OauthConfig;
use crate::models::{LoginRequest, SignupRequest, User, UserResponse};
use crate::state::AppState;

/// How long an issued OAuth state token stays redeemable.
const OAUTH_STATE_TTL_SECS: i64 = 600;

fn bad_request(msg: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, msg.to_string())
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim();
    let email = req.email.trim().to_lowercase();

    if username.is_empty() || username.len() > 64 {
        return Err(bad_request("Username must be 1-64 characters"));
    }
    if !email.contains('@') || email.len() > 254 {
        return Err(bad_request("A valid email address is required"));
    }
    if req.password.len() < 8 {
        return Err(bad_request("Password must be at least 8 characters"));
    }

    let user = {
        let mut users = state.users.write();
        let taken = users
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(username) || u.email == email);
        if taken {
            return Err((
                StatusCode::CONFLICT,
                "Username or email is already registered".to_string(),
            ));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email,
            password_hash: hash_password(&req.password),
            is_active: true,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        user
    };

    state
        .persist()
        .map_err(|e| internal_error("Failed to save account", e))?;

    let session = auth::new_session(user.id, state.config.session_ttl_secs);
    let cookie = session_cookie(&session.token, state.config.session_ttl_secs);
    state
        .sessions
        .write()
        .insert(session.token.clone(), session);

    tracing::info!("New account: {}", user.username);

    Ok((
        StatusCode::CREATED,
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(UserResponse::from(&user)),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || {
        (
            StatusCode::UNAUTHORIZED,
            "Invalid username or password".to_string(),
        )
    };

    let identity = req.identity.trim().to_lowercase();
    let user = {
        let users = state.users.read();
        users
            .iter()
            .find(|u| u.username.to_lowercase() == identity || u.email == identity)
            .cloned()
            .ok_or_else(invalid)?
    };

    if !verify_password(&req.password, &user.password_hash) {
        return Err(invalid());
    }
    if !user.is_active {
        return Err((StatusCode::FORBIDDEN, "Account is disabled".to_string()));
    }

    state.prune_sessions();
    let session = auth::new_session(user.id, state.config.session_ttl_secs);
    let cookie = session_cookie(&session.token, state.config.session_ttl_secs);
    state
        .sessions
        .write()
        .insert(session.token.clone(), session);

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(UserResponse::from(&user)),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(token) = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(token_from_cookie_header)
    {
        state.sessions.write().remove(token);
    }

    (
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie())]),
        StatusCode::NO_CONTENT,
    )
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

pub(super) fn internal_error(msg: &str, err: anyhow::Error) -> ApiError {
    tracing::error!("{msg}: {err:#}");
    (StatusCode::INTERNAL_SERVER_ERROR, msg.to_string())
}

// ─── OAuth login ─────────────────────────────────────────

/// Redirect the browser to the provider's consent screen, carrying a
/// one-time state token for callback validation.
pub async fn oauth_login(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let oauth = oauth_config(&state)?.clone();

    let state_token = Uuid::new_v4().simple().to_string();
    state
        .oauth_states
        .write()
        .insert(state_token.clone(), Utc::now());

    let url = authorize_url(&oauth, &state_token)
        .map_err(|e| internal_error("Failed to build authorization URL", e))?;
    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct OauthCallbackParams {
    pub code: String,
    pub state: String,
}

/// Provider redirects back here: validate the state token, exchange the
/// code, fetch the profile, and sign the user in (creating the account on
/// first login).
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<OauthCallbackParams>,
) -> Result<impl IntoResponse, ApiError> {
    let oauth = oauth_config(&state)?.clone();

    if !redeem_oauth_state(&state, &params.state) {
        return Err((
            StatusCode::BAD_REQUEST,
            "Unknown or expired OAuth state".to_string(),
        ));
    }

    let profile = fetch_profile(&state, &oauth, &params.code)
        .await
        .map_err(|e| {
            tracing::error!("OAuth code exchange failed: {e:#}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "OAuth provider is unavailable".to_string(),
            )
        })?;

    let user = upsert_oauth_user(&state, profile)?;
    state
        .persist()
        .map_err(|e| internal_error("Failed to save account", e))?;

    let session = auth::new_session(user.id, state.config.session_ttl_secs);
    let cookie = session_cookie(&session.token, state.config.session_ttl_secs);
    state
        .sessions
        .write()
        .insert(session.token.clone(), session);

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to("/"),
    ))
}

/// One-shot redemption of a state token: expired entries are swept and a
/// token can only be redeemed once.
fn redeem_oauth_state(state: &AppState, token: &str) -> bool {
    let mut states = state.oauth_states.write();
    let cutoff = Utc::now() - Duration::seconds(OAUTH_STATE_TTL_SECS);
    states.retain(|_, issued| *issued > cutoff);
    states.remove(token).is_some()
}

fn oauth_config(state: &AppState) -> Result<&OauthConfig, ApiError> {
    state.config.oauth.as_ref().ok_or((
        StatusCode::NOT_FOUND,
        "OAuth login is not configured".to_string(),
    ))
}

fn authorize_url(oauth: &OauthConfig, state_token: &str) -> anyhow::Result<String> {
    let url = reqwest::Url::parse_with_params(
        &oauth.auth_url,
        &[
            ("response_type", "code"),
            ("client_id", oauth.client_id.as_str()),
            ("redirect_uri", oauth.redirect_url.as_str()),
            ("scope", oauth.scope.as_str()),
            ("state", state_token),
        ],
    )
    .context("Invalid OAuth authorization URL")?;
    Ok(url.to_string())
}

#[derive(Debug, Deserialize)]
struct OauthProfile {
    email: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Authorization-code exchange followed by a userinfo fetch.
async fn fetch_profile(
    state: &AppState,
    oauth: &OauthConfig,
    code: &str,
) -> anyhow::Result<OauthProfile> {
    let resp = state
        .http_client
        .post(&oauth.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
            ("redirect_uri", oauth.redirect_url.as_str()),
        ])
        .send()
        .await
        .context("Failed to call OAuth token endpoint")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OAuth token endpoint returned {status}: {body}");
    }
    let token: TokenResponse = resp
        .json()
        .await
        .context("Failed to parse OAuth token response")?;

    let resp = state
        .http_client
        .get(&oauth.userinfo_url)
        .header(
            "Authorization",
            format!("Bearer {}", token.access_token),
        )
        .send()
        .await
        .context("Failed to call userinfo endpoint")?;

    if !resp.status().is_success() {
        anyhow::bail!("Userinfo endpoint returned {}", resp.status());
    }
    resp.json().await.context("Failed to parse userinfo response")
}

fn upsert_oauth_user(state: &AppState, profile: OauthProfile) -> Result<User, ApiError> {
    let email = profile.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(bad_request("OAuth provider returned no usable email"));
    }

    let mut users = state.users.write();
    if let Some(user) = users.iter().find(|u| u.email == email) {
        if !user.is_active {
            return Err((StatusCode::FORBIDDEN, "Account is disabled".to_string()));
        }
        return Ok(user.clone());
    }

    let base = profile
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| email.split('@').next().unwrap_or("student").to_string());
    let username = unique_username(users.as_slice(), &base);

    let user = User {
        id: Uuid::new_v4(),
        username,
        email,
        // Random credential; these accounts sign in through the provider only
        password_hash: hash_password(&Uuid::new_v4().to_string()),
        is_active: true,
        created_at: Utc::now(),
    };
    users.push(user.clone());
    tracing::info!("New account via OAuth: {}", user.username);
    Ok(user)
}

fn unique_username(users: &[User], base: &str) -> String {
    let base = if base.trim().is_empty() { "student" } else { base };
    if !users.iter().any(|u| u.username.eq_ignore_ascii_case(base)) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}{n}");
        if !users
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(&candidate))
        {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth() -> OauthConfig {
        OauthConfig {
            client_id: "client-abc".into(),
            client_secret: "secret".into(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".into(),
            redirect_url: "http://localhost:8000/api/auth/oauth/callback".into(),
            scope: "openid email profile".into(),
        }
    }

    fn user_named(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.into(),
            email: format!("{name}@example.com"),
            password_hash: "s:h".into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_authorize_url_carries_params() {
        let url = authorize_url(&oauth(), "state123").unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client-abc"));
        assert!(url.contains("state=state123"));
        // redirect_uri must be percent-encoded
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8000"));
    }

    #[test]
    fn test_authorize_url_rejects_malformed_endpoint() {
        let mut cfg = oauth();
        cfg.auth_url = "not a url".into();
        assert!(authorize_url(&cfg, "s").is_err());
    }

    #[test]
    fn test_unique_username_suffixes_collisions() {
        let users = vec![user_named("ada"), user_named("ada2")];
        assert_eq!(unique_username(&users, "ada"), "ada3");
        assert_eq!(unique_username(&users, "grace"), "grace");
        assert_eq!(unique_username(&users, "  "), "student");
    }

    #[test]
    fn test_oauth_profile_parses_minimal_userinfo() {
        let profile: OauthProfile =
            serde_json::from_str(r#"{"sub": "123", "email": "ada@example.com"}"#).unwrap();
        assert_eq!(profile.email, "ada@example.com");
        assert!(profile.name.is_none());
    }

    #[test]
    fn test_oauth_state_redeems_once_and_expires() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::Config {
            data_dir: dir.path().to_path_buf(),
            ..crate::config::Config::default()
        };
        let state = AppState::new(config).unwrap();

        state
            .oauth_states
            .write()
            .insert("fresh".to_string(), Utc::now());
        state.oauth_states.write().insert(
            "stale".to_string(),
            Utc::now() - Duration::seconds(OAUTH_STATE_TTL_SECS + 1),
        );

        assert!(redeem_oauth_state(&state, "fresh"));
        // Second redemption of the same token fails
        assert!(!redeem_oauth_state(&state, "fresh"));
        assert!(!redeem_oauth_state(&state, "stale"));
        assert!(!redeem_oauth_state(&state, "never-issued"));
    }

    #[test]
    fn test_upsert_reuses_account_by_email() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::Config {
            data_dir: dir.path().to_path_buf(),
            ..crate::config::Config::default()
        };
        let state = AppState::new(config).unwrap();
        let existing = user_named("ada");
        let existing_id = existing.id;
        state.users.write().push(existing);

        let user = upsert_oauth_user(
            &state,
            OauthProfile {
                email: "ADA@example.com".into(),
                name: Some("Ada L".into()),
            },
        )
        .unwrap();
        assert_eq!(user.id, existing_id);
        assert_eq!(state.users.read().len(), 1);

        let created = upsert_oauth_user(
            &state,
            OauthProfile {
                email: "new@example.com".into(),
                name: None,
            },
        )
        .unwrap();
        assert_eq!(created.username, "new");
        assert_eq!(state.users.read().len(), 2);
    }
}
