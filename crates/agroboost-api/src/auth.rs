//! Account endpoints and bearer-token authentication.
//!
//! Passwords are bcrypt-hashed at rest. Sessions are HMAC-SHA256-signed
//! bearer tokens carrying the user id and an expiry, which is all the
//! owner-scoping of the protected endpoints needs.

use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::routing::post;
use axum::{async_trait, Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use agroboost_storage::User;

use crate::models::{ok, ErrorResponse, HandlerResult};
use crate::state::ServerState;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies bearer tokens.
pub struct TokenKeys {
    secret: Vec<u8>,
    validity: Duration,
}

impl TokenKeys {
    /// Create token keys with a 24 h validity window.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            validity: Duration::hours(24),
        }
    }

    /// Read the secret from `AGROBOOST_TOKEN_SECRET`, falling back to a
    /// per-process random secret (tokens then die with the process).
    pub fn from_env() -> Self {
        match std::env::var("AGROBOOST_TOKEN_SECRET") {
            Ok(secret) if !secret.is_empty() => Self::new(secret),
            _ => {
                tracing::warn!(
                    "AGROBOOST_TOKEN_SECRET not set, tokens will not survive a restart"
                );
                Self::new(Uuid::new_v4().as_bytes())
            }
        }
    }

    /// Issue a signed token for a user.
    pub fn issue(&self, user_id: Uuid) -> String {
        let expires = (Utc::now() + self.validity).timestamp();
        let payload = format!("{}:{}", user_id, expires);
        let tag = self.sign(payload.as_bytes());
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(tag)
        )
    }

    /// Verify a token and return the user id it carries.
    pub fn verify(&self, token: &str) -> Option<Uuid> {
        let (payload_b64, tag_b64) = token.split_once('.')?;
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let tag = URL_SAFE_NO_PAD.decode(tag_b64).ok()?;

        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(&payload);
        mac.verify_slice(&tag).ok()?;

        let payload = String::from_utf8(payload).ok()?;
        let (user_id, expires) = payload.split_once(':')?;
        let expires: i64 = expires.parse().ok()?;
        if expires < Utc::now().timestamp() {
            return None;
        }
        Uuid::parse_str(user_id).ok()
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

/// The authenticated caller, extracted from the `Authorization` header.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<ServerState> for AuthUser {
    type Rejection = ErrorResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ErrorResponse::unauthorized("missing bearer token"))?;

        state
            .tokens
            .verify(token)
            .map(AuthUser)
            .ok_or_else(|| ErrorResponse::unauthorized("invalid or expired token"))
    }
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

/// Register a new account.
/// POST /api/auth/register
pub async fn register_handler(
    State(state): State<ServerState>,
    Json(req): Json<CredentialsRequest>,
) -> HandlerResult<Value> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ErrorResponse::bad_request("username and password are required"));
    }
    if state.users.get_by_username(&req.username)?.is_some() {
        return Err(ErrorResponse::bad_request("username already taken"));
    }

    let hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ErrorResponse::internal(e.to_string()))?;
    let user = User::new(&req.username, hash);
    state.users.insert(&user)?;

    tracing::info!(username = %user.username, "user registered");

    let token = state.tokens.issue(user.id);
    ok(json!({
        "token": token,
        "user": { "id": user.id, "username": user.username },
    }))
}

/// Log in with username and password.
/// POST /api/auth/login
pub async fn login_handler(
    State(state): State<ServerState>,
    Json(req): Json<CredentialsRequest>,
) -> HandlerResult<Value> {
    let user = state
        .users
        .get_by_username(&req.username)?
        .ok_or_else(|| ErrorResponse::unauthorized("invalid username or password"))?;

    let valid = bcrypt::verify(&req.password, &user.password_hash)
        .map_err(|e| ErrorResponse::internal(e.to_string()))?;
    if !valid {
        return Err(ErrorResponse::unauthorized("invalid username or password"));
    }

    let token = state.tokens.issue(user.id);
    ok(json!({
        "token": token,
        "user": { "id": user.id, "username": user.username },
    }))
}

/// Router for auth endpoints.
pub fn auth_router() -> Router<ServerState> {
    Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let keys = TokenKeys::new("test-secret");
        let user_id = Uuid::new_v4();

        let token = keys.issue(user_id);
        assert_eq!(keys.verify(&token), Some(user_id));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let keys = TokenKeys::new("test-secret");
        let token = keys.issue(Uuid::new_v4());

        let mut tampered = token.clone();
        tampered.pop();
        assert_eq!(keys.verify(&tampered), None);
        assert_eq!(keys.verify("not.a.token"), None);
        assert_eq!(keys.verify(""), None);
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let keys = TokenKeys::new("test-secret");
        let other = TokenKeys::new("other-secret");

        let token = keys.issue(Uuid::new_v4());
        assert!(other.verify(&token).is_none());
    }
}
