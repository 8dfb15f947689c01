use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::Event,
    repository::RepositoryState,
};

pub const SESSION_COOKIE: &str = "session";
pub const LOGIN_PATH: &str = "/accounts/login/";

/// Claims
///
/// Payload of a session token. Signed with `AppConfig::jwt_secret` (HS256).
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: Uuid,
    /// Expiration time (seconds since the epoch).
    pub exp: usize,
    /// Issued at (seconds since the epoch).
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers take it as an argument; a
/// request without a valid session never reaches them.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

impl AuthUser {
    /// ensure_organizer
    ///
    /// Authorization for owner-scoped operations (owner detail, update, delete). Must be
    /// called before any mutation.
    pub fn ensure_organizer(&self, event: &Event) -> Result<(), AppError> {
        if event.is_organized_by(self.id) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.id,
                event_id = event.id,
                "non-organizer attempted an owner-only action"
            );
            Err(AppError::Forbidden(
                "only the organizer may access this event".to_string(),
            ))
        }
    }
}

/// LoginRequired
///
/// Rejection for unauthenticated requests: `303 See Other` to the login route, carrying the
/// original path and query in `next` (percent-encoded).
#[derive(Debug, Clone, PartialEq)]
pub struct LoginRequired {
    pub next: String,
}

impl LoginRequired {
    pub fn location(&self) -> String {
        format!("{LOGIN_PATH}?next={}", urlencoding::encode(&self.next))
    }
}

impl IntoResponse for LoginRequired {
    fn into_response(self) -> Response {
        Redirect::to(&self.location()).into_response()
    }
}

/// AuthUser Extractor Implementation
///
/// Resolution order:
/// 1. Local bypass: in `Env::Local`, an `x-user-id` header naming an existing user.
/// 2. `Authorization: Bearer <token>`.
/// 3. The `session` cookie.
///
/// The token's subject must still exist in the store; deleted accounts lose access
/// immediately.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = LoginRequired;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        let rejection = LoginRequired {
            next: parts
                .uri
                .path_and_query()
                .map_or_else(|| parts.uri.path(), |pq| pq.as_str())
                .to_string(),
        };

        if config.env == Env::Local {
            if let Some(user_id) = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok())
            {
                if let Ok(Some(user)) = repo.get_user(user_id).await {
                    return Ok(AuthUser {
                        id: user.id,
                        username: user.username,
                    });
                }
            }
        }

        let Some(token) = bearer_token(&parts.headers).or_else(|| session_cookie(&parts.headers))
        else {
            return Err(rejection);
        };

        let user_id = match verify_session_token(&token, &config) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(error = %e, "rejected session token");
                return Err(rejection);
            }
        };

        match repo.get_user(user_id).await {
            Ok(Some(user)) => Ok(AuthUser {
                id: user.id,
                username: user.username,
            }),
            Ok(None) => Err(rejection),
            Err(e) => {
                tracing::error!(error = %e, "user lookup failed during authentication");
                Err(rejection)
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

// --- Session tokens ---

/// Issues a signed session token for `user_id`, valid for `session_ttl_hours`.
pub fn issue_session_token(user_id: Uuid, config: &AppConfig) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(config.session_ttl_hours)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("failed to sign session token: {e}")))
}

/// Validates signature and expiry; returns the subject.
pub fn verify_session_token(
    token: &str,
    config: &AppConfig,
) -> Result<Uuid, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims.sub)
}

/// `Set-Cookie` value establishing a session.
pub fn session_cookie_header(token: &str, config: &AppConfig) -> String {
    let max_age = config.session_ttl_hours * 3600;
    let secure = if config.secure_cookies() { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age}{secure}")
}

/// `Set-Cookie` value clearing the session.
pub fn clear_session_cookie_header() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0")
}

// --- Passwords ---

/// Hashes on the blocking pool; bcrypt is deliberately slow.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}
