//! Authentication middleware and signed session-token verification

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::app::AppState;
use crate::util::time::unix_secs;

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "invex_session";

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (admin username)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: u64,
    /// Token identifier
    pub jti: Uuid,
}

/// Sign claims into a `base64url(payload).base64url(signature)` token
fn sign_claims(claims: &SessionClaims, secret: &str) -> Result<String, AuthError> {
    let payload = serde_json::to_vec(claims).map_err(|_| AuthError::InvalidToken)?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(payload_b64.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Mint a fresh session token for an authenticated admin
pub fn mint_token(username: &str, secret: &str, ttl_secs: u64) -> Result<String, AuthError> {
    let now = unix_secs();
    let claims = SessionClaims {
        sub: username.to_string(),
        exp: now + ttl_secs,
        iat: now,
        jti: Uuid::new_v4(),
    };
    sign_claims(&claims, secret)
}

/// Verify a session token and extract its claims
pub fn verify_token(token: &str, secret: &str) -> Result<SessionClaims, AuthError> {
    // Split token into parts
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 2 {
        return Err(AuthError::InvalidToken);
    }

    let payload_b64 = parts[0];
    let signature_b64 = parts[1];

    // Verify signature (HMAC-SHA256)
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(payload_b64.as_bytes());

    let expected_signature = mac.finalize().into_bytes();
    let provided_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    if expected_signature.as_slice() != provided_signature.as_slice() {
        return Err(AuthError::InvalidToken);
    }

    // Decode payload
    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    let claims: SessionClaims =
        serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

    // Check expiration
    if claims.exp < unix_secs() {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing session cookie")]
    MissingCookie,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Unauthenticated access to a protected page goes back to the login
        // form rather than surfacing an error
        Redirect::to("/login").into_response()
    }
}

/// Authenticated admin context for handlers
#[derive(Debug, Clone)]
pub struct AuthenticatedAdmin {
    pub username: String,
}

/// Middleware to require an authenticated session
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let cookie = jar.get(SESSION_COOKIE).ok_or(AuthError::MissingCookie)?;

    let claims = verify_token(cookie.value(), &state.config.session_secret)?;

    let admin = AuthenticatedAdmin { username: claims.sub };

    // Insert into request extensions for handlers to access
    request.extensions_mut().insert(admin);

    Ok(next.run(request).await)
}
