//! Authentication middleware and credential stores.
//!
//! Two schemes are accepted on protected endpoints:
//!
//! - `Authorization: Bearer <JWT>` — validated against the configured
//!   secret (HS256).
//! - `Authorization: ApiKey <key>` — looked up by SHA-256 hash; entries
//!   carry `active` and an optional expiry.
//!
//! Authentication runs before any other validation; a request without a
//! recognized credential never reaches a handler.

use crate::api::AppState;
use crate::error::ApiError;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use conclave_types::ErrorCode;
use jsonwebtoken::{decode, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// User identity of the internal dashboard (via `ADMIN_API_TOKEN`).
pub const ADMIN_USER_ID: &str = "internal-dashboard";

/// The authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Stable user identifier; scopes idempotency keys and sessions.
    pub user_id: String,
    /// Whether this is the internal dashboard identity.
    pub is_admin: bool,
}

/// JWT claims the node validates.
#[derive(Debug, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    /// Expiry as a Unix timestamp.
    pub exp: usize,
}

/// One stored API key entry.
#[derive(Debug, Clone)]
pub struct ApiKeyEntry {
    /// User the key belongs to.
    pub user_id: String,
    /// Whether the key is currently usable.
    pub active: bool,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKeyEntry {
    fn is_usable(&self) -> bool {
        self.active && self.expires_at.map(|at| at > Utc::now()).unwrap_or(true)
    }
}

/// API keys indexed by the SHA-256 hex hash of their plaintext.
#[derive(Debug, Default)]
pub struct ApiKeyStore {
    keys: RwLock<HashMap<String, ApiKeyEntry>>,
}

/// SHA-256 hex digest used for key lookup.
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

impl ApiKeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key by its plaintext value.
    pub fn insert(&self, plaintext: &str, entry: ApiKeyEntry) {
        self.keys.write().insert(hash_key(plaintext), entry);
    }

    /// Resolves a plaintext key to its entry, if usable.
    pub fn verify(&self, plaintext: &str) -> Option<ApiKeyEntry> {
        let keys = self.keys.read();
        keys.get(&hash_key(plaintext))
            .filter(|entry| entry.is_usable())
            .cloned()
    }
}

/// Authenticates a request, rejecting before any other validation.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(ApiError::authentication_required)?;

    let user = authenticate(&state, header)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Resolves an Authorization header value to an identity.
pub fn authenticate(state: &AppState, header: &str) -> Result<AuthUser, ApiError> {
    let (scheme, credential) = header.split_once(' ').unwrap_or((header, ""));
    let credential = credential.trim();

    match scheme {
        "Bearer" if !credential.is_empty() => verify_jwt(state, credential),
        "ApiKey" if !credential.is_empty() => verify_api_key(state, credential),
        _ => Err(ApiError::invalid_auth_format()),
    }
}

fn verify_jwt(state: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    let key = DecodingKey::from_secret(state.jwt_secret.as_bytes());
    let data = decode::<Claims>(token, &key, &Validation::default())
        .map_err(|_| ApiError::new(ErrorCode::InvalidToken, "Token verification failed"))?;
    Ok(AuthUser {
        user_id: data.claims.sub,
        is_admin: false,
    })
}

fn verify_api_key(state: &AppState, key: &str) -> Result<AuthUser, ApiError> {
    if state
        .admin_api_token
        .as_deref()
        .is_some_and(|admin| admin == key)
    {
        return Ok(AuthUser {
            user_id: ADMIN_USER_ID.to_string(),
            is_admin: true,
        });
    }

    state
        .api_keys
        .verify(key)
        .map(|entry| AuthUser {
            user_id: entry.user_id,
            is_admin: false,
        })
        .ok_or_else(|| ApiError::new(ErrorCode::InvalidApiKey, "API key verification failed"))
}
