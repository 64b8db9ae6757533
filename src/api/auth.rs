//! Account registration, login and bearer-token auth.
//!
//! - `POST /api/auth/register` and `POST /api/auth/login` return a JWT
//! - Every other `/api` route except health requires `Authorization: Bearer <jwt>`
//! - A missing token answers 401, an invalid or expired one 403
//!
//! Passwords are stored as `pbkdf2-sha256$<rounds>$<salt hex>$<hash hex>`.

use std::sync::{Arc, OnceLock};

use axum::{
    body::Body,
    extract::{Extension, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use regex::Regex;
use sha2::Sha256;
use uuid::Uuid;

use super::routes::{store_error, AppState};
use super::types::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};
use crate::config::AuthConfig;
use crate::store::{StoreError, User};

const HASH_SCHEME: &str = "pbkdf2-sha256";
const HASH_ROUNDS: u32 = 50_000;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// User id
    sub: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

/// The authenticated caller, inserted as a request extension by [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a.len() {
        diff |= a[i] ^ b[i];
    }
    diff == 0
}

fn derive_key(password: &str, salt: &[u8], rounds: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut key);
    key
}

pub(crate) fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let key = derive_key(password, &salt, HASH_ROUNDS);
    format!(
        "{}${}${}${}",
        HASH_SCHEME,
        HASH_ROUNDS,
        hex::encode(salt),
        hex::encode(key)
    )
}

/// False for a wrong password and for any hash this module did not write.
pub(crate) fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(HASH_SCHEME), Some(rounds), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    let (Ok(rounds), Ok(salt), Ok(expected)) =
        (rounds.parse::<u32>(), hex::decode(salt), hex::decode(expected))
    else {
        return false;
    };
    constant_time_eq(&derive_key(password, &salt, rounds), &expected)
}

fn issue_jwt(auth: &AuthConfig, user_id: Uuid) -> anyhow::Result<String> {
    let now = Utc::now();
    let exp = now + Duration::days(auth.jwt_ttl_days.max(1));
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Uuid> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(Uuid::parse_str(&token_data.claims.sub)?)
}

fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(email))
}

fn validate_registration(req: &RegisterRequest) -> Result<(), String> {
    if req.name.trim().chars().count() < 2 {
        return Err("Name must be at least 2 characters".to_string());
    }
    if !is_valid_email(req.email.trim()) {
        return Err("Invalid email address".to_string());
    }
    if req.password.chars().count() < 6 {
        return Err("Password must be at least 6 characters".to_string());
    }
    Ok(())
}

fn session_for(state: &AppState, user: User) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let token = issue_jwt(&state.config.auth, user.id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// POST /api/auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    validate_registration(&req).map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;

    let email = req.email.trim().to_lowercase();
    let password_hash = hash_password(&req.password);
    let user = match state
        .store
        .create_user(req.name.trim(), &email, &password_hash)
        .await
    {
        Ok(user) => user,
        Err(StoreError::EmailTaken(_)) => {
            return Err((StatusCode::BAD_REQUEST, "Email already exists".to_string()));
        }
        Err(e) => return Err(store_error(e)),
    };

    tracing::info!(user_id = %user.id, "Registered user");
    session_for(&state, user)
}

/// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let email = req.email.trim().to_lowercase();
    let account = state
        .store
        .find_user_by_email(&email)
        .await
        .map_err(store_error)?;

    // Same error for unknown email and wrong password.
    let user = match account {
        Some(user) if verify_password(&req.password, &user.password_hash) => user,
        Some(_) => {
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()));
        }
        None => {
            let _ = verify_password(&req.password, "");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()));
        }
    };

    session_for(&state, user)
}

/// GET /api/auth/me - Mounted behind [`require_auth`].
pub(super) async fn me(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<UserProfile>, (StatusCode, String)> {
    match state.store.get_user(caller.id).await.map_err(store_error)? {
        Some(user) => Ok(Json(user.into())),
        None => Err((StatusCode::NOT_FOUND, "User not found".to_string())),
    }
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("")
        .trim();

    if token.is_empty() {
        return (StatusCode::UNAUTHORIZED, "No token provided").into_response();
    }

    match verify_jwt(token, &state.config.auth.jwt_secret) {
        Ok(id) => {
            req.extensions_mut().insert(AuthUser { id });
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!("Rejected bearer token: {}", e);
            (StatusCode::FORBIDDEN, "Invalid token").into_response()
        }
    }
}
