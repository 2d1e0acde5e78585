use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo_types::User,
    },
    error::{db_error_code, AppError, AppResult},
};

pub const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 100;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

fn issue_tokens(keys: &JwtKeys, user: User) -> AppResult<AuthResponse> {
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
        token_type: "Bearer",
        user: user.into(),
    })
}

pub async fn register(db: &PgPool, keys: &JwtKeys, req: RegisterRequest) -> AppResult<AuthResponse> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::validation("Password must be at least 8 characters"));
    }
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    if name.is_some_and(|n| n.chars().count() > MAX_NAME_LEN) {
        return Err(AppError::validation("name must be at most 100 characters"));
    }

    if User::find_by_email(db, &email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&req.password)?;
    // a concurrent sign-up can still hit the unique index
    let user = User::create(db, &email, name, &hash).await.map_err(|e| {
        if db_error_code(&e).as_deref() == Some("23505") {
            AppError::Conflict("Email already registered".into())
        } else {
            e.into()
        }
    })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue_tokens(keys, user)
}

pub async fn login(db: &PgPool, keys: &JwtKeys, req: LoginRequest) -> AppResult<AuthResponse> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }

    let Some(user) = User::find_by_email(db, &email).await? else {
        warn!(%email, "login unknown email");
        return Err(invalid_credentials());
    };
    if !verify_password(&req.password, &user.password_hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }
    if !user.is_active {
        warn!(user_id = %user.id, "login on inactive account");
        return Err(invalid_credentials());
    }

    info!(user_id = %user.id, "user logged in");
    issue_tokens(keys, user)
}

pub async fn refresh(db: &PgPool, keys: &JwtKeys, req: RefreshRequest) -> AppResult<AuthResponse> {
    let claims = keys.verify_refresh(&req.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::Unauthorized("Invalid or expired refresh token".into())
    })?;
    let user = User::find_by_id(db, claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    info!(user_id = %user.id, "tokens refreshed");
    issue_tokens(keys, user)
}

pub async fn me(db: &PgPool, user_id: Uuid) -> AppResult<PublicUser> {
    User::find_by_id(db, user_id)
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))
}
