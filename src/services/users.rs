//! Back-office accounts: sign-in, user administration and avatars.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{self, AuthError, Role};
use crate::db::{Page, PageParams, UserRepository, UserRow};
use crate::state::AppState;
use crate::storage;
use crate::{EcommerceError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserRow,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub name: String,
    #[validate(length(min = 8, max = 128, message = "must be between 8 and 128 characters"))]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub name: String,
    pub role: Role,
    pub active: bool,
    #[validate(length(min = 8, max = 128, message = "must be between 8 and 128 characters"))]
    pub password: Option<String>,
}

/// Argon2 is deliberately slow; keep it off the async workers.
async fn hash_password(password: String) -> Result<String> {
    let hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))??;
    Ok(hash)
}

async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
        .await
        .unwrap_or(false)
}

pub async fn login(state: &AppState, request: LoginRequest) -> Result<LoginResponse> {
    request.validate()?;
    let email = request.email.trim().to_lowercase();
    let user = UserRepository::new(state.db.clone()).get_by_email(&email).await?.filter(|u| u.active);
    // Unknown and inactive accounts pay for a hash check too.
    let hash = user.as_ref().map_or_else(|| auth::UNKNOWN_ACCOUNT_HASH.to_string(), |u| u.password_hash.clone());
    let verified = verify_password(request.password, hash).await;
    let Some(user) = user.filter(|_| verified) else {
        warn!(%email, "Failed sign-in");
        return Err(AuthError::InvalidCredentials.into());
    };
    let token = state.jwt.issue(user.id, &user.email, user.role())?;
    info!(user_id = %user.id, role = user.role().as_str(), "Signed in");
    Ok(LoginResponse { token, token_type: "Bearer", expires_in: state.jwt.lifetime_secs(), user })
}

pub async fn get(state: &AppState, id: Uuid) -> Result<UserRow> {
    UserRepository::new(state.db.clone()).get(id).await?.ok_or(EcommerceError::UserNotFound)
}

pub async fn list(state: &AppState, params: PageParams) -> Result<Page<UserRow>> {
    Ok(UserRepository::new(state.db.clone()).list(params).await?)
}

pub async fn create(state: &AppState, request: CreateUserRequest) -> Result<UserRow> {
    request.validate()?;
    let email = request.email.trim().to_lowercase();
    let users = UserRepository::new(state.db.clone());
    if users.get_by_email(&email).await?.is_some() {
        return Err(EcommerceError::Conflict(format!("a user with email {email} already exists")));
    }
    let hash = hash_password(request.password).await?;
    let user = users.create(&email, request.name.trim(), &hash, request.role).await?;
    info!(user_id = %user.id, role = request.role.as_str(), "User created");
    Ok(user)
}

/// `actor` is the signed-in admin; they cannot lock themselves out.
pub async fn update(state: &AppState, actor: Uuid, id: Uuid, request: UpdateUserRequest) -> Result<UserRow> {
    request.validate()?;
    if actor == id && (request.role != Role::Admin || !request.active) {
        return Err(EcommerceError::Conflict("cannot demote or deactivate your own account".to_string()));
    }
    let hash = match request.password {
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };
    UserRepository::new(state.db.clone())
        .update(id, request.name.trim(), request.role, request.active, hash.as_deref())
        .await?
        .ok_or(EcommerceError::UserNotFound)
}

pub async fn delete(state: &AppState, actor: Uuid, id: Uuid) -> Result<()> {
    if actor == id {
        return Err(EcommerceError::Conflict("cannot delete your own account".to_string()));
    }
    let users = UserRepository::new(state.db.clone());
    let user = users.get(id).await?.ok_or(EcommerceError::UserNotFound)?;
    users.delete(id).await?;
    if let Some(key) = user.avatar_url.as_deref().and_then(|url| state.storage.key_for_url(url)) {
        if let Err(e) = state.storage.delete(&key).await {
            warn!(%key, error = %e, "Failed to delete avatar");
        }
    }
    info!(user_id = %id, "User deleted");
    Ok(())
}

/// Stores a new avatar and drops the previous object, best effort.
pub async fn upload_avatar(state: &AppState, id: Uuid, content_type: &str, body: Bytes) -> Result<UserRow> {
    let ext = storage::validate_image(content_type, body.len(), state.config.storage.max_upload_bytes)?;
    let users = UserRepository::new(state.db.clone());
    let user = users.get(id).await?.ok_or(EcommerceError::UserNotFound)?;

    let key = storage::avatar_key(id, ext);
    state.storage.put(&key, body, content_type).await?;
    let row = users
        .set_avatar(id, Some(&state.storage.public_url(&key)))
        .await?
        .ok_or(EcommerceError::UserNotFound)?;

    if let Some(old) = user.avatar_url.as_deref().and_then(|url| state.storage.key_for_url(url)) {
        if let Err(e) = state.storage.delete(&old).await {
            warn!(key = %old, error = %e, "Failed to delete previous avatar");
        }
    }
    Ok(row)
}

/// Creates the configured admin account when the users table is empty.
pub async fn bootstrap_admin(state: &AppState) -> Result<Option<UserRow>> {
    let Some(admin) = state.config.bootstrap_admin.clone() else { return Ok(None) };
    let users = UserRepository::new(state.db.clone());
    if users.count().await? > 0 {
        return Ok(None);
    }
    let hash = hash_password(admin.password).await?;
    let user = users.create(&admin.email, "Administrator", &hash, Role::Admin).await?;
    info!(user_id = %user.id, email = %user.email, "Bootstrap admin created");
    Ok(Some(user))
}
