//! User directory and self-service profile endpoints.
//!
//! Reads are public. Profile, avatar and delete require the caller to be the
//! user in the path.

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartRejection},
    http::header::SET_COOKIE,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::Deserialize;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use super::auth::{is_unique_violation, session_response};
use super::error::{ApiError, ResultExt, parse_id};
use super::extract::Json;
use super::response::ApiResponse;
use crate::auth::{Auth, AuthenticatedUser, CookieConfig};
use crate::db::{Database, PublicUser};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::validation::validate_profile_update;

/// Largest accepted avatar file.
pub const MAX_AVATAR_BYTES: usize = 1024 * 1024;

/// URL prefix under which uploaded files are served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub cookie: CookieConfig,
    pub uploads_dir: PathBuf,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user).put(update_profile).delete(delete_user))
        .route(
            "/{id}/avatar",
            // Room for the multipart framing around a maximum-size file
            put(upload_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 64 * 1024)),
        )
        .with_state(state)
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    name: Option<String>,
    email: Option<String>,
}

fn require_self(user: &AuthenticatedUser, id: i64) -> Result<(), ApiError> {
    if user.id() != id {
        return Err(ApiError::forbidden("You can only modify your own account"));
    }
    Ok(())
}

async fn list_users(State(state): State<UsersState>) -> Result<impl IntoResponse, ApiError> {
    let users: Vec<PublicUser> = state
        .db
        .users()
        .list()
        .await
        .db_err("Failed to list users")?
        .into_iter()
        .map(PublicUser::from)
        .collect();

    Ok(ApiResponse::ok("All users", users))
}

async fn get_user(
    State(state): State<UsersState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let user = state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::ok("User", PublicUser::from(user)))
}

async fn update_profile(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    Path(id): Path<String>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    require_self(&auth, id)?;

    let name = payload.name.as_deref().filter(|n| !n.trim().is_empty());
    let email = payload.email.as_deref().filter(|e| !e.trim().is_empty());
    validate_profile_update(name, email).map_err(ApiError::bad_request)?;

    if let Some(email) = email {
        let existing = state
            .db
            .users()
            .get_by_email(email)
            .await
            .db_err("Failed to check email")?;
        if existing.is_some_and(|other| other.id != id) {
            return Err(ApiError::conflict("Email already in use"));
        }
    }

    let user = match state.db.users().update_profile(id, name, email).await {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => return Err(ApiError::conflict("Email already in use")),
        Err(e) => return Err(ApiError::db_error("Failed to update user", e)),
    }
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user_id = id, "Profile updated");
    session_response(&state.jwt, &state.cookie, &user, "Profile updated successfully")
}

/// File extension for an accepted avatar MIME type.
fn avatar_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/gif" => Some(".gif"),
        "image/webp" => Some(".webp"),
        _ => None,
    }
}

fn avatar_file_name(extension: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix: u32 = rand::random_range(0..1_000_000_000);
    format!("avatar-{}-{}{}", millis, suffix, extension)
}

/// Map a stored avatar URL (`/uploads/<file>`) back to its file on disk.
fn stored_avatar_path(uploads_dir: &FsPath, avatar: &str) -> Option<PathBuf> {
    let file_name = avatar.strip_prefix(UPLOADS_URL_PREFIX)?.strip_prefix('/')?;
    if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
        return None;
    }
    Some(uploads_dir.join(file_name))
}

async fn remove_file(path: &FsPath) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}

/// Upload an avatar using multipart form data.
///
/// Expected field: `avatar` (jpeg, png, gif or webp, at most 1 MiB).
async fn upload_avatar(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    require_self(&auth, id)?;
    let mut multipart = multipart?;

    let mut upload: Option<(&'static str, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Invalid multipart data"))?
    {
        if field.name() != Some("avatar") {
            continue;
        }
        let extension = field
            .content_type()
            .and_then(avatar_extension)
            .ok_or_else(|| {
                ApiError::bad_request("Only image files are allowed (jpeg, jpg, png, gif, webp)")
            })?;
        let data = field
            .bytes()
            .await
            .map_err(|_| ApiError::bad_request("File too large. Maximum size is 1MB"))?;
        if data.len() > MAX_AVATAR_BYTES {
            return Err(ApiError::bad_request("File too large. Maximum size is 1MB"));
        }
        upload = Some((extension, data.to_vec()));
    }

    let (extension, data) = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let current = state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let file_name = avatar_file_name(extension);
    let file_path = state.uploads_dir.join(&file_name);
    tokio::fs::write(&file_path, &data)
        .await
        .internal_err("Failed to save avatar")?;

    let avatar_url = format!("{}/{}", UPLOADS_URL_PREFIX, file_name);
    let updated = match state.db.users().update_avatar(id, &avatar_url).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            remove_file(&file_path).await;
            return Err(ApiError::not_found("User not found"));
        }
        Err(e) => {
            remove_file(&file_path).await;
            return Err(ApiError::db_error("Failed to update avatar", e));
        }
    };

    if let Some(old) = current.avatar.as_deref() {
        if let Some(old_path) = stored_avatar_path(&state.uploads_dir, old) {
            remove_file(&old_path).await;
        }
    }

    info!(user_id = id, file = %file_name, "Avatar uploaded");
    session_response(&state.jwt, &state.cookie, &updated, "Avatar uploaded successfully")
}

async fn delete_user(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    require_self(&auth, id)?;

    let user = state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let deleted = state
        .db
        .users()
        .delete(id)
        .await
        .db_err("Failed to delete user")?;
    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    if let Some(path) = user
        .avatar
        .as_deref()
        .and_then(|avatar| stored_avatar_path(&state.uploads_dir, avatar))
    {
        remove_file(&path).await;
    }

    info!(user_id = id, "User deleted");
    Ok((
        [(SET_COOKIE, state.cookie.clear_refresh_cookie())],
        ApiResponse::message("User deleted successfully"),
    ))
}
