// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints require the Admin role and provide:
//! - Account listing, patching and soft deletion
//! - Listing every room, private ones included
//! - Room lifecycle tagging

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;

use super::auth::{normalize_email, validate_name};
use super::rooms::RoomListParams;
use crate::{
    auth::{
        password::{hash_password, validate_password, verify_password},
        AdminOnly,
    },
    error::ApiError,
    models::{AdminUpdateUserRequest, RoomResponse, UpdateRoomTagRequest, UserResponse},
    state::AppState,
    storage::ResourceStore,
};

/// List all active accounts.
#[utoipa::path(
    get,
    path = "/v1/admin/users",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active accounts", body = Vec<UserResponse>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_users(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
) -> Json<Vec<UserResponse>> {
    let users = state.store.read().await.list_active_users();
    info!(admin_id = admin.user_id, count = users.len(), "admin listed users");
    Json(users.iter().map(UserResponse::from).collect())
}

/// Soft-delete an account.
///
/// Tokens already issued to the account stop authenticating immediately.
#[utoipa::path(
    delete,
    path = "/v1/admin/users/{user_id}",
    tag = "Admin",
    params(("user_id" = u64, Path, description = "Account ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "Admins cannot delete themselves"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Account not found")
    )
)]
pub async fn delete_user(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    if user_id == admin.user_id {
        return Err(ApiError::bad_request("Admins cannot delete their own account"));
    }

    state.store.write().await.soft_delete_user(user_id)?;

    info!(admin_id = admin.user_id, user_id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Patch an account's email, name or password.
///
/// Omitted fields are left unchanged. A new password must differ from the
/// current one.
#[utoipa::path(
    patch,
    path = "/v1/admin/users/{user_id}",
    tag = "Admin",
    params(("user_id" = u64, Path, description = "Account ID")),
    request_body = AdminUpdateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 400, description = "Invalid field or unchanged password"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_user(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
    Json(request): Json<AdminUpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let email = request.email.as_deref().map(normalize_email).transpose()?;
    let name = request
        .name
        .as_deref()
        .map(validate_name)
        .transpose()?
        .map(str::to_string);

    let password_hash = match request.new_password.as_deref() {
        Some(new_password) => {
            validate_password(new_password)?;
            let current = state
                .store
                .read()
                .await
                .find_user_if_active(user_id)
                .ok_or_else(|| ApiError::not_found("User not found"))?;
            if verify_password(new_password, &current.password_hash).await? {
                return Err(ApiError::bad_request(
                    "New password must differ from the current password",
                ));
            }
            Some(hash_password(new_password, state.auth.bcrypt_cost).await?)
        }
        None => None,
    };

    let mut store = state.store.write().await;
    let mut user = store
        .find_user_if_active(user_id)
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if let Some(email) = email {
        user.email = email;
    }
    if let Some(name) = name {
        user.name = name;
    }
    let password_changed = password_hash.is_some();
    if let Some(password_hash) = password_hash {
        user.password_hash = password_hash;
    }
    store.save_user(&user)?;

    info!(admin_id = admin.user_id, user_id, password_changed, "account patched");
    Ok(Json(UserResponse::from(&user)))
}

/// List every active room, private ones included.
#[utoipa::path(
    get,
    path = "/v1/admin/rooms",
    tag = "Admin",
    params(RoomListParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active rooms", body = Vec<RoomResponse>),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_rooms(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Query(params): Query<RoomListParams>,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let filter = params.into_filter()?;
    let rooms = state.store.read().await.list_rooms(&filter);

    info!(admin_id = admin.user_id, count = rooms.len(), "admin listed rooms");
    Ok(Json(rooms.iter().map(RoomResponse::from).collect()))
}

/// Move a room out of `IN_PROGRESS`.
///
/// Allowed once per room, and only to `ADOPTED`, `REJECTED` or `CLOSED`.
#[utoipa::path(
    patch,
    path = "/v1/admin/rooms/{room_id}/tag",
    tag = "Admin",
    params(("room_id" = u64, Path, description = "Room ID")),
    request_body = UpdateRoomTagRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated room", body = RoomResponse),
        (status = 400, description = "Invalid tag transition"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Room not found")
    )
)]
pub async fn set_room_tag(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Json(request): Json<UpdateRoomTagRequest>,
) -> Result<Json<RoomResponse>, ApiError> {
    let mut store = state.store.write().await;
    let mut room = store
        .find_room_if_active(room_id)
        .ok_or_else(|| ApiError::not_found("Room not found"))?;

    if room.tag.is_terminal() {
        return Err(ApiError::bad_request("Room has already been tagged"));
    }
    if !request.tag.is_terminal() {
        return Err(ApiError::bad_request(
            "Tag must be one of ADOPTED, REJECTED or CLOSED",
        ));
    }

    room.tag = request.tag;
    room.updated_at = Utc::now();
    store.save_room(&room)?;

    info!(admin_id = admin.user_id, room_id, tag = ?room.tag, "room tagged");
    Ok(Json(RoomResponse::from(&room)))
}
