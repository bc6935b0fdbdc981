// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caller account endpoints: profile, password and self-service deletion.

use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, warn};

use super::auth::{normalize_email, validate_name};
use crate::{
    auth::{
        password::{hash_password, validate_password, verify_password},
        Auth,
    },
    error::ApiError,
    models::{ChangePasswordRequest, DeleteAccountRequest, UpdateProfileRequest, UserResponse},
    state::AppState,
};

/// Get the current caller's account.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's account", body = UserResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    Auth(identity): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .store
        .read()
        .await
        .find_user_if_active(identity.user_id)
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse::from(&user)))
}

/// Replace the caller's email and display name.
#[utoipa::path(
    put,
    path = "/v1/users/me",
    tag = "Users",
    request_body = UpdateProfileRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 400, description = "Invalid email or name"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_me(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let email = normalize_email(&request.email)?;
    let name = validate_name(&request.name)?.to_string();

    let mut store = state.store.write().await;
    let mut user = store
        .find_user_if_active(identity.user_id)
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let email_changed = user.email != email;
    user.email = email;
    user.name = name;
    store.save_user(&user)?;

    info!(user_id = user.id, email_changed, "profile updated");
    Ok(Json(UserResponse::from(&user)))
}

/// Change the caller's password.
///
/// The current password must match and the new one must differ from it.
#[utoipa::path(
    patch,
    path = "/v1/users/me/password",
    tag = "Users",
    request_body = ChangePasswordRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password or invalid new password"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn change_password(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    validate_password(&request.new_password)?;

    let user = state
        .store
        .read()
        .await
        .find_user_if_active(identity.user_id)
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify_password(&request.current_password, &user.password_hash).await? {
        warn!(user_id = user.id, "password change rejected: wrong current password");
        return Err(ApiError::bad_request("Current password does not match"));
    }
    if verify_password(&request.new_password, &user.password_hash).await? {
        return Err(ApiError::bad_request(
            "New password must differ from the current password",
        ));
    }

    let password_hash = hash_password(&request.new_password, state.auth.bcrypt_cost).await?;

    // Re-read under the write lock; the account may have changed while hashing
    let mut store = state.store.write().await;
    let mut user = store
        .find_user_if_active(identity.user_id)
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    user.password_hash = password_hash;
    store.save_user(&user)?;

    info!(user_id = user.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// Soft-delete the caller's own account.
///
/// The request must carry a refresh token issued to the same account.
#[utoipa::path(
    delete,
    path = "/v1/users/me",
    tag = "Users",
    request_body = DeleteAccountRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Not authenticated or refresh token invalid"),
        (status = 403, description = "Refresh token belongs to another account")
    )
)]
pub async fn delete_me(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Json(request): Json<DeleteAccountRequest>,
) -> Result<StatusCode, ApiError> {
    let claims = state
        .tokens
        .verify(&request.refresh_token)
        .map_err(|_| ApiError::unauthorized("Invalid or expired refresh token"))?;
    if claims.subject() != identity.email {
        warn!(user_id = identity.user_id, "account deletion with a foreign refresh token");
        return Err(ApiError::forbidden(
            "Refresh token does not belong to the current account",
        ));
    }

    state.store.write().await.soft_delete_user(identity.user_id)?;

    info!(user_id = identity.user_id, "account deleted by owner");
    Ok(StatusCode::NO_CONTENT)
}
