// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account endpoints: signup, login and access-token refresh.
//!
//! These routes sit on the authentication allow-list. Login and refresh
//! failures use the same `{error, error_code}` body as the authenticator.

use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, warn};

use crate::{
    auth::{
        password::{hash_password, validate_password, verify_password},
        AuthError, Role,
    },
    error::ApiError,
    models::{
        AccessTokenResponse, LoginRequest, RefreshRequest, SignupRequest, SignupResponse,
        TokenPairResponse,
    },
    state::AppState,
    storage::{IdentityStore, NewUser},
};

/// Longest accepted display name, in characters.
const MAX_NAME_CHARS: usize = 50;

/// Trim and lowercase an email, rejecting obviously malformed input.
pub(crate) fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::bad_request("Invalid email address")),
    }
}

/// Trim a display name and check its length.
pub(crate) fn validate_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(ApiError::bad_request(format!(
            "Name must be between 1 and {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name)
}

/// Create an account.
///
/// New accounts always get the `USER` role.
#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    tag = "Auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = SignupResponse),
        (status = 400, description = "Invalid email, name or password"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let email = normalize_email(&request.email)?;
    let name = validate_name(&request.name)?;
    validate_password(&request.password)?;

    // Skip the bcrypt work for an obvious duplicate; insert_user re-checks
    if state.store.read().await.exists_by_subject_if_active(&email) {
        return Err(ApiError::conflict(format!("User {email} already exists")));
    }

    let password_hash = hash_password(&request.password, state.auth.bcrypt_cost).await?;
    let user = state.store.write().await.insert_user(NewUser {
        email,
        name: name.to_string(),
        password_hash,
        role: Role::User,
    })?;

    info!(user_id = user.id, "account created");
    Ok((StatusCode::CREATED, Json(SignupResponse { user_id: user.id })))
}

/// Exchange credentials for an access and refresh token.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair", body = TokenPairResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenPairResponse>, AuthError> {
    let email = request.email.trim().to_lowercase();
    let user = state.store.read().await.find_user_by_email_if_active(&email);

    let Some(user) = user else {
        warn!("login rejected: unknown account");
        return Err(AuthError::InvalidCredentials);
    };

    let matches = verify_password(&request.password, &user.password_hash)
        .await
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
    if !matches {
        warn!(user_id = user.id, "login rejected: wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    let access_token = state
        .tokens
        .issue(&user.email, user.role, state.auth.access_ttl)
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
    let refresh_token = state
        .tokens
        .issue(&user.email, user.role, state.auth.refresh_ttl)
        .map_err(|e| AuthError::InternalError(e.to_string()))?;

    info!(user_id = user.id, "login succeeded");
    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
    }))
}

/// Issue a new access token from a refresh token.
///
/// The account must still be active. The new token carries the account's
/// current role, not the role recorded in the refresh token.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 401, description = "Refresh token invalid, expired or orphaned")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, AuthError> {
    let claims = state
        .tokens
        .verify(&request.refresh_token)
        .map_err(|_| AuthError::InvalidToken)?;

    let identity = state
        .store
        .read()
        .await
        .find_by_subject_if_active(claims.subject())
        .ok_or(AuthError::IdentityNotFound)?;

    let access_token = state
        .tokens
        .issue(&identity.email, identity.role, state.auth.access_ttl)
        .map_err(|e| AuthError::InternalError(e.to_string()))?;

    info!(user_id = identity.user_id, "access token refreshed");
    Ok(Json(AccessTokenResponse { access_token }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;

    fn signup_request(email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: "Mina".to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn signup_then_login_issues_verifiable_tokens() {
        let state = test_state();

        let (status, Json(created)) = signup(
            State(state.clone()),
            Json(signup_request("Mina@Example.com", "password123")),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let Json(pair) = login(
            State(state.clone()),
            Json(login_request("mina@example.com", "password123")),
        )
        .await
        .unwrap();

        let access = state.tokens.verify(&pair.access_token).unwrap();
        assert_eq!(access.subject(), "mina@example.com");
        assert_eq!(access.role(), Role::User);
        let refresh = state.tokens.verify(&pair.refresh_token).unwrap();
        assert!(refresh.expires_at() > access.expires_at());

        let user = state.store.read().await.find_user_if_active(created.user_id).unwrap();
        assert_ne!(user.password_hash, "password123");
    }

    #[tokio::test]
    async fn duplicate_signup_is_conflict() {
        let state = test_state();
        signup(State(state.clone()), Json(signup_request("a@example.com", "password123")))
            .await
            .unwrap();

        let err = signup(State(state), Json(signup_request("A@example.com ", "password123")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn signup_validates_input() {
        let state = test_state();

        let short = signup(State(state.clone()), Json(signup_request("a@example.com", "short")))
            .await
            .unwrap_err();
        assert_eq!(short.status, StatusCode::BAD_REQUEST);

        let bad_email = signup(State(state.clone()), Json(signup_request("not-an-email", "password123")))
            .await
            .unwrap_err();
        assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);

        let mut nameless = signup_request("b@example.com", "password123");
        nameless.name = "   ".to_string();
        let nameless = signup(State(state), Json(nameless)).await.unwrap_err();
        assert_eq!(nameless.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let state = test_state();
        signup(State(state.clone()), Json(signup_request("a@example.com", "password123")))
            .await
            .unwrap();

        let wrong = login(State(state.clone()), Json(login_request("a@example.com", "password124")))
            .await
            .unwrap_err();
        let unknown = login(State(state), Json(login_request("z@example.com", "password123")))
            .await
            .unwrap_err();

        assert_eq!(wrong, AuthError::InvalidCredentials);
        assert_eq!(unknown, AuthError::InvalidCredentials);
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn deleted_account_cannot_log_in() {
        let state = test_state();
        let (_, Json(created)) = signup(
            State(state.clone()),
            Json(signup_request("a@example.com", "password123")),
        )
        .await
        .unwrap();
        state.store.write().await.soft_delete_user(created.user_id).unwrap();

        let err = login(State(state), Json(login_request("a@example.com", "password123")))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn refresh_uses_current_role() {
        let state = test_state();
        signup(State(state.clone()), Json(signup_request("a@example.com", "password123")))
            .await
            .unwrap();
        // Refresh token claiming a stale, higher role
        let refresh_token = state
            .tokens
            .issue("a@example.com", Role::Admin, state.auth.refresh_ttl)
            .unwrap();

        let Json(response) = refresh(State(state.clone()), Json(RefreshRequest { refresh_token }))
            .await
            .unwrap();

        let claims = state.tokens.verify(&response.access_token).unwrap();
        assert_eq!(claims.role(), Role::User);
    }

    #[tokio::test]
    async fn refresh_rejects_invalid_and_orphaned_tokens() {
        let state = test_state();

        let garbage = refresh(
            State(state.clone()),
            Json(RefreshRequest {
                refresh_token: "not.a.token".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(garbage, AuthError::InvalidToken);

        let orphan_token = state
            .tokens
            .issue("ghost@example.com", Role::User, state.auth.refresh_ttl)
            .unwrap();
        let orphan = refresh(
            State(state),
            Json(RefreshRequest {
                refresh_token: orphan_token,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(orphan, AuthError::IdentityNotFound);
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Mina@Example.COM ").unwrap(), "mina@example.com");
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("mina@localhost").is_err());
    }
}
