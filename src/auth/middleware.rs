// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Stateless request authentication for Axum.
//!
//! Applied to the whole router with `from_fn_with_state`. For every request:
//!
//! 1. Paths on the allow-list pass through untouched, before any header
//!    parsing.
//! 2. `Authorization: Bearer <token>` is extracted.
//! 3. The token is verified (signature, then expiry).
//! 4. The subject is resolved to an active [`Identity`].
//! 5. The identity is inserted into the request extensions, where the
//!    [`Auth`](super::Auth) extractor picks it up.
//!
//! The identity lives only as long as the request.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::{AuthError, Identity};
use crate::state::AppState;
use crate::storage::IdentityStore;

/// Authentication middleware function.
pub async fn authenticate_request(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if state.auth.is_public(request.uri().path()) {
        return next.run(request).await;
    }

    match authenticate_headers(&state, request.headers()).await {
        Ok(identity) => {
            debug!(
                user_id = identity.user_id,
                path = %request.uri().path(),
                "request authenticated"
            );
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            warn!(path = %request.uri().path(), error = %e, "request authentication failed");
            e.into_response()
        }
    }
}

/// Extract the bearer token from request headers.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::InvalidAuthHeader)?;
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Verify the bearer token in `headers` and resolve its identity.
pub async fn authenticate_headers(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Identity, AuthError> {
    let token = bearer_token(headers)?;
    let claims = state
        .tokens
        .verify(token)
        .map_err(|_| AuthError::InvalidToken)?;

    // Verified before the store is touched
    state
        .store
        .read()
        .await
        .find_by_subject_if_active(claims.subject())
        .ok_or(AuthError::IdentityNotFound)
}
