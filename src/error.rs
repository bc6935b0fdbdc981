// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::auth::password::PasswordError;
use crate::auth::SigningError;
use crate::policy::DenyReason;
use crate::storage::{ResourceType, StorageError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Policy denial with a message naming the resource kind.
    pub fn denied(reason: DenyReason, resource: ResourceType) -> Self {
        let status = ApiError::from(reason).status;
        Self::new(status, reason.message_for(resource))
    }

    /// 500 with a generic message; the detail is only logged.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<DenyReason> for ApiError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::NotFound => ApiError::not_found("Resource not found"),
            DenyReason::NotAuthenticated => ApiError::unauthorized("Login is required"),
            DenyReason::NotAuthorized => {
                ApiError::forbidden("You do not have permission for this resource")
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            StorageError::AlreadyExists(what) => {
                ApiError::conflict(format!("{what} already exists"))
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort | PasswordError::TooLong => ApiError::bad_request(err.to_string()),
            PasswordError::Hashing(_) => ApiError::internal(err),
        }
    }
}

impl From<SigningError> for ApiError {
    fn from(err: SigningError) -> Self {
        ApiError::internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);

        let conflict = ApiError::conflict("dup");
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let internal = ApiError::internal("disk on fire");
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.message, "Internal server error");
    }

    #[test]
    fn deny_reasons_map_to_distinct_statuses() {
        assert_eq!(ApiError::from(DenyReason::NotFound).status, StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(DenyReason::NotAuthenticated).status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::from(DenyReason::NotAuthorized).status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn denial_names_the_resource() {
        let err = ApiError::denied(DenyReason::NotAuthorized, ResourceType::Message);
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.message, "You do not have permission for this message");
    }

    #[test]
    fn storage_errors_map_to_http() {
        let err = ApiError::from(StorageError::AlreadyExists("User a@b.c".to_string()));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "User a@b.c already exists");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }
}
