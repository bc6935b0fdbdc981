// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    auth::Auth,
    error::ApiError,
    policy::{Action, ResourceAccessPolicy},
    state::AppState,
    storage::{ResourceStore, ResourceType},
};

/// Soft-delete a chat message. Sender or admin only.
#[utoipa::path(
    delete,
    path = "/v1/messages/{message_id}",
    tag = "Messages",
    params(("message_id" = u64, Path, description = "Message ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Message deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the message's sender"),
        (status = 404, description = "Message not found")
    )
)]
pub async fn delete_message(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Path(message_id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let mut store = state.store.write().await;
    let mut message = ResourceAccessPolicy::new(&*store)
        .message(Some(&identity), message_id, Action::DeleteMessage)
        .map_err(|reason| ApiError::denied(reason, ResourceType::Message))?;

    message.is_deleted = true;
    store.save_message(&message)?;

    info!(
        user_id = identity.user_id,
        room_id = message.room_id,
        message_id,
        "message deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}
