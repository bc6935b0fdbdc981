// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures for the REST API and the JSON bodies
//! carried over chat sessions. All types use camelCase on the wire and
//! derive `ToSchema` for the OpenAPI document.
//!
//! ## Model Categories
//!
//! - **Accounts**: signup, login, token refresh, user profiles
//! - **Rooms**: creation, listing, settings, lifecycle tags
//! - **Messages**: transcripts and session broadcasts
//! - **Reactions**: like/dislike toggles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;
use crate::storage::{ReactionKind, RoomTag, StoredMessage, StoredRoom, StoredUser};

// =============================================================================
// Account Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub user_id: u64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Access and refresh token issued at login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    /// Short-lived token for `Authorization: Bearer`
    pub access_token: String,
    /// Long-lived token to present at `/v1/auth/refresh`
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// Public view of an account. Never includes the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: u64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredUser> for UserResponse {
    fn from(user: &StoredUser) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Replaces the caller's email and display name.
///
/// Tokens carry the email as subject, so changing it ends every session
/// and token issued under the old address.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Self-service deletion must present the caller's own refresh token.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountRequest {
    pub refresh_token: String,
}

/// Admin patch of an account; omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub new_password: Option<String>,
}

// =============================================================================
// Room Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub title: String,
}

/// A chat room as seen by its author or an admin.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    pub room_id: u64,
    pub title: String,
    pub tag: RoomTag,
    pub author_id: u64,
    pub is_anonymous: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredRoom> for RoomResponse {
    fn from(room: &StoredRoom) -> Self {
        Self {
            room_id: room.id,
            title: room.title.clone(),
            tag: room.tag,
            author_id: room.author_id,
            is_anonymous: room.is_anonymous,
            is_public: room.is_public,
            created_at: room.created_at,
        }
    }
}

/// Visibility settings; omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomSettingsRequest {
    pub is_anonymous: Option<bool>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomTagRequest {
    pub tag: RoomTag,
}

// =============================================================================
// Message Models
// =============================================================================

/// A chat message, as returned in transcripts and broadcast to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageResponse {
    pub message_id: u64,
    pub room_id: u64,
    pub message: String,
    /// Sender account id; hidden for the author of an anonymous room in public views
    pub sender: Option<u64>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredMessage> for ChatMessageResponse {
    fn from(message: &StoredMessage) -> Self {
        Self {
            message_id: message.id,
            room_id: message.room_id,
            message: message.body.clone(),
            sender: Some(message.sender_id),
            is_deleted: message.is_deleted,
            created_at: message.created_at,
        }
    }
}

impl ChatMessageResponse {
    /// Public rendering: anonymous rooms hide their author as sender.
    pub fn public(message: &StoredMessage, room: &StoredRoom) -> Self {
        let mut response = Self::from(message);
        if room.is_anonymous && message.sender_id == room.author_id {
            response.sender = None;
        }
        response
    }
}

/// Full transcript of a room, oldest message first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    pub room_id: u64,
    pub title: String,
    pub items: Vec<ChatMessageResponse>,
    pub created_at: DateTime<Utc>,
}

/// Public detail of a public room with its reaction counts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicRoomDetailResponse {
    pub room_id: u64,
    pub title: String,
    pub tag: RoomTag,
    pub like_count: usize,
    pub dislike_count: usize,
    pub items: Vec<ChatMessageResponse>,
    pub created_at: DateTime<Utc>,
}

/// JSON body of a session `SEND` frame.
///
/// `roomId` is only read when the destination does not carry the room.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishPayload {
    #[serde(default)]
    pub room_id: Option<u64>,
    pub message: String,
}

// =============================================================================
// Reaction Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    pub reaction_type: ReactionKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(is_anonymous: bool) -> StoredRoom {
        StoredRoom {
            id: 5,
            title: "Heating".to_string(),
            tag: RoomTag::InProgress,
            author_id: 1,
            is_anonymous,
            is_public: true,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn message(sender_id: u64) -> StoredMessage {
        StoredMessage {
            id: 10,
            room_id: 5,
            sender_id,
            body: "it is cold".to_string(),
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn message_response_uses_camel_case_fields() {
        let json = serde_json::to_value(ChatMessageResponse::from(&message(1))).unwrap();
        assert_eq!(json["messageId"], 10);
        assert_eq!(json["roomId"], 5);
        assert_eq!(json["message"], "it is cold");
        assert_eq!(json["sender"], 1);
        assert_eq!(json["isDeleted"], false);
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn anonymous_room_hides_author_in_public_view() {
        assert_eq!(ChatMessageResponse::public(&message(1), &room(true)).sender, None);
        assert_eq!(ChatMessageResponse::public(&message(2), &room(true)).sender, Some(2));
        assert_eq!(ChatMessageResponse::public(&message(1), &room(false)).sender, Some(1));
    }

    #[test]
    fn publish_payload_room_id_is_optional() {
        let payload: PublishPayload = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(payload.room_id, None);

        let payload: PublishPayload =
            serde_json::from_str(r#"{"roomId":42,"message":"hi"}"#).unwrap();
        assert_eq!(payload.room_id, Some(42));
    }

    #[test]
    fn settings_request_fields_are_optional() {
        let request: UpdateRoomSettingsRequest = serde_json::from_str(r#"{"isPublic":false}"#).unwrap();
        assert_eq!(request.is_public, Some(false));
        assert_eq!(request.is_anonymous, None);
    }
}
