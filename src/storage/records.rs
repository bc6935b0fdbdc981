// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted row types for users, rooms, messages and reactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{Identity, Role};

/// Lifecycle tag of a chat room.
///
/// Rooms start `InProgress`; an admin moves them to one of the terminal
/// tags exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomTag {
    InProgress,
    Adopted,
    Rejected,
    Closed,
}

impl RoomTag {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RoomTag::InProgress)
    }

    /// Parse a tag from a query string value (case-insensitive).
    pub fn from_str(s: &str) -> Option<RoomTag> {
        match s.to_uppercase().as_str() {
            "IN_PROGRESS" => Some(RoomTag::InProgress),
            "ADOPTED" => Some(RoomTag::Adopted),
            "REJECTED" => Some(RoomTag::Rejected),
            "CLOSED" => Some(RoomTag::Closed),
            _ => None,
        }
    }
}

/// Reaction a user can leave on a public room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReactionKind {
    Like,
    Dislike,
}

/// Ordering for room listings by creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Recent,
    Oldest,
}

/// Stored user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub id: u64,
    pub email: String,
    pub name: String,
    /// bcrypt hash, never serialized
    pub password_hash: String,
    pub role: Role,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredUser {
    /// Project the account onto the identity used for authorization.
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            email: self.email.clone(),
            role: self.role,
            is_deleted: self.is_deleted,
        }
    }
}

/// Fields supplied when creating an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
}

/// Stored chat room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRoom {
    pub id: u64,
    pub title: String,
    pub tag: RoomTag,
    /// Owner of the room
    pub author_id: u64,
    pub is_anonymous: bool,
    pub is_public: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: u64,
    pub room_id: u64,
    /// Owner of the message
    pub sender_id: u64,
    pub body: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Stored reaction; at most one per `(user_id, room_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReaction {
    pub user_id: u64,
    pub room_id: u64,
    pub kind: ReactionKind,
    pub created_at: DateTime<Utc>,
}

/// Filter for room listings. Soft-deleted rooms are always excluded.
#[derive(Debug, Clone, Default)]
pub struct RoomFilter {
    pub author_id: Option<u64>,
    pub tag: Option<RoomTag>,
    pub public_only: bool,
    /// Case-insensitive substring of the title
    pub title_contains: Option<String>,
    pub sort: SortOrder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_tag_parses_case_insensitively() {
        assert_eq!(RoomTag::from_str("in_progress"), Some(RoomTag::InProgress));
        assert_eq!(RoomTag::from_str("CLOSED"), Some(RoomTag::Closed));
        assert_eq!(RoomTag::from_str("archived"), None);
    }

    #[test]
    fn only_in_progress_is_not_terminal() {
        assert!(!RoomTag::InProgress.is_terminal());
        assert!(RoomTag::Adopted.is_terminal());
        assert!(RoomTag::Rejected.is_terminal());
        assert!(RoomTag::Closed.is_terminal());
    }

    #[test]
    fn tags_use_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&RoomTag::InProgress).unwrap(),
            r#""IN_PROGRESS""#
        );
        assert_eq!(
            serde_json::from_str::<ReactionKind>(r#""DISLIKE""#).unwrap(),
            ReactionKind::Dislike
        );
    }

    #[test]
    fn stored_user_projects_identity() {
        let user = StoredUser {
            id: 3,
            email: "kim@example.com".to_string(),
            name: "Kim".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            role: Role::Admin,
            is_deleted: false,
            created_at: Utc::now(),
        };
        let identity = user.identity();
        assert_eq!(identity.user_id, 3);
        assert_eq!(identity.email, "kim@example.com");
        assert_eq!(identity.role, Role::Admin);
    }
}
