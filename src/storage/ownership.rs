// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership of persisted resources.
//!
//! Ownership is always read from the stored row (room author, message
//! sender), never from ids supplied by the client.

use super::records::{StoredMessage, StoredReaction, StoredRoom};

/// Resource kinds subject to ownership and role checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Room,
    Message,
    Reaction,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Room => write!(f, "room"),
            ResourceType::Message => write!(f, "message"),
            ResourceType::Reaction => write!(f, "reaction"),
        }
    }
}

/// Trait for resources that have an owner.
pub trait OwnedResource {
    /// Kind of resource, for logs and error messages.
    const RESOURCE_TYPE: ResourceType;

    /// Get the owner's user id.
    fn owner_user_id(&self) -> u64;
}

impl OwnedResource for StoredRoom {
    const RESOURCE_TYPE: ResourceType = ResourceType::Room;

    fn owner_user_id(&self) -> u64 {
        self.author_id
    }
}

impl OwnedResource for StoredMessage {
    const RESOURCE_TYPE: ResourceType = ResourceType::Message;

    fn owner_user_id(&self) -> u64 {
        self.sender_id
    }
}

impl OwnedResource for StoredReaction {
    const RESOURCE_TYPE: ResourceType = ResourceType::Reaction;

    fn owner_user_id(&self) -> u64 {
        self.user_id
    }
}
