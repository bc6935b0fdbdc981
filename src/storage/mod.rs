// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistence contracts consumed by the authentication and authorization
//! core, plus the in-process implementation the server runs with.
//!
//! ## Contracts
//!
//! - [`IdentityStore`] resolves a verified token subject (or a numeric id)
//!   to an active [`Identity`](crate::auth::Identity).
//! - [`ResourceStore`] finds and mutates rooms, messages and reactions.
//!
//! Every `*_if_active` lookup excludes soft-deleted rows. Resources are
//! looked up fresh for every operation and never cached across operations.
//!
//! ## Concurrency
//!
//! Implementations are plain synchronous structs. The server keeps its
//! store behind a `tokio::sync::RwLock`; mutations (including the reaction
//! toggle) run under the write guard, which serializes them.

pub mod memory;
pub mod ownership;
pub mod records;

use thiserror::Error;

use crate::auth::Identity;

pub use memory::InMemoryStore;
pub use ownership::{OwnedResource, ResourceType};
pub use records::{
    NewUser, ReactionKind, RoomFilter, RoomTag, SortOrder, StoredMessage, StoredReaction,
    StoredRoom, StoredUser,
};

/// Error type for storage operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Entity already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Resolves verified subjects to active identities.
///
/// Must be safe for any number of concurrent readers.
pub trait IdentityStore {
    /// Find the active identity whose subject (email) matches.
    fn find_by_subject_if_active(&self, subject: &str) -> Option<Identity>;

    /// Find the active identity with the given account id.
    fn find_by_id_if_active(&self, id: u64) -> Option<Identity>;

    /// Check whether an active identity with this subject exists.
    fn exists_by_subject_if_active(&self, subject: &str) -> bool;
}

/// Finds and mutates the resources guarded by the access policy.
pub trait ResourceStore {
    /// Find a room that is not soft-deleted.
    fn find_room_if_active(&self, id: u64) -> Option<StoredRoom>;

    /// Find a message that is not soft-deleted.
    fn find_message(&self, id: u64) -> Option<StoredMessage>;

    /// Find the single reaction `user_id` left on `room_id`, if any.
    fn find_reaction(&self, user_id: u64, room_id: u64) -> Option<StoredReaction>;

    /// Create a room owned by `author_id`.
    fn insert_room(&mut self, title: String, author_id: u64) -> StoredRoom;

    /// Overwrite an existing room row.
    fn save_room(&mut self, room: &StoredRoom) -> StorageResult<()>;

    /// Persist a new message in `room_id` sent by `sender_id`.
    fn insert_message(&mut self, room_id: u64, sender_id: u64, body: String) -> StoredMessage;

    /// Overwrite an existing message row.
    fn save_message(&mut self, message: &StoredMessage) -> StorageResult<()>;

    /// Insert or replace the reaction for `(user_id, room_id)`.
    fn save_reaction(&mut self, reaction: StoredReaction);

    /// Delete the reaction for `(user_id, room_id)`. Returns whether a row existed.
    fn delete_reaction(&mut self, user_id: u64, room_id: u64) -> bool;

    /// All reactions on a room.
    fn reactions_for_room(&self, room_id: u64) -> Vec<StoredReaction>;

    /// Active messages of a room, oldest first.
    fn messages_for_room(&self, room_id: u64) -> Vec<StoredMessage>;

    /// Active rooms matching `filter`.
    fn list_rooms(&self, filter: &RoomFilter) -> Vec<StoredRoom>;
}
