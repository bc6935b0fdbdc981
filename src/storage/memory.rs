// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process store backing the server.
//!
//! Rows live in hash maps keyed by numeric id; reactions are keyed by
//! `(user_id, room_id)` so a second reaction for the same pair can only
//! replace the first. Soft-deleted rows stay in the maps and are filtered
//! out by every lookup.

use std::collections::HashMap;

use chrono::Utc;

use crate::auth::Identity;

use super::records::{
    NewUser, RoomFilter, RoomTag, SortOrder, StoredMessage, StoredReaction, StoredRoom,
    StoredUser,
};
use super::{IdentityStore, ResourceStore, StorageError, StorageResult};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: HashMap<u64, StoredUser>,
    rooms: HashMap<u64, StoredRoom>,
    messages: HashMap<u64, StoredMessage>,
    reactions: HashMap<(u64, u64), StoredReaction>,
    next_user_id: u64,
    next_room_id: u64,
    next_message_id: u64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account. Fails if an active account already uses the email.
    pub fn insert_user(&mut self, user: NewUser) -> StorageResult<StoredUser> {
        if self.exists_by_subject_if_active(&user.email) {
            return Err(StorageError::AlreadyExists(format!("User {}", user.email)));
        }

        self.next_user_id += 1;
        let stored = StoredUser {
            id: self.next_user_id,
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            role: user.role,
            is_deleted: false,
            created_at: Utc::now(),
        };
        self.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    /// Find an active account by email, including its password hash.
    pub fn find_user_by_email_if_active(&self, email: &str) -> Option<StoredUser> {
        self.users
            .values()
            .find(|user| !user.is_deleted && user.email == email)
            .cloned()
    }

    /// Find an active account by id.
    pub fn find_user_if_active(&self, id: u64) -> Option<StoredUser> {
        self.users.get(&id).filter(|user| !user.is_deleted).cloned()
    }

    /// All active accounts, ordered by id.
    pub fn list_active_users(&self) -> Vec<StoredUser> {
        let mut users: Vec<StoredUser> = self
            .users
            .values()
            .filter(|user| !user.is_deleted)
            .cloned()
            .collect();
        users.sort_by_key(|user| user.id);
        users
    }

    /// Overwrite an active account's email, name or password hash.
    ///
    /// Fails if another active account already uses the new email.
    pub fn save_user(&mut self, user: &StoredUser) -> StorageResult<()> {
        let taken = self
            .users
            .values()
            .any(|other| other.id != user.id && !other.is_deleted && other.email == user.email);
        if taken {
            return Err(StorageError::AlreadyExists(format!("User {}", user.email)));
        }

        match self.users.get_mut(&user.id) {
            Some(existing) if !existing.is_deleted => {
                existing.email = user.email.clone();
                existing.name = user.name.clone();
                existing.password_hash = user.password_hash.clone();
                Ok(())
            }
            _ => Err(StorageError::NotFound(format!("User {}", user.id))),
        }
    }

    /// Soft-delete an active account.
    pub fn soft_delete_user(&mut self, id: u64) -> StorageResult<()> {
        match self.users.get_mut(&id) {
            Some(user) if !user.is_deleted => {
                user.is_deleted = true;
                Ok(())
            }
            _ => Err(StorageError::NotFound(format!("User {id}"))),
        }
    }
}

impl IdentityStore for InMemoryStore {
    fn find_by_subject_if_active(&self, subject: &str) -> Option<Identity> {
        self.find_user_by_email_if_active(subject)
            .map(|user| user.identity())
    }

    fn find_by_id_if_active(&self, id: u64) -> Option<Identity> {
        self.find_user_if_active(id).map(|user| user.identity())
    }

    fn exists_by_subject_if_active(&self, subject: &str) -> bool {
        self.users
            .values()
            .any(|user| !user.is_deleted && user.email == subject)
    }
}

impl ResourceStore for InMemoryStore {
    fn find_room_if_active(&self, id: u64) -> Option<StoredRoom> {
        self.rooms.get(&id).filter(|room| !room.is_deleted).cloned()
    }

    fn find_message(&self, id: u64) -> Option<StoredMessage> {
        self.messages
            .get(&id)
            .filter(|message| !message.is_deleted)
            .cloned()
    }

    fn find_reaction(&self, user_id: u64, room_id: u64) -> Option<StoredReaction> {
        self.reactions.get(&(user_id, room_id)).cloned()
    }

    fn insert_room(&mut self, title: String, author_id: u64) -> StoredRoom {
        self.next_room_id += 1;
        let now = Utc::now();
        let room = StoredRoom {
            id: self.next_room_id,
            title,
            tag: RoomTag::InProgress,
            author_id,
            is_anonymous: false,
            is_public: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.rooms.insert(room.id, room.clone());
        room
    }

    fn save_room(&mut self, room: &StoredRoom) -> StorageResult<()> {
        let Some(existing) = self.rooms.get_mut(&room.id) else {
            return Err(StorageError::NotFound(format!("Room {}", room.id)));
        };
        *existing = StoredRoom {
            updated_at: Utc::now(),
            ..room.clone()
        };
        Ok(())
    }

    fn insert_message(&mut self, room_id: u64, sender_id: u64, body: String) -> StoredMessage {
        self.next_message_id += 1;
        let message = StoredMessage {
            id: self.next_message_id,
            room_id,
            sender_id,
            body,
            is_deleted: false,
            created_at: Utc::now(),
        };
        self.messages.insert(message.id, message.clone());
        message
    }

    fn save_message(&mut self, message: &StoredMessage) -> StorageResult<()> {
        let Some(existing) = self.messages.get_mut(&message.id) else {
            return Err(StorageError::NotFound(format!("Message {}", message.id)));
        };
        *existing = message.clone();
        Ok(())
    }

    fn save_reaction(&mut self, reaction: StoredReaction) {
        self.reactions
            .insert((reaction.user_id, reaction.room_id), reaction);
    }

    fn delete_reaction(&mut self, user_id: u64, room_id: u64) -> bool {
        self.reactions.remove(&(user_id, room_id)).is_some()
    }

    fn reactions_for_room(&self, room_id: u64) -> Vec<StoredReaction> {
        self.reactions
            .values()
            .filter(|reaction| reaction.room_id == room_id)
            .cloned()
            .collect()
    }

    fn messages_for_room(&self, room_id: u64) -> Vec<StoredMessage> {
        let mut messages: Vec<StoredMessage> = self
            .messages
            .values()
            .filter(|message| message.room_id == room_id && !message.is_deleted)
            .cloned()
            .collect();
        messages.sort_by_key(|message| (message.created_at, message.id));
        messages
    }

    fn list_rooms(&self, filter: &RoomFilter) -> Vec<StoredRoom> {
        let mut rooms: Vec<StoredRoom> = self
            .rooms
            .values()
            .filter(|room| !room.is_deleted)
            .filter(|room| !filter.public_only || room.is_public)
            .filter(|room| filter.author_id.map_or(true, |id| room.author_id == id))
            .filter(|room| filter.tag.map_or(true, |tag| room.tag == tag))
            .filter(|room| {
                filter.title_contains.as_deref().map_or(true, |needle| {
                    room.title.to_lowercase().contains(&needle.to_lowercase())
                })
            })
            .cloned()
            .collect();

        rooms.sort_by_key(|room| (room.created_at, room.id));
        if filter.sort == SortOrder::Recent {
            rooms.reverse();
        }
        rooms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::storage::ReactionKind;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Tester".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            role: Role::User,
        }
    }

    #[test]
    fn insert_user_rejects_duplicate_active_email() {
        let mut store = InMemoryStore::new();
        store.insert_user(new_user("a@example.com")).unwrap();

        let result = store.insert_user(new_user("a@example.com"));
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
    }

    #[test]
    fn deleted_user_is_invisible_to_identity_lookups() {
        let mut store = InMemoryStore::new();
        let user = store.insert_user(new_user("a@example.com")).unwrap();
        assert!(store.exists_by_subject_if_active("a@example.com"));

        store.soft_delete_user(user.id).unwrap();

        assert!(store.find_by_subject_if_active("a@example.com").is_none());
        assert!(store.find_by_id_if_active(user.id).is_none());
        assert!(!store.exists_by_subject_if_active("a@example.com"));
        // Email can be reused after deletion
        assert!(store.insert_user(new_user("a@example.com")).is_ok());
    }

    #[test]
    fn save_user_keeps_emails_unique_and_ignores_deleted_rows() {
        let mut store = InMemoryStore::new();
        let first = store.insert_user(new_user("a@example.com")).unwrap();
        let second = store.insert_user(new_user("b@example.com")).unwrap();

        let mut renamed = second.clone();
        renamed.email = "a@example.com".to_string();
        assert!(matches!(store.save_user(&renamed), Err(StorageError::AlreadyExists(_))));

        renamed.email = "c@example.com".to_string();
        renamed.name = "Renamed".to_string();
        store.save_user(&renamed).unwrap();
        let saved = store.find_user_if_active(second.id).unwrap();
        assert_eq!(saved.email, "c@example.com");
        assert_eq!(saved.name, "Renamed");
        assert!(store.find_by_subject_if_active("b@example.com").is_none());

        store.soft_delete_user(first.id).unwrap();
        assert!(matches!(store.save_user(&first), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn title_filter_is_case_insensitive() {
        let mut store = InMemoryStore::new();
        let heating = store.insert_room("Dorm Heating".to_string(), 1);
        store.insert_room("Wifi".to_string(), 1);

        let found = store.list_rooms(&RoomFilter {
            title_contains: Some("heat".to_string()),
            ..Default::default()
        });
        assert_eq!(found, vec![heating]);
    }

    #[test]
    fn soft_deleted_room_is_not_found() {
        let mut store = InMemoryStore::new();
        let mut room = store.insert_room("Room".to_string(), 1);
        room.is_deleted = true;
        store.save_room(&room).unwrap();

        assert!(store.find_room_if_active(room.id).is_none());
        assert!(store.list_rooms(&RoomFilter::default()).is_empty());
    }

    #[test]
    fn soft_deleted_message_is_excluded() {
        let mut store = InMemoryStore::new();
        let room = store.insert_room("Room".to_string(), 1);
        let keep = store.insert_message(room.id, 1, "first".to_string());
        let mut gone = store.insert_message(room.id, 1, "second".to_string());
        gone.is_deleted = true;
        store.save_message(&gone).unwrap();

        assert!(store.find_message(gone.id).is_none());
        assert_eq!(store.messages_for_room(room.id), vec![keep]);
    }

    #[test]
    fn reaction_rows_are_unique_per_pair() {
        let mut store = InMemoryStore::new();
        for kind in [ReactionKind::Like, ReactionKind::Dislike] {
            store.save_reaction(StoredReaction {
                user_id: 1,
                room_id: 2,
                kind,
                created_at: Utc::now(),
            });
        }

        let reactions = store.reactions_for_room(2);
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].kind, ReactionKind::Dislike);
        assert!(store.delete_reaction(1, 2));
        assert!(!store.delete_reaction(1, 2));
    }

    #[test]
    fn list_rooms_applies_filter_and_order() {
        let mut store = InMemoryStore::new();
        let first = store.insert_room("first".to_string(), 1);
        let second = store.insert_room("second".to_string(), 2);
        let mut private = store.insert_room("private".to_string(), 1);
        private.is_public = false;
        store.save_room(&private).unwrap();

        let recent = store.list_rooms(&RoomFilter {
            public_only: true,
            ..Default::default()
        });
        assert_eq!(
            recent.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );

        let mine = store.list_rooms(&RoomFilter {
            author_id: Some(1),
            sort: SortOrder::Oldest,
            ..Default::default()
        });
        assert_eq!(
            mine.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![first.id, private.id]
        );
    }
}
