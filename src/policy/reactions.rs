// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Reaction toggle.
//!
//! A user holds at most one reaction per room. Repeating the same kind
//! removes it; sending the other kind switches it. Counts are always
//! recomputed from the stored rows after the mutation.

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::auth::Identity;
use crate::storage::{ReactionKind, ResourceStore, StoredReaction};

use super::DenyReason;

/// Aggregated reaction counts for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReactionCounts {
    pub room_id: u64,
    pub like_count: usize,
    pub dislike_count: usize,
}

/// What the toggle did to the caller's reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Created(ReactionKind),
    Removed(ReactionKind),
    Switched { from: ReactionKind, to: ReactionKind },
}

/// Count the reactions currently stored for `room_id`.
pub fn count_reactions<S: ResourceStore>(store: &S, room_id: u64) -> ReactionCounts {
    let reactions = store.reactions_for_room(room_id);
    let like_count = reactions
        .iter()
        .filter(|reaction| reaction.kind == ReactionKind::Like)
        .count();

    ReactionCounts {
        room_id,
        like_count,
        dislike_count: reactions.len() - like_count,
    }
}

/// Toggle `identity`'s reaction on a room.
///
/// The room must exist, be active and be public; otherwise `NotFound`.
/// Callers must hold exclusive access to `store` for the whole call so
/// concurrent toggles on the same pair serialize.
pub fn toggle_reaction<S: ResourceStore>(
    store: &mut S,
    identity: &Identity,
    room_id: u64,
    kind: ReactionKind,
) -> Result<(ToggleOutcome, ReactionCounts), DenyReason> {
    match store.find_room_if_active(room_id) {
        Some(room) if room.is_public => {}
        _ => return Err(DenyReason::NotFound),
    }

    let user_id = identity.user_id;
    let outcome = match store.find_reaction(user_id, room_id) {
        None => {
            store.save_reaction(StoredReaction {
                user_id,
                room_id,
                kind,
                created_at: Utc::now(),
            });
            ToggleOutcome::Created(kind)
        }
        Some(existing) if existing.kind == kind => {
            store.delete_reaction(user_id, room_id);
            ToggleOutcome::Removed(kind)
        }
        Some(existing) => {
            let from = existing.kind;
            store.save_reaction(StoredReaction { kind, ..existing });
            ToggleOutcome::Switched { from, to: kind }
        }
    };

    let counts = count_reactions(store, room_id);
    info!(
        user_id,
        room_id,
        ?outcome,
        likes = counts.like_count,
        dislikes = counts.dislike_count,
        "reaction toggled"
    );
    Ok((outcome, counts))
}
