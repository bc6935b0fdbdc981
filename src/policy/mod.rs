// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Resource Access Policy
//!
//! Decides whether an identity may perform an action on a room or a
//! message. Rules are evaluated in order, first match wins:
//!
//! 1. resource missing or soft-deleted → deny `NotFound`
//! 2. no identity → deny `NotAuthenticated`
//! 3. identity is `ADMIN` → allow
//! 4. identity owns the persisted row → allow
//! 5. otherwise → deny `NotAuthorized`
//!
//! The decision is made before any side effect. Reactions follow their own
//! stateful rule in [`reactions`]; room creation and listing only need a
//! valid identity and never reach this module.

pub mod reactions;

use tracing::{debug, warn};

use crate::auth::Identity;
use crate::storage::{OwnedResource, ResourceStore, ResourceType, StoredMessage, StoredRoom};

pub use reactions::{count_reactions, toggle_reaction, ReactionCounts, ToggleOutcome};

/// Operation the caller intends to perform on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Subscribe to a room's message stream
    Subscribe,
    /// Publish a message into a room
    Publish,
    /// Read a room's transcript
    ReadTranscript,
    /// Change room visibility settings
    UpdateSettings,
    /// Soft-delete a room
    DeleteRoom,
    /// Soft-delete a message
    DeleteMessage,
}

/// Why access was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    Admin,
    Owner,
}

/// Why access was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotFound,
    NotAuthenticated,
    NotAuthorized,
}

/// Outcome of a policy evaluation. Never partially applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationDecision {
    Allow(AllowReason),
    Deny(DenyReason),
}

impl AuthorizationDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthorizationDecision::Allow(_))
    }

    pub fn into_result(self) -> Result<AllowReason, DenyReason> {
        match self {
            AuthorizationDecision::Allow(reason) => Ok(reason),
            AuthorizationDecision::Deny(reason) => Err(reason),
        }
    }
}

/// Reference to a policy-guarded resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef {
    Room(u64),
    Message(u64),
}

/// Pure decision over an already-loaded resource.
///
/// `resource` is `None` when the row is absent or soft-deleted.
pub fn decide<R: OwnedResource>(
    identity: Option<&Identity>,
    resource: Option<&R>,
) -> AuthorizationDecision {
    let Some(resource) = resource else {
        return AuthorizationDecision::Deny(DenyReason::NotFound);
    };
    let Some(identity) = identity else {
        return AuthorizationDecision::Deny(DenyReason::NotAuthenticated);
    };
    if identity.is_admin() {
        return AuthorizationDecision::Allow(AllowReason::Admin);
    }
    if resource.owner_user_id() == identity.user_id {
        return AuthorizationDecision::Allow(AllowReason::Owner);
    }
    AuthorizationDecision::Deny(DenyReason::NotAuthorized)
}

/// Store-backed policy. Resources are loaded fresh on every call.
pub struct ResourceAccessPolicy<'a, S> {
    store: &'a S,
}

impl<'a, S: ResourceStore> ResourceAccessPolicy<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Evaluate `action` on `resource` for `identity`.
    pub fn authorize(
        &self,
        identity: Option<&Identity>,
        resource: ResourceRef,
        action: Action,
    ) -> AuthorizationDecision {
        let decision = match resource {
            ResourceRef::Room(id) => decide(identity, self.store.find_room_if_active(id).as_ref()),
            ResourceRef::Message(id) => decide(identity, self.store.find_message(id).as_ref()),
        };
        debug!(
            user_id = identity.map(|i| i.user_id),
            ?resource,
            ?action,
            ?decision,
            "access decision"
        );
        decision
    }

    /// Authorize `action` on a room and return the loaded row.
    pub fn room(
        &self,
        identity: Option<&Identity>,
        room_id: u64,
        action: Action,
    ) -> Result<StoredRoom, DenyReason> {
        let room = self.store.find_room_if_active(room_id);
        evaluate(identity, room, room_id, action)
    }

    /// Authorize `action` on a message and return the loaded row.
    pub fn message(
        &self,
        identity: Option<&Identity>,
        message_id: u64,
        action: Action,
    ) -> Result<StoredMessage, DenyReason> {
        let message = self.store.find_message(message_id);
        evaluate(identity, message, message_id, action)
    }
}

fn evaluate<R: OwnedResource>(
    identity: Option<&Identity>,
    resource: Option<R>,
    resource_id: u64,
    action: Action,
) -> Result<R, DenyReason> {
    match decide(identity, resource.as_ref()).into_result() {
        Ok(reason) => {
            debug!(
                user_id = identity.map(|i| i.user_id),
                resource = %R::RESOURCE_TYPE,
                resource_id,
                ?action,
                ?reason,
                "access granted"
            );
            resource.ok_or(DenyReason::NotFound)
        }
        Err(reason) => {
            warn!(
                user_id = identity.map(|i| i.user_id),
                resource = %R::RESOURCE_TYPE,
                resource_id,
                ?action,
                ?reason,
                "access denied"
            );
            Err(reason)
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::NotFound => write!(f, "resource not found"),
            DenyReason::NotAuthenticated => write!(f, "authentication required"),
            DenyReason::NotAuthorized => write!(f, "not authorized for this resource"),
        }
    }
}

impl DenyReason {
    /// Human-readable message naming the resource kind.
    pub fn message_for(&self, resource: ResourceType) -> String {
        match self {
            DenyReason::NotFound => format!("The {resource} could not be found"),
            DenyReason::NotAuthenticated => "Login is required".to_string(),
            DenyReason::NotAuthorized => format!("You do not have permission for this {resource}"),
        }
    }
}
