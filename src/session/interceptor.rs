// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-operation checks on an established session.

use serde::Deserialize;
use tracing::{debug, warn};

use super::frame::{Command, Frame};
use super::{Session, SessionError, ROOM_PUBLISH_PREFIX, ROOM_TOPIC_PREFIX, SEND_DESTINATION};
use crate::auth::Identity;
use crate::policy::{Action, ResourceAccessPolicy};
use crate::storage::{ResourceStore, StoredRoom};

/// A client frame together with the principal attached to it.
///
/// The transport may attach a principal from its own cache; when it has
/// not, [`OperationAuthorizer`] reattaches the one bound at CONNECT.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub frame: Frame,
    pub principal: Option<Identity>,
}

impl InboundFrame {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            principal: None,
        }
    }

    /// Hook for a transport-side principal cache; the WebSocket handler
    /// builds frames with [`InboundFrame::new`] and relies on the session.
    pub fn with_principal(frame: Frame, principal: Identity) -> Self {
        Self {
            frame,
            principal: Some(principal),
        }
    }
}

/// Recovers the principal for `SUBSCRIBE` and `SEND` frames.
pub struct OperationAuthorizer;

impl OperationAuthorizer {
    /// Ensure `inbound` carries a principal, reattaching the session's.
    ///
    /// Never re-verifies the token. A missing principal is always
    /// [`SessionError::AccessDenied`], never anonymous access.
    pub fn authorize(session: &Session, inbound: &mut InboundFrame) -> Result<(), SessionError> {
        if !matches!(inbound.frame.command, Command::Subscribe | Command::Send) {
            return Ok(());
        }

        if inbound.principal.is_none() {
            inbound.principal = session.principal().cloned();
        }

        match &inbound.principal {
            Some(principal) => {
                debug!(
                    session_id = %session.id(),
                    user_id = principal.user_id,
                    command = %inbound.frame.command,
                    "principal attached"
                );
                Ok(())
            }
            None => {
                warn!(session_id = %session.id(), command = %inbound.frame.command, "no principal for operation");
                Err(SessionError::AccessDenied)
            }
        }
    }
}

/// An operation that passed the room access check.
#[derive(Debug, Clone)]
pub struct AuthorizedOperation {
    pub action: Action,
    pub room: StoredRoom,
    pub principal: Identity,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomIdField {
    room_id: Option<u64>,
}

/// Room-level authorization for `SUBSCRIBE` and `SEND`.
pub struct RoomAccessGuard<'a, S> {
    store: &'a S,
}

impl<'a, S: ResourceStore> RoomAccessGuard<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve the target room and apply the access policy.
    ///
    /// Returns `Ok(None)` for commands that carry no room.
    pub fn check(&self, inbound: &InboundFrame) -> Result<Option<AuthorizedOperation>, SessionError> {
        let (action, room_id) = match inbound.frame.command {
            Command::Subscribe => (Action::Subscribe, subscribe_room_id(&inbound.frame)?),
            Command::Send => (Action::Publish, publish_room_id(&inbound.frame)?),
            _ => return Ok(None),
        };

        let room = ResourceAccessPolicy::new(self.store).room(
            inbound.principal.as_ref(),
            room_id,
            action,
        )?;
        let principal = inbound
            .principal
            .clone()
            .ok_or(SessionError::NotAuthenticated)?;

        Ok(Some(AuthorizedOperation {
            action,
            room,
            principal,
        }))
    }
}

fn destination(frame: &Frame) -> Result<&str, SessionError> {
    frame
        .destination()
        .ok_or_else(|| SessionError::InvalidOperation("destination header is required".into()))
}

/// Room id as the final segment of a room stream destination.
fn subscribe_room_id(frame: &Frame) -> Result<u64, SessionError> {
    destination(frame)?
        .strip_prefix(ROOM_TOPIC_PREFIX)
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| SessionError::InvalidOperation("invalid chat room destination".into()))
}

/// Room id from the destination path, else from the body's `roomId`.
fn publish_room_id(frame: &Frame) -> Result<u64, SessionError> {
    let destination = destination(frame)?;

    if let Some(id) = destination.strip_prefix(ROOM_PUBLISH_PREFIX) {
        return id
            .parse()
            .map_err(|_| SessionError::InvalidOperation("invalid chat room destination".into()));
    }
    if destination != SEND_DESTINATION {
        return Err(SessionError::InvalidOperation(format!(
            "unknown destination: {destination}"
        )));
    }

    serde_json::from_str::<RoomIdField>(&frame.body)
        .ok()
        .and_then(|field| field.room_id)
        .ok_or_else(|| SessionError::InvalidOperation("SEND payload requires roomId".into()))
}
