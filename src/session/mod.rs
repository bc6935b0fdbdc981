// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistent Chat Sessions
//!
//! Clients open a WebSocket at `/ws-chat` and speak STOMP over it.
//!
//! ## Lifecycle
//!
//! 1. The upgrade request may carry `?token=<jwt>`, stored in the session's
//!    token slot for clients that cannot set headers.
//! 2. The first frame must be `CONNECT`. [`ConnectionAuthenticator`] verifies
//!    the token and binds the identity to the [`Session`] exactly once.
//!    Any failure here closes the socket.
//! 3. Every `SUBSCRIBE` and `SEND` passes through [`OperationAuthorizer`]
//!    (recovers the bound identity without re-verifying the token) and
//!    [`RoomAccessGuard`] (room ownership or admin). A rejection produces an
//!    `ERROR` frame for that operation only; the session stays open.
//!
//! ## Destinations
//!
//! | Direction | Destination | Room id from |
//! |-----------|-------------|--------------|
//! | subscribe | `/sub/chat/room/{roomId}` | last path segment |
//! | publish | `/pub/chat/room/{roomId}` | last path segment |
//! | publish | `/pub/chat/send` | `roomId` field of the JSON body |

pub mod broker;
pub mod connect;
pub mod frame;
pub mod handler;
pub mod interceptor;

use std::sync::OnceLock;

use thiserror::Error;
use uuid::Uuid;

use crate::auth::Identity;
use crate::policy::DenyReason;

pub use broker::{Broker, BrokerMessage};
pub use connect::ConnectionAuthenticator;
pub use frame::{decode_frames, Command, Frame, FrameError};
pub use handler::ws_chat;
pub use interceptor::{AuthorizedOperation, InboundFrame, OperationAuthorizer, RoomAccessGuard};

/// Prefix of room stream destinations clients subscribe to.
pub const ROOM_TOPIC_PREFIX: &str = "/sub/chat/room/";

/// Publish destination whose room id travels in the body.
pub const SEND_DESTINATION: &str = "/pub/chat/send";

/// Prefix of publish destinations carrying the room id in the path.
pub const ROOM_PUBLISH_PREFIX: &str = "/pub/chat/room/";

/// Broadcast destination for a room's stream.
pub fn room_topic(room_id: u64) -> String {
    format!("{ROOM_TOPIC_PREFIX}{room_id}")
}

/// State of one persistent connection.
///
/// Holds the handshake token slot and at most one bound principal. The
/// principal is set once and cannot be replaced for the session's lifetime.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    token: Option<String>,
    principal: OnceLock<Identity>,
}

impl Session {
    /// New, not yet established session with an optional pre-seeded token.
    pub fn new(seeded_token: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: seeded_token.filter(|token| !token.is_empty()),
            principal: OnceLock::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Token stored before the first frame, if any.
    pub fn seeded_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Identity bound at CONNECT.
    pub fn principal(&self) -> Option<&Identity> {
        self.principal.get()
    }

    pub fn is_established(&self) -> bool {
        self.principal.get().is_some()
    }

    /// Bind the principal. Fails if one is already bound.
    pub(crate) fn bind_principal(&self, identity: Identity) -> Result<&Identity, SessionError> {
        self.principal
            .set(identity)
            .map_err(|_| SessionError::InvalidOperation("session is already established".into()))?;
        self.principal.get().ok_or(SessionError::AccessDenied)
    }
}

/// Session-facing failures, rendered as STOMP `ERROR` frames.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// CONNECT carried no token and none was seeded
    #[error("Authentication token is required")]
    TokenNotFound,
    /// Token failed verification or its subject is not an active account
    #[error("Invalid or expired token")]
    AuthenticationFailed,
    /// No principal on the frame or in the session
    #[error("No authentication information; please log in again")]
    AccessDenied,
    #[error("Login is required")]
    NotAuthenticated,
    #[error("You do not have permission for this chat room")]
    NotAuthorized,
    #[error("Chat room not found")]
    ResourceNotFound,
    /// Structurally invalid operation
    #[error("{0}")]
    InvalidOperation(String),
}

impl SessionError {
    /// Short label used in the ERROR frame's `message` header.
    pub fn label(&self) -> &'static str {
        match self {
            SessionError::TokenNotFound | SessionError::AuthenticationFailed => {
                "authentication failed"
            }
            SessionError::AccessDenied | SessionError::NotAuthenticated => "access denied",
            SessionError::NotAuthorized => "not authorized",
            SessionError::ResourceNotFound => "not found",
            SessionError::InvalidOperation(_) => "invalid operation",
        }
    }

    /// Render as an `ERROR` frame, echoing the client's receipt id if any.
    pub fn to_frame(&self, receipt: Option<&str>) -> Frame {
        let frame = Frame::error(self.label(), &self.to_string());
        match receipt {
            Some(receipt_id) => frame.with_header("receipt-id", receipt_id),
            None => frame,
        }
    }
}

impl From<DenyReason> for SessionError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::NotFound => SessionError::ResourceNotFound,
            DenyReason::NotAuthenticated => SessionError::NotAuthenticated,
            DenyReason::NotAuthorized => SessionError::NotAuthorized,
        }
    }
}
