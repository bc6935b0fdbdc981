// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Connection-time authentication.
//!
//! Runs once, on the CONNECT frame. Steps are ordered and fail fast:
//!
//! 1. Token from the frame's `Authorization: Bearer` header, falling back to
//!    the token seeded into the session at upgrade time.
//! 2. No token from either source → [`SessionError::TokenNotFound`].
//! 3. Token fails verification → [`SessionError::AuthenticationFailed`].
//! 4. Subject is unknown or deleted → [`SessionError::AuthenticationFailed`].
//! 5. The identity is bound to the session.
//!
//! The identity store is only consulted after the signature and expiry
//! checks pass.

use tracing::{debug, info, warn};

use super::frame::Frame;
use super::{Session, SessionError};
use crate::auth::{Identity, TokenCodec};
use crate::storage::IdentityStore;

const BEARER_PREFIX: &str = "Bearer ";

pub struct ConnectionAuthenticator<'a, S> {
    tokens: &'a TokenCodec,
    identities: &'a S,
}

impl<'a, S: IdentityStore> ConnectionAuthenticator<'a, S> {
    pub fn new(tokens: &'a TokenCodec, identities: &'a S) -> Self {
        Self { tokens, identities }
    }

    /// Authenticate `frame` and bind the resulting identity to `session`.
    pub fn authenticate(&self, frame: &Frame, session: &Session) -> Result<Identity, SessionError> {
        if session.is_established() {
            return Err(SessionError::InvalidOperation(
                "session is already established".into(),
            ));
        }

        let token = header_token(frame)
            .or_else(|| session.seeded_token())
            .ok_or_else(|| {
                warn!(session_id = %session.id(), "CONNECT without token");
                SessionError::TokenNotFound
            })?;

        let claims = self.tokens.verify(token).map_err(|_| {
            warn!(session_id = %session.id(), "CONNECT with invalid token");
            SessionError::AuthenticationFailed
        })?;

        let identity = self
            .identities
            .find_by_subject_if_active(claims.subject())
            .ok_or_else(|| {
                warn!(session_id = %session.id(), "CONNECT subject is not an active account");
                SessionError::AuthenticationFailed
            })?;

        let bound = session.bind_principal(identity)?.clone();
        info!(session_id = %session.id(), user_id = bound.user_id, "session established");
        Ok(bound)
    }
}

/// Bearer token from the frame's `Authorization` header.
///
/// A header without the `Bearer ` prefix counts as absent.
fn header_token(frame: &Frame) -> Option<&str> {
    let value = frame.header_ignore_case("authorization")?;
    match value.strip_prefix(BEARER_PREFIX).map(str::trim) {
        Some(token) if !token.is_empty() => Some(token),
        _ => {
            debug!("ignoring non-bearer Authorization header on CONNECT");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::auth::{Role, ACCESS_TOKEN_TTL};
    use crate::session::frame::Command;
    use crate::state::testing::TEST_SECRET;
    use crate::storage::{InMemoryStore, NewUser};

    fn fixture() -> (TokenCodec, InMemoryStore) {
        let mut store = InMemoryStore::new();
        for (email, role) in [("u@example.com", Role::User), ("v@example.com", Role::Admin)] {
            store
                .insert_user(NewUser {
                    email: email.to_string(),
                    name: "Tester".to_string(),
                    password_hash: "x".to_string(),
                    role,
                })
                .unwrap();
        }
        (TokenCodec::new(TEST_SECRET), store)
    }

    fn connect(auth: Option<&str>) -> Frame {
        let frame = Frame::new(Command::Connect).with_header("accept-version", "1.2");
        match auth {
            Some(value) => frame.with_header("Authorization", value),
            None => frame,
        }
    }

    #[test]
    fn header_token_binds_identity() {
        let (tokens, store) = fixture();
        let token = tokens.issue("u@example.com", Role::User, ACCESS_TOKEN_TTL).unwrap();
        let session = Session::new(None);

        let identity = ConnectionAuthenticator::new(&tokens, &store)
            .authenticate(&connect(Some(&format!("Bearer {token}"))), &session)
            .unwrap();

        assert_eq!(identity.email, "u@example.com");
        assert_eq!(session.principal(), Some(&identity));
    }

    #[test]
    fn seeded_token_is_used_when_header_is_absent() {
        let (tokens, store) = fixture();
        let token = tokens.issue("u@example.com", Role::User, ACCESS_TOKEN_TTL).unwrap();
        let session = Session::new(Some(token));

        ConnectionAuthenticator::new(&tokens, &store)
            .authenticate(&connect(None), &session)
            .unwrap();
        assert!(session.is_established());
    }

    #[test]
    fn header_token_wins_over_seeded_token() {
        let (tokens, store) = fixture();
        let seeded = tokens.issue("u@example.com", Role::User, ACCESS_TOKEN_TTL).unwrap();
        let header = tokens.issue("v@example.com", Role::Admin, ACCESS_TOKEN_TTL).unwrap();
        let session = Session::new(Some(seeded));

        let identity = ConnectionAuthenticator::new(&tokens, &store)
            .authenticate(&connect(Some(&format!("Bearer {header}"))), &session)
            .unwrap();
        assert_eq!(identity.email, "v@example.com");
    }

    #[test]
    fn no_token_is_rejected_and_nothing_is_bound() {
        let (tokens, store) = fixture();
        let session = Session::new(None);

        let result = ConnectionAuthenticator::new(&tokens, &store).authenticate(&connect(None), &session);
        assert_eq!(result, Err(SessionError::TokenNotFound));
        assert!(session.principal().is_none());
    }

    #[test]
    fn non_bearer_header_without_seed_is_token_not_found() {
        let (tokens, store) = fixture();
        let session = Session::new(None);

        let result = ConnectionAuthenticator::new(&tokens, &store)
            .authenticate(&connect(Some("Basic dTpw")), &session);
        assert_eq!(result, Err(SessionError::TokenNotFound));
    }

    #[test]
    fn expired_token_fails_authentication() {
        let (tokens, store) = fixture();
        let token = tokens
            .issue_at(
                "u@example.com",
                Role::User,
                Utc::now() - ChronoDuration::minutes(10),
                ACCESS_TOKEN_TTL,
            )
            .unwrap();
        let session = Session::new(None);

        let result = ConnectionAuthenticator::new(&tokens, &store)
            .authenticate(&connect(Some(&format!("Bearer {token}"))), &session);
        assert_eq!(result, Err(SessionError::AuthenticationFailed));
        assert!(!session.is_established());
    }

    #[test]
    fn deleted_subject_fails_authentication() {
        let (tokens, mut store) = fixture();
        let user = store.find_user_by_email_if_active("u@example.com").unwrap();
        store.soft_delete_user(user.id).unwrap();
        let token = tokens.issue("u@example.com", Role::User, ACCESS_TOKEN_TTL).unwrap();
        let session = Session::new(None);

        let result = ConnectionAuthenticator::new(&tokens, &store)
            .authenticate(&connect(Some(&format!("Bearer {token}"))), &session);
        assert_eq!(result, Err(SessionError::AuthenticationFailed));
    }

    #[test]
    fn established_session_cannot_be_rebound() {
        let (tokens, store) = fixture();
        let first = tokens.issue("u@example.com", Role::User, ACCESS_TOKEN_TTL).unwrap();
        let second = tokens.issue("v@example.com", Role::Admin, ACCESS_TOKEN_TTL).unwrap();
        let session = Session::new(None);
        let authenticator = ConnectionAuthenticator::new(&tokens, &store);

        authenticator
            .authenticate(&connect(Some(&format!("Bearer {first}"))), &session)
            .unwrap();
        let result = authenticator.authenticate(&connect(Some(&format!("Bearer {second}"))), &session);

        assert!(matches!(result, Err(SessionError::InvalidOperation(_))));
        assert_eq!(session.principal().unwrap().email, "u@example.com");
    }
}
