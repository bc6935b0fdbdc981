// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and the resolved identity of a caller.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims carried inside every token issued by [`super::TokenCodec`].
///
/// Access and refresh tokens share this layout; they differ only in
/// lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TokenClaims {
    /// Subject (account email)
    pub sub: String,
    /// Role at issue time
    pub role: Role,
    /// Issued at (Unix timestamp, seconds)
    pub iat: i64,
    /// Expiration (Unix timestamp, seconds)
    pub exp: i64,
}

/// Claims that passed signature and expiry verification.
///
/// Only [`super::TokenCodec::verify`] can construct this type, so subject
/// and role can never be read from an unverified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    claims: TokenClaims,
}

impl VerifiedClaims {
    pub(super) fn new(claims: TokenClaims) -> Self {
        Self { claims }
    }

    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }

    pub fn issued_at(&self) -> i64 {
        self.claims.iat
    }

    pub fn expires_at(&self) -> i64 {
        self.claims.exp
    }
}

/// Identity resolved from a verified subject through the identity store.
///
/// This is the principal bound to requests and sessions. It is never built
/// from client-supplied fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Numeric account id
    pub user_id: u64,
    /// Account email (token subject)
    pub email: String,
    /// Current role from the identity store
    pub role: Role,
    /// Soft-delete flag
    pub is_deleted: bool,
}

impl Identity {
    /// Check if the identity has the required role.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    /// Check if this identity is an admin.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_identity(role: Role) -> Identity {
        Identity {
            user_id: 7,
            email: "user@example.com".to_string(),
            role,
            is_deleted: false,
        }
    }

    #[test]
    fn verified_claims_project_subject_and_role() {
        let claims = VerifiedClaims::new(TokenClaims {
            sub: "user@example.com".to_string(),
            role: Role::Admin,
            iat: 1_700_000_000,
            exp: 1_700_000_300,
        });
        assert_eq!(claims.subject(), "user@example.com");
        assert_eq!(claims.role(), Role::Admin);
        assert_eq!(claims.expires_at() - claims.issued_at(), 300);
    }

    #[test]
    fn admin_identity_has_all_roles() {
        let admin = sample_identity(Role::Admin);
        assert!(admin.is_admin());
        assert!(admin.has_role(Role::User));
    }

    #[test]
    fn user_identity_is_not_admin() {
        let user = sample_identity(Role::User);
        assert!(!user.is_admin());
        assert!(!user.has_role(Role::Admin));
    }

    #[test]
    fn identity_serializes_camel_case() {
        let json = serde_json::to_value(sample_identity(Role::User)).unwrap();
        assert_eq!(json["userId"], 7);
        assert_eq!(json["isDeleted"], false);
        assert_eq!(json["role"], "USER");
    }
}
