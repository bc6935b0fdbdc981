// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Stateless token issuance and verification.
//!
//! Tokens are HS256 JWTs signed with a process-wide secret and carry
//! `{sub, role, iat, exp}`. Access and refresh tokens use the same wire
//! format; callers pick the lifetime.
//!
//! Every verification failure (bad structure, bad signature, expired)
//! collapses to [`InvalidToken`]. The concrete cause is only logged at
//! debug level so callers cannot build an oracle on it.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use tracing::debug;

use super::claims::{TokenClaims, VerifiedClaims};
use super::Role;

/// Lifetime of access tokens (5 minutes).
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Lifetime of refresh tokens (24 hours).
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The single outcome of a failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid token")]
pub struct InvalidToken;

/// Token could not be signed.
#[derive(Debug, Error)]
#[error("token signing failed: {0}")]
pub struct SigningError(String);

/// Issues and verifies signed tokens.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec from the shared HMAC secret.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token for `subject` that expires `ttl` from now.
    pub fn issue(&self, subject: &str, role: Role, ttl: Duration) -> Result<String, SigningError> {
        self.issue_at(subject, role, Utc::now(), ttl)
    }

    /// Issue a token with an explicit issue time.
    pub fn issue_at(
        &self,
        subject: &str,
        role: Role,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, SigningError> {
        let iat = issued_at.timestamp();
        let claims = TokenClaims {
            sub: subject.to_string(),
            role,
            iat,
            exp: iat.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SigningError(e.to_string()))
    }

    /// Verify signature and expiry, returning the claims on success.
    ///
    /// A token is valid only while the current time is strictly before its
    /// expiry.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, InvalidToken> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => debug!("token rejected: expired"),
                ErrorKind::InvalidSignature => debug!("token rejected: signature mismatch"),
                kind => debug!(?kind, "token rejected: malformed"),
            }
            InvalidToken
        })?;

        if data.claims.exp <= Utc::now().timestamp() {
            debug!("token rejected: expired");
            return Err(InvalidToken);
        }

        Ok(VerifiedClaims::new(data.claims))
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenCodec([REDACTED])")
    }
}
