// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Stateless token authentication for the chat API.
//!
//! ## Auth Flow
//!
//! 1. Client logs in at `/v1/auth/login` and receives an access token
//!    (5 minutes) and a refresh token (24 hours)
//! 2. Client sends `Authorization: Bearer <access token>`
//! 3. Server:
//!    - Verifies the HS256 signature, then expiry
//!    - Resolves `sub` (email) to an active account
//!    - Takes the role from the account, not from the token
//!
//! Persistent chat sessions present the same token once, on their CONNECT
//! frame; see [`crate::session`].
//!
//! ## Security
//!
//! - All non-allow-listed endpoints require authentication
//! - Expired, tampered and malformed tokens are indistinguishable to callers
//! - Unknown and deleted accounts both render as "Authentication failed"

pub mod claims;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod password;
pub mod roles;
pub mod tokens;

pub use claims::{Identity, VerifiedClaims};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use middleware::{authenticate_headers, authenticate_request, bearer_token};
pub use roles::Role;
pub use tokens::{InvalidToken, SigningError, TokenCodec, ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL};
