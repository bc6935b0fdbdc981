// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Chat - Authenticated Chat Room Service
//!
//! This crate provides the authentication and authorization core of a chat
//! backend: stateless bearer-token checks for the REST API and persistent
//! STOMP-over-WebSocket sessions whose principal is bound once at CONNECT.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token codec, password hashing, stateless request authentication
//! - `policy` - Ownership-or-admin access decisions and the reaction toggle
//! - `session` - WebSocket chat sessions (STOMP frames, broker, interceptors)
//! - `storage` - Identity and resource stores

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod policy;
pub mod session;
pub mod state;
pub mod storage;
