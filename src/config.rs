// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`AppConfig`] loaded once
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `JWT_SECRET` | HMAC secret for signing tokens (at least 32 bytes) | Required |
//! | `ACCESS_TOKEN_TTL_SECS` | Access token lifetime | `300` |
//! | `REFRESH_TOKEN_TTL_SECS` | Refresh token lifetime | `86400` |
//! | `PUBLIC_PATH_PREFIXES` | Comma-separated unauthenticated path prefixes | `/v1/auth/,/docs,/api-doc,/health,/ws-chat` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `SEED_ADMIN_EMAIL` | Admin account created at boot | Unset |
//! | `SEED_ADMIN_PASSWORD` | Password for the seeded admin | Unset |

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::auth::{ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL};

/// Environment variable name for the token signing secret.
///
/// The secret is process-wide; rotating it invalidates every outstanding
/// access and refresh token.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

/// Environment variable name for the access token lifetime in seconds.
pub const ACCESS_TOKEN_TTL_ENV: &str = "ACCESS_TOKEN_TTL_SECS";

/// Environment variable name for the refresh token lifetime in seconds.
pub const REFRESH_TOKEN_TTL_ENV: &str = "REFRESH_TOKEN_TTL_SECS";

/// Environment variable name for the authentication allow-list.
pub const PUBLIC_PATH_PREFIXES_ENV: &str = "PUBLIC_PATH_PREFIXES";

/// Environment variable name for the bind host.
pub const HOST_ENV: &str = "HOST";

/// Environment variable name for the bind port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Environment variable names for the optional boot-time admin account.
pub const SEED_ADMIN_EMAIL_ENV: &str = "SEED_ADMIN_EMAIL";
pub const SEED_ADMIN_PASSWORD_ENV: &str = "SEED_ADMIN_PASSWORD";

/// Default path prefixes that skip the stateless authenticator.
///
/// `/ws-chat` is listed because persistent sessions authenticate on their
/// CONNECT frame instead.
pub const DEFAULT_PUBLIC_PATH_PREFIXES: &[&str] =
    &["/v1/auth/", "/docs", "/api-doc", "/health", "/ws-chat"];

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Minimum accepted length of `JWT_SECRET` in bytes (HS256 key size).
pub const MIN_SECRET_LEN: usize = 32;

/// Default bcrypt cost for password hashing.
pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// Configuration errors surfaced at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} must be at least {min} bytes")]
    SecretTooShort { name: &'static str, min: usize },
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Admin account created at boot when both seed variables are set.
#[derive(Clone)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Application configuration loaded from the environment.
#[derive(Clone)]
pub struct AppConfig {
    pub jwt_secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub public_path_prefixes: Vec<String>,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    pub seed_admin: Option<SeedAdmin>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("public_path_prefixes", &self.public_path_prefixes)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_format", &self.log_format)
            .field("seed_admin", &self.seed_admin)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup(JWT_SECRET_ENV)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?
            .into_bytes();
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::SecretTooShort {
                name: JWT_SECRET_ENV,
                min: MIN_SECRET_LEN,
            });
        }

        let access_ttl = parse_secs(&lookup, ACCESS_TOKEN_TTL_ENV, ACCESS_TOKEN_TTL)?;
        let refresh_ttl = parse_secs(&lookup, REFRESH_TOKEN_TTL_ENV, REFRESH_TOKEN_TTL)?;

        let public_path_prefixes = match lookup(PUBLIC_PATH_PREFIXES_ENV) {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|prefix| !prefix.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_PUBLIC_PATH_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
        };

        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup(PORT_ENV) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: PORT_ENV,
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let log_format = lookup(LOG_FORMAT_ENV)
            .map(|raw| LogFormat::from_str(&raw))
            .unwrap_or_default();

        let seed_admin = match (lookup(SEED_ADMIN_EMAIL_ENV), lookup(SEED_ADMIN_PASSWORD_ENV)) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(SeedAdmin { email, password })
            }
            _ => None,
        };

        Ok(Self {
            jwt_secret,
            access_ttl,
            refresh_ttl,
            public_path_prefixes,
            host,
            port,
            log_format,
            seed_admin,
        })
    }

    /// Socket address to bind the server to.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            name: HOST_ENV,
            value: raw,
        })
    }
}

fn parse_secs<F>(lookup: &F, name: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::Invalid { name, value: raw }),
        },
        None => Ok(default),
    }
}
