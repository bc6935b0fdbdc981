// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::auth::{TokenCodec, ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL};
use crate::config::{AppConfig, DEFAULT_BCRYPT_COST, DEFAULT_PUBLIC_PATH_PREFIXES};
use crate::session::Broker;
use crate::storage::InMemoryStore;

/// Authentication settings shared by the HTTP and session authenticators.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Path prefixes that skip the stateless authenticator
    pub public_path_prefixes: Vec<String>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl AuthSettings {
    /// Whether `path` is on the authentication allow-list.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_path_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            public_path_prefixes: DEFAULT_PUBLIC_PATH_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
            access_ttl: ACCESS_TOKEN_TTL,
            refresh_ttl: REFRESH_TOKEN_TTL,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl From<&AppConfig> for AuthSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            public_path_prefixes: config.public_path_prefixes.clone(),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<InMemoryStore>>,
    pub tokens: Arc<TokenCodec>,
    pub auth: Arc<AuthSettings>,
    /// Fan-out for room streams
    pub broker: Broker,
    /// Cancelled on process shutdown; session tasks watch it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(store: InMemoryStore, tokens: TokenCodec, auth: AuthSettings) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            tokens: Arc::new(tokens),
            auth: Arc::new(auth),
            broker: Broker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(config: &AppConfig, store: InMemoryStore) -> Self {
        Self::new(
            store,
            TokenCodec::new(&config.jwt_secret),
            AuthSettings::from(config),
        )
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allow_list_covers_auth_docs_and_sessions() {
        let settings = AuthSettings::default();
        assert!(settings.is_public("/v1/auth/login"));
        assert!(settings.is_public("/docs/index.html"));
        assert!(settings.is_public("/api-doc/openapi.json"));
        assert!(settings.is_public("/health"));
        assert!(settings.is_public("/ws-chat"));
        assert!(!settings.is_public("/v1/rooms"));
        assert!(!settings.is_public("/v1/admin/users"));
    }
}
