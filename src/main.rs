// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::error::Error;

use relational_chat_server::{
    api::router,
    auth::{password::hash_password, Role},
    config::{AppConfig, LogFormat, DEFAULT_BCRYPT_COST},
    state::AppState,
    storage::{InMemoryStore, NewUser},
};
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);
    info!(?config, "configuration loaded");

    let mut store = InMemoryStore::new();

    if let Some(seed) = &config.seed_admin {
        let password_hash = hash_password(&seed.password, DEFAULT_BCRYPT_COST).await?;
        let admin = store.insert_user(NewUser {
            email: seed.email.trim().to_lowercase(),
            name: "admin".to_string(),
            password_hash,
            role: Role::Admin,
        })?;
        info!(user_id = admin.id, "seeded admin account");
    }

    let shutdown = CancellationToken::new();
    let state = AppState::from_config(&config, store).with_shutdown(shutdown.clone());
    let app = router(state);

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Relational Chat listening (docs at /docs, sessions at /ws-chat)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("server stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM, then cancel `shutdown` so open sessions close.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining sessions");
    shutdown.cancel();
}
