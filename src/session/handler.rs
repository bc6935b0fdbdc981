// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! WebSocket endpoint speaking STOMP.

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use super::broker::BrokerMessage;
use super::connect::ConnectionAuthenticator;
use super::frame::{decode_frames, Command, Frame};
use super::interceptor::{InboundFrame, OperationAuthorizer, RoomAccessGuard};
use super::{room_topic, Session, SessionError};
use crate::models::{ChatMessageResponse, PublishPayload};
use crate::state::AppState;
use crate::auth::Identity;
use crate::storage::{IdentityStore, ResourceStore};

/// Outbound frames buffered per connection.
const OUTBOUND_BUFFER: usize = 128;

/// Longest accepted chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

const SERVER_NAME: &str = concat!("relational-chat/", env!("CARGO_PKG_VERSION"));

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Seeds the session token slot for clients that cannot set headers
    pub token: Option<String>,
}

/// Upgrade to a chat session.
pub async fn ws_chat(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state, params.token))
}

enum Flow {
    Continue,
    Close,
}

/// Live subscriptions of one session, keyed by client subscription id.
type Subscriptions = HashMap<String, JoinHandle<()>>;

async fn run_session(socket: WebSocket, state: AppState, seeded_token: Option<String>) {
    let session = Session::new(seeded_token);
    let span = info_span!("session", session_id = %session.id());

    async move {
        let (mut sink, mut stream) = socket.split();
        let (outbound, mut rx) = mpsc::channel::<Frame>(OUTBOUND_BUFFER);

        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if sink.send(Message::Text(frame.encode().into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let mut subscriptions = Subscriptions::new();

        'session: loop {
            let message = tokio::select! {
                _ = state.shutdown.cancelled() => {
                    debug!("shutdown requested");
                    break;
                }
                message = stream.next() => message,
            };

            let text = match message {
                Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        let err = SessionError::InvalidOperation("frames must be UTF-8".into());
                        if reject(&session, &outbound, err, None).await.is_close() {
                            break;
                        }
                        continue;
                    }
                },
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    break;
                }
            };

            let frames = match decode_frames(&text) {
                Ok(frames) => frames,
                Err(e) => {
                    let err = SessionError::InvalidOperation(e.to_string());
                    if reject(&session, &outbound, err, None).await.is_close() {
                        break;
                    }
                    continue;
                }
            };

            for frame in frames {
                if let Flow::Close =
                    handle_frame(&state, &session, frame, &outbound, &mut subscriptions).await
                {
                    break 'session;
                }
            }
        }

        for (_, forwarder) in subscriptions.drain() {
            forwarder.abort();
        }
        drop(outbound);
        let _ = writer.await;
        info!(established = session.is_established(), "session closed");
    }
    .instrument(span)
    .await
}

impl Flow {
    fn is_close(&self) -> bool {
        matches!(self, Flow::Close)
    }
}

/// Send an ERROR frame. Only sessions that never finished CONNECT close.
async fn reject(
    session: &Session,
    outbound: &mpsc::Sender<Frame>,
    err: SessionError,
    receipt: Option<&str>,
) -> Flow {
    warn!(error = %err, established = session.is_established(), "operation rejected");
    let _ = outbound.send(err.to_frame(receipt)).await;
    if session.is_established() {
        Flow::Continue
    } else {
        Flow::Close
    }
}

async fn handle_frame(
    state: &AppState,
    session: &Session,
    frame: Frame,
    outbound: &mpsc::Sender<Frame>,
    subscriptions: &mut Subscriptions,
) -> Flow {
    let receipt = frame.receipt().map(str::to_string);
    let command = frame.command;

    if command == Command::Disconnect {
        if let Some(receipt_id) = &receipt {
            let _ = outbound.send(Frame::receipt_for(receipt_id)).await;
        }
        return Flow::Close;
    }

    let result = if !session.is_established() {
        if command.is_connect() {
            connect(state, session, &frame).await.map(Some)
        } else {
            Err(SessionError::InvalidOperation(format!(
                "expected CONNECT, got {command}"
            )))
        }
    } else {
        match command {
            Command::Connect | Command::Stomp => Err(SessionError::InvalidOperation(
                "session is already established".into(),
            )),
            Command::Subscribe => subscribe(state, session, frame, outbound, subscriptions)
                .await
                .map(|_| None),
            Command::Unsubscribe => unsubscribe(&frame, subscriptions).map(|_| None),
            Command::Send => publish(state, session, frame).await.map(|_| None),
            other => Err(SessionError::InvalidOperation(format!(
                "{other} is not a client command"
            ))),
        }
    };

    match result {
        Ok(reply) => {
            if let Some(reply) = reply {
                let _ = outbound.send(reply).await;
            }
            if let Some(receipt_id) = &receipt {
                let _ = outbound.send(Frame::receipt_for(receipt_id)).await;
            }
            Flow::Continue
        }
        Err(err) => reject(session, outbound, err, receipt.as_deref()).await,
    }
}

async fn connect(state: &AppState, session: &Session, frame: &Frame) -> Result<Frame, SessionError> {
    let identity = {
        let store = state.store.read().await;
        ConnectionAuthenticator::new(&state.tokens, &*store).authenticate(frame, session)?
    };

    Ok(Frame::new(Command::Connected)
        .with_header("version", "1.2")
        .with_header("heart-beat", "0,0")
        .with_header("server", SERVER_NAME)
        .with_header("session", session.id().to_string())
        .with_header("user-name", identity.email))
}

async fn subscribe(
    state: &AppState,
    session: &Session,
    frame: Frame,
    outbound: &mpsc::Sender<Frame>,
    subscriptions: &mut Subscriptions,
) -> Result<(), SessionError> {
    let mut inbound = InboundFrame::new(frame);
    OperationAuthorizer::authorize(session, &mut inbound)?;

    let subscription_id = inbound
        .frame
        .header("id")
        .ok_or_else(|| SessionError::InvalidOperation("SUBSCRIBE requires an id header".into()))?
        .to_string();
    if subscriptions.contains_key(&subscription_id) {
        return Err(SessionError::InvalidOperation(format!(
            "subscription id {subscription_id} is already in use"
        )));
    }

    let operation = {
        let store = state.store.read().await;
        let operation = RoomAccessGuard::new(&*store)
            .check(&inbound)?
            .ok_or_else(|| SessionError::InvalidOperation("SUBSCRIBE requires a room".into()))?;
        ensure_active(&*store, &operation.principal)?;
        operation
    };

    let destination = room_topic(operation.room.id);
    let receiver = state.broker.subscribe(&destination);
    let forwarder = tokio::spawn(
        forward(receiver, subscription_id.clone(), destination, outbound.clone())
            .instrument(tracing::Span::current()),
    );
    subscriptions.insert(subscription_id, forwarder);

    info!(
        user_id = operation.principal.user_id,
        room_id = operation.room.id,
        "subscribed"
    );
    Ok(())
}

fn unsubscribe(frame: &Frame, subscriptions: &mut Subscriptions) -> Result<(), SessionError> {
    let subscription_id = frame
        .header("id")
        .ok_or_else(|| SessionError::InvalidOperation("UNSUBSCRIBE requires an id header".into()))?;

    match subscriptions.remove(subscription_id) {
        Some(forwarder) => {
            forwarder.abort();
            debug!(subscription_id, "unsubscribed");
            Ok(())
        }
        None => Err(SessionError::InvalidOperation(format!(
            "unknown subscription id {subscription_id}"
        ))),
    }
}

/// The principal was resolved at CONNECT; the account may have been
/// soft-deleted since. Reads the store, never the token.
fn ensure_active<S: IdentityStore>(store: &S, principal: &Identity) -> Result<(), SessionError> {
    if store.find_by_id_if_active(principal.user_id).is_some() {
        return Ok(());
    }
    warn!(user_id = principal.user_id, "operation from a deleted account");
    Err(SessionError::AccessDenied)
}

/// Persist a message, then broadcast it to the room's stream.
async fn publish(state: &AppState, session: &Session, frame: Frame) -> Result<(), SessionError> {
    let mut inbound = InboundFrame::new(frame);
    OperationAuthorizer::authorize(session, &mut inbound)?;

    let stored = {
        let mut store = state.store.write().await;
        let operation = RoomAccessGuard::new(&*store)
            .check(&inbound)?
            .ok_or_else(|| SessionError::InvalidOperation("SEND requires a room".into()))?;
        ensure_active(&*store, &operation.principal)?;

        let payload: PublishPayload = serde_json::from_str(&inbound.frame.body).map_err(|_| {
            SessionError::InvalidOperation("SEND payload must be JSON with a message".into())
        })?;
        let body = payload.message.trim();
        if body.is_empty() {
            return Err(SessionError::InvalidOperation("message must not be empty".into()));
        }
        if body.chars().count() > MAX_MESSAGE_CHARS {
            return Err(SessionError::InvalidOperation(format!(
                "message must be at most {MAX_MESSAGE_CHARS} characters"
            )));
        }

        store.insert_message(operation.room.id, operation.principal.user_id, body.to_string())
    };

    let event = ChatMessageResponse::from(&stored);
    let body = serde_json::to_string(&event)
        .map_err(|e| SessionError::InvalidOperation(format!("could not encode message: {e}")))?;
    let receivers = state.broker.publish(
        &room_topic(stored.room_id),
        BrokerMessage {
            message_id: stored.id.to_string(),
            body,
        },
    );

    info!(
        user_id = stored.sender_id,
        room_id = stored.room_id,
        message_id = stored.id,
        receivers,
        "message published"
    );
    Ok(())
}

/// Relay broker messages for one subscription as MESSAGE frames.
async fn forward(
    mut receiver: broadcast::Receiver<std::sync::Arc<BrokerMessage>>,
    subscription_id: String,
    destination: String,
    outbound: mpsc::Sender<Frame>,
) {
    loop {
        match receiver.recv().await {
            Ok(message) => {
                let frame = Frame::new(Command::Message)
                    .with_header("subscription", subscription_id.as_str())
                    .with_header("message-id", message.message_id.as_str())
                    .with_header("destination", destination.as_str())
                    .with_header("content-type", "application/json")
                    .with_body(message.body.as_str());
                if outbound.send(frame).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(subscription_id = %subscription_id, skipped, "subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
