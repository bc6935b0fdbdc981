// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process fan-out for session destinations.
//!
//! One `tokio::sync::broadcast` channel per destination, created on first
//! subscribe and dropped once a publish finds no receivers left.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::debug;

/// Per-destination buffer; slower subscribers skip ahead.
const CHANNEL_CAPACITY: usize = 256;

/// A message published to a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub message_id: String,
    pub body: String,
}

#[derive(Clone, Default)]
pub struct Broker {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<Arc<BrokerMessage>>>>>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<Arc<BrokerMessage>>>> {
        // The map stays consistent even if a holder panicked
        self.channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Receive every message published to `destination` from now on.
    pub fn subscribe(&self, destination: &str) -> broadcast::Receiver<Arc<BrokerMessage>> {
        self.channels()
            .entry(destination.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish to `destination`. Returns the number of receivers reached.
    pub fn publish(&self, destination: &str, message: BrokerMessage) -> usize {
        let mut channels = self.channels();
        let Some(sender) = channels.get(destination) else {
            return 0;
        };

        match sender.send(Arc::new(message)) {
            Ok(receivers) => {
                debug!(destination, receivers, "message broadcast");
                receivers
            }
            Err(_) => {
                channels.remove(destination);
                0
            }
        }
    }

    /// Number of destinations with a live channel.
    pub fn destination_count(&self) -> usize {
        self.channels().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str) -> BrokerMessage {
        BrokerMessage {
            message_id: id.to_string(),
            body: format!("{{\"id\":\"{id}\"}}"),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_messages() {
        let broker = Broker::new();
        let mut first = broker.subscribe("/sub/chat/room/1");
        let mut second = broker.subscribe("/sub/chat/room/1");

        assert_eq!(broker.publish("/sub/chat/room/1", message("1")), 2);

        assert_eq!(first.recv().await.unwrap().message_id, "1");
        assert_eq!(second.recv().await.unwrap().message_id, "1");
    }

    #[tokio::test]
    async fn destinations_are_isolated() {
        let broker = Broker::new();
        let mut room_one = broker.subscribe("/sub/chat/room/1");
        broker.subscribe("/sub/chat/room/2");

        broker.publish("/sub/chat/room/2", message("x"));
        broker.publish("/sub/chat/room/1", message("y"));

        assert_eq!(room_one.recv().await.unwrap().message_id, "y");
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let broker = Broker::new();
        assert_eq!(broker.publish("/sub/chat/room/9", message("1")), 0);
        assert_eq!(broker.destination_count(), 0);
    }

    #[test]
    fn channel_is_removed_after_last_receiver_leaves() {
        let broker = Broker::new();
        let receiver = broker.subscribe("/sub/chat/room/3");
        assert_eq!(broker.destination_count(), 1);

        drop(receiver);
        assert_eq!(broker.publish("/sub/chat/room/3", message("1")), 0);
        assert_eq!(broker.destination_count(), 0);
    }
}
