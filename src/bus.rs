//! Per-table-group pub/sub bus.
//!
//! One broadcast channel *per table*, registered in a process-wide map, so
//! membership is the group join itself rather than a filter predicate
//! evaluated per message.

use std::collections::HashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::domain::{Event, GameStateView};
use crate::table::TableStatus;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast payload for one table group. Carries every seat's private
/// projection alongside the public one so each connection can pick its own
/// view without re-querying the table manager (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMessage {
    GameAction {
        events: Vec<Event>,
        public_game_state: Option<GameStateView>,
        private_game_states: BTreeMap<String, GameStateView>,
        table_status: TableStatus,
    },
    TableAction {
        table_status: TableStatus,
    },
}

/// One `broadcast::Sender` per table, created lazily on first subscribe or
/// publish and never removed — a finished table's channel simply goes
/// quiet once every connection disconnects and drops its `Receiver`.
#[derive(Default)]
pub struct TableBus {
    channels: RwLock<HashMap<Uuid, broadcast::Sender<Arc<BusMessage>>>>,
}

impl TableBus {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender_for(&self, table_id: Uuid) -> broadcast::Sender<Arc<BusMessage>> {
        if let Some(sender) = self.channels.read().await.get(&table_id) {
            return sender.clone();
        }
        let mut channels = self.channels.write().await;
        channels
            .entry(table_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    pub async fn subscribe(&self, table_id: Uuid) -> broadcast::Receiver<Arc<BusMessage>> {
        self.sender_for(table_id).await.subscribe()
    }

    /// Publishes to the group; returns the number of live subscribers. A
    /// message with no subscribers is not an error — there may be no
    /// connections watching a table right now.
    pub async fn publish(&self, table_id: Uuid, message: BusMessage) -> usize {
        let sender = self.sender_for(table_id).await;
        sender.send(Arc::new(message)).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_messages() {
        let bus = TableBus::new();
        let table_id = Uuid::new_v4();
        let mut receiver = bus.subscribe(table_id).await;
        let delivered = bus
            .publish(
                table_id,
                BusMessage::TableAction { table_status: TableStatus::NotStarted },
            )
            .await;
        assert_eq!(delivered, 1);
        let message = receiver.recv().await.unwrap();
        assert!(matches!(*message, BusMessage::TableAction { .. }));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_not_an_error() {
        let bus = TableBus::new();
        let delivered = bus
            .publish(Uuid::new_v4(), BusMessage::TableAction { table_status: TableStatus::NotStarted })
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn separate_tables_do_not_cross_talk() {
        let bus = TableBus::new();
        let table_a = Uuid::new_v4();
        let table_b = Uuid::new_v4();
        let mut receiver_b = bus.subscribe(table_b).await;
        bus.publish(table_a, BusMessage::TableAction { table_status: TableStatus::NotStarted }).await;
        assert!(receiver_b.try_recv().is_err());
    }
}
