// In-flight transfer store
// Tracking identifiers re-resolve a transfer's protocol and chain pair on
// their own; the store keeps the protocol payload (message bytes, deposit
// tx) this instance learned at initiation, and broadcasts phase changes.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::protocols::{BridgePhase, ProtocolId, ProtocolPayload};

#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub tracking_id: String,
    pub protocol: ProtocolId,
    pub source_chain: u64,
    pub dest_chain: u64,
    pub payload: ProtocolPayload,
    pub phase: BridgePhase,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct TransferUpdate {
    pub tracking_id: String,
    pub phase: BridgePhase,
}

#[derive(Clone)]
pub struct TransferStore {
    inner: Arc<RwLock<HashMap<String, TransferRecord>>>,
    tx: broadcast::Sender<TransferUpdate>,
}

impl TransferStore {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferUpdate> {
        self.tx.subscribe()
    }

    pub async fn insert(&self, record: TransferRecord) {
        let mut inner = self.inner.write().await;
        debug!(tracking_id = %record.tracking_id, "transfer recorded");
        inner.insert(record.tracking_id.clone(), record);
    }

    pub async fn get(&self, tracking_id: &str) -> Option<TransferRecord> {
        self.inner.read().await.get(tracking_id).cloned()
    }

    pub async fn update_phase(&self, tracking_id: &str, phase: BridgePhase) {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner.get_mut(tracking_id) {
            if record.phase != phase {
                record.phase = phase;
                let _ = self.tx.send(TransferUpdate {
                    tracking_id: tracking_id.to_string(),
                    phase,
                });
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

impl Default for TransferStore {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    fn record(id: &str) -> TransferRecord {
        TransferRecord {
            tracking_id: id.to_string(),
            protocol: ProtocolId::Relay,
            source_chain: 1,
            dest_chain: 42161,
            payload: ProtocolPayload::Relay {
                deposit_tx: B256::repeat_byte(0x01),
                destination_chain: 42161,
            },
            phase: BridgePhase::Pending,
            created_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn phase_changes_are_broadcast_once() {
        let store = TransferStore::default();
        let mut updates = store.subscribe();
        store.insert(record("relay-1-42161-0-aaaaaaaa")).await;

        store
            .update_phase("relay-1-42161-0-aaaaaaaa", BridgePhase::Completed)
            .await;
        // Same phase again: no duplicate broadcast.
        store
            .update_phase("relay-1-42161-0-aaaaaaaa", BridgePhase::Completed)
            .await;

        let update = updates.recv().await.unwrap();
        assert_eq!(update.phase, BridgePhase::Completed);
        assert!(updates.try_recv().is_err());

        let stored = store.get("relay-1-42161-0-aaaaaaaa").await.unwrap();
        assert_eq!(stored.phase, BridgePhase::Completed);
    }

    #[tokio::test]
    async fn unknown_ids_are_absent() {
        let store = TransferStore::default();
        assert!(store.get("cctp-1-8453-0-bbbbbbbb").await.is_none());
        assert_eq!(store.len().await, 0);
    }
}
