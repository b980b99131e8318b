//! Queue persistence through the host [`StateStore`](bridge_traits::StateStore).
//!
//! The queue is stored as one JSON document under
//! [`QueueConfig::persistence_key`](crate::config::QueueConfig). History is
//! session-local and is not written.

use crate::error::{PlaybackError, Result};
use crate::models::{RepeatMode, Track};
use crate::queue::manager::{queue_changed, QueueManager};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// On-disk shape of a saved queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedQueue {
    pub tracks: Vec<Track>,
    pub current_index: i64,
    #[serde(default)]
    pub shuffle_enabled: bool,
    #[serde(default)]
    pub repeat_mode: RepeatMode,
    #[serde(default)]
    pub original_order: Vec<Track>,
}

impl QueueManager {
    /// Write the queue to the durable store.
    ///
    /// Returns `false` (and logs) when no store is attached or the write fails.
    #[instrument(skip(self), fields(key = %self.config.persistence_key))]
    pub async fn save_state(&self) -> bool {
        match self.try_save_state().await {
            Ok(()) => {
                debug!("Queue state saved");
                true
            }
            Err(e) => {
                warn!("Failed to save queue state: {}", e);
                false
            }
        }
    }

    /// Replace the in-memory queue with the saved one.
    ///
    /// Returns `false` when nothing was saved or the document is unreadable;
    /// the current queue is left untouched in that case.
    #[instrument(skip(self), fields(key = %self.config.persistence_key))]
    pub async fn restore_state(&self) -> bool {
        match self.try_restore_state().await {
            Ok(true) => true,
            Ok(false) => {
                debug!("No saved queue state");
                false
            }
            Err(e) => {
                warn!("Failed to restore queue state: {}", e);
                false
            }
        }
    }

    async fn try_save_state(&self) -> Result<()> {
        let store = self
            .store
            .clone()
            .ok_or_else(|| PlaybackError::Persistence("no state store attached".to_string()))?;

        let persisted = {
            let state = self.state.lock();
            PersistedQueue {
                tracks: state.tracks().to_vec(),
                current_index: state.position().as_legacy_index(),
                shuffle_enabled: state.shuffle_enabled(),
                repeat_mode: state.repeat_mode(),
                original_order: state.original_order().to_vec(),
            }
        };

        let json = serde_json::to_vec(&persisted)?;
        store
            .put(&self.config.persistence_key, Bytes::from(json))
            .await?;
        Ok(())
    }

    async fn try_restore_state(&self) -> Result<bool> {
        let Some(store) = self.store.clone() else {
            return Err(PlaybackError::Persistence(
                "no state store attached".to_string(),
            ));
        };

        let Some(raw) = store.get(&self.config.persistence_key).await? else {
            return Ok(false);
        };
        let persisted: PersistedQueue = serde_json::from_slice(&raw)?;

        let snapshot = {
            let mut state = self.state.lock();
            state.restore(
                persisted.tracks,
                persisted.current_index,
                persisted.shuffle_enabled,
                persisted.repeat_mode,
                persisted.original_order,
            );
            state.snapshot()
        };

        info!(
            length = snapshot.tracks.len(),
            current_index = snapshot.current_index,
            "Queue state restored"
        );
        let event = queue_changed(&snapshot);
        self.publish(&snapshot, event);
        Ok(true)
    }
}
