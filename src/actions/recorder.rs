use std::sync::Arc;

use tracing::{error, info};

use super::models::NewBotAction;
use super::ActionStore;

/// Writes completed actions to the store; storage failures never fail a cycle
#[derive(Clone)]
pub struct ActionRecorder {
    store: Arc<dyn ActionStore>,
}

impl ActionRecorder {
    pub fn new(store: Arc<dyn ActionStore>) -> Self {
        Self { store }
    }

    /// Returns the stored id, or `None` if the write failed
    pub async fn record(&self, action: NewBotAction) -> Option<i64> {
        match self.store.append(&action).await {
            Ok(id) => {
                info!(
                    "📝 Recorded {} action {} ({}, id {})",
                    action.action_type,
                    action.tx_hash,
                    action.status.as_str(),
                    id
                );
                Some(id)
            }
            Err(e) => {
                error!(
                    "❌ Failed to record {} action {}: {}",
                    action.action_type, action.tx_hash, e
                );
                None
            }
        }
    }
}
