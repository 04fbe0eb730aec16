use async_trait::async_trait;
use chrono::Utc;

use super::models::{ActionFilter, ActionType, BotAction, NewBotAction};
use super::ActionStore;
use crate::error::AppResult;

/// Process-local action store, used when no database is configured
pub struct InMemoryActionStore {
    actions: tokio::sync::RwLock<Vec<BotAction>>,
}

impl InMemoryActionStore {
    pub fn new() -> Self {
        Self {
            actions: tokio::sync::RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryActionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Newest timestamp first, later inserts first on ties
fn newest_first(actions: &[BotAction]) -> Vec<&BotAction> {
    let mut sorted: Vec<&BotAction> = actions.iter().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    sorted
}

#[async_trait]
impl ActionStore for InMemoryActionStore {
    async fn append(&self, action: &NewBotAction) -> AppResult<i64> {
        let mut actions = self.actions.write().await;
        let id = actions.len() as i64 + 1;
        actions.push(BotAction::from_new(id, action.clone(), Utc::now()));
        Ok(id)
    }

    async fn list(&self, filter: &ActionFilter) -> AppResult<Vec<BotAction>> {
        let actions = self.actions.read().await;
        let listed = newest_first(&actions)
            .into_iter()
            .filter(|a| filter.action_type.map_or(true, |t| a.action_type == t))
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok(listed)
    }

    async fn count_by_type(&self, action_type: ActionType) -> AppResult<i64> {
        let actions = self.actions.read().await;
        Ok(actions.iter().filter(|a| a.action_type == action_type).count() as i64)
    }

    async fn latest(&self) -> AppResult<Option<BotAction>> {
        let actions = self.actions.read().await;
        Ok(newest_first(&actions).first().map(|a| (*a).clone()))
    }

    async fn get_by_tx_hash(&self, tx_hash: &str) -> AppResult<Option<BotAction>> {
        let actions = self.actions.read().await;
        Ok(actions.iter().find(|a| a.tx_hash == tx_hash).cloned())
    }
}
