pub mod memory;
pub mod models;
pub mod recorder;
pub mod repository;

use async_trait::async_trait;

use crate::error::AppResult;
use models::{ActionFilter, ActionType, BotAction, NewBotAction};

pub use memory::InMemoryActionStore;
pub use recorder::ActionRecorder;
pub use repository::BotActionRepository;

/// Append-only audit log of keeper actions
#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Persist a completed action, returning its id
    async fn append(&self, action: &NewBotAction) -> AppResult<i64>;

    /// Newest first
    async fn list(&self, filter: &ActionFilter) -> AppResult<Vec<BotAction>>;

    async fn count_by_type(&self, action_type: ActionType) -> AppResult<i64>;

    async fn latest(&self) -> AppResult<Option<BotAction>>;

    async fn get_by_tx_hash(&self, tx_hash: &str) -> AppResult<Option<BotAction>>;
}
