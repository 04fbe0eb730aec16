use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use super::models::{ActionFilter, ActionType, BotAction, BotActionRow, NewBotAction};
use super::ActionStore;
use crate::error::AppResult;

const SELECT_COLUMNS: &str = r#"
    SELECT id, timestamp, action_type, amount_a, amount_b, tx_hash, direction, status, gas_used, created_at
    FROM bot_actions
"#;

/// Postgres-backed action store
pub struct BotActionRepository {
    pub pool: PgPool,
}

impl BotActionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActionStore for BotActionRepository {
    async fn append(&self, action: &NewBotAction) -> AppResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bot_actions (timestamp, action_type, amount_a, amount_b, tx_hash, direction, status, gas_used)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(action.timestamp)
        .bind(action.action_type.as_str())
        .bind(&action.amount_a)
        .bind(&action.amount_b)
        .bind(&action.tx_hash)
        .bind(action.direction.map(|d| d.as_str()))
        .bind(action.status.as_str())
        .bind(i64::try_from(action.gas_used).unwrap_or(i64::MAX))
        .fetch_one(&self.pool)
        .await?;

        info!("💾 Stored {} action {} (id {})", action.action_type, action.tx_hash, id);
        Ok(id)
    }

    async fn list(&self, filter: &ActionFilter) -> AppResult<Vec<BotAction>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_COLUMNS);

        if let Some(action_type) = filter.action_type {
            query.push(" WHERE action_type = ").push_bind(action_type.as_str());
        }

        query
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows = query
            .build_query_as::<BotActionRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(BotAction::try_from).collect()
    }

    async fn count_by_type(&self, action_type: ActionType) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bot_actions WHERE action_type = $1")
            .bind(action_type.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn latest(&self) -> AppResult<Option<BotAction>> {
        let row = sqlx::query_as::<_, BotActionRow>(&format!(
            "{} ORDER BY timestamp DESC, id DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.map(BotAction::try_from).transpose()
    }

    async fn get_by_tx_hash(&self, tx_hash: &str) -> AppResult<Option<BotAction>> {
        let row = sqlx::query_as::<_, BotActionRow>(&format!("{} WHERE tx_hash = $1", SELECT_COLUMNS))
            .bind(tx_hash)
            .fetch_optional(&self.pool)
            .await?;

        row.map(BotAction::try_from).transpose()
    }
}
