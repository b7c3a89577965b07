use reelsmith_core::types::EntityId;

use crate::models::status::StatusId;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("corrupt {column} column on {table} row {id}: {source}")]
    Decode {
        table: &'static str,
        column: &'static str,
        id: EntityId,
        source: serde_json::Error,
    },

    #[error("unknown status id {0} on jobs row")]
    UnknownStatus(StatusId),
}
