//! Template row model and decoder (PRD-03).
//!
//! The domain type lives in `reelsmith_core::template`; this module only
//! covers the row shape and the TEXT-to-typed boundary.

use reelsmith_core::template::{Resolution, Template};
use reelsmith_core::types::Timestamp;
use sqlx::FromRow;

use crate::error::DbError;

/// A raw `templates` row.
#[derive(Debug, FromRow)]
pub struct TemplateRow {
    pub id: String,
    pub name: String,
    pub niche: String,
    pub description: String,
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub layers: String,
    pub variables: String,
    pub metadata: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

fn decode<T: serde::de::DeserializeOwned>(
    column: &'static str,
    raw: &str,
    id: &str,
) -> Result<T, DbError> {
    serde_json::from_str(raw).map_err(|source| DbError::Decode {
        table: "templates",
        column,
        id: id.to_string(),
        source,
    })
}

impl TryFrom<TemplateRow> for Template {
    type Error = DbError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(Template {
            layers: decode("layers", &row.layers, &row.id)?,
            variables: decode("variables", &row.variables, &row.id)?,
            metadata: decode("metadata", &row.metadata, &row.id)?,
            id: row.id,
            name: row.name,
            niche: row.niche,
            description: row.description,
            duration_seconds: row.duration_seconds,
            resolution: Resolution {
                width: row.width,
                height: row.height,
            },
            framerate: row.framerate,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
