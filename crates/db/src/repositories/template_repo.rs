//! Repository for the `templates` table (PRD-03).

use reelsmith_core::template::Template;
use reelsmith_core::types::EntityId;

use crate::models::template::TemplateRow;
use crate::{DbError, DbPool};

const COLUMNS: &str = "\
    id, name, niche, description, duration_seconds, width, height, framerate, \
    layers, variables, metadata, created_at, updated_at";

/// Provides CRUD operations for scene templates.
pub struct TemplateRepo;

impl TemplateRepo {
    /// Upsert a template by id. The caller is responsible for bumping
    /// `updated_at` before saving.
    pub async fn save(pool: &DbPool, template: &Template) -> Result<(), DbError> {
        let layers = serde_json::to_string(&template.layers).unwrap_or_else(|_| "[]".to_string());
        let variables =
            serde_json::to_string(&template.variables).unwrap_or_else(|_| "{}".to_string());
        let metadata =
            serde_json::to_string(&template.metadata).unwrap_or_else(|_| "{}".to_string());

        sqlx::query(
            "INSERT INTO templates \
                 (id, name, niche, description, duration_seconds, width, height, framerate, \
                  layers, variables, metadata, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                 name = excluded.name, \
                 niche = excluded.niche, \
                 description = excluded.description, \
                 duration_seconds = excluded.duration_seconds, \
                 width = excluded.width, \
                 height = excluded.height, \
                 framerate = excluded.framerate, \
                 layers = excluded.layers, \
                 variables = excluded.variables, \
                 metadata = excluded.metadata, \
                 updated_at = excluded.updated_at",
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(&template.niche)
        .bind(&template.description)
        .bind(template.duration_seconds)
        .bind(template.resolution.width)
        .bind(template.resolution.height)
        .bind(template.framerate)
        .bind(&layers)
        .bind(&variables)
        .bind(&metadata)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find a template by ID.
    pub async fn find_by_id(pool: &DbPool, id: &EntityId) -> Result<Option<Template>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM templates WHERE id = ?");
        let row = sqlx::query_as::<_, TemplateRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        row.map(Template::try_from).transpose()
    }

    /// List templates newest-created-first, optionally filtered by niche.
    pub async fn list(pool: &DbPool, niche: Option<&str>) -> Result<Vec<Template>, DbError> {
        let where_clause = match niche {
            Some(_) => "WHERE niche = ?",
            None => "",
        };
        let query = format!(
            "SELECT {COLUMNS} FROM templates {where_clause} \
             ORDER BY created_at DESC, id DESC"
        );

        let mut q = sqlx::query_as::<_, TemplateRow>(&query);
        if let Some(niche) = niche {
            q = q.bind(niche);
        }
        let rows = q.fetch_all(pool).await?;
        rows.into_iter().map(Template::try_from).collect()
    }

    /// Hard-delete a template by ID. Returns `true` if a row was removed.
    pub async fn delete(pool: &DbPool, id: &EntityId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM templates WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
