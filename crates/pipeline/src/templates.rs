//! Template engine service facade (PRD-03).
//!
//! Thin orchestration over [`TemplateRepo`] and the pure engine functions in
//! `reelsmith_core`; everything stateful stays in the store.

use chrono::Utc;
use reelsmith_core::substitution::{resolve, undeclared_placeholders};
use reelsmith_core::template::{ResolvedTemplate, Template};
use reelsmith_core::types::EntityId;
use reelsmith_core::validation::{validate_variables, ValidationReport};
use reelsmith_db::repositories::TemplateRepo;
use reelsmith_db::DbPool;

use crate::error::ServiceError;

/// The template engine surface: persistence plus typed variable handling.
#[derive(Clone)]
pub struct TemplateService {
    pool: DbPool,
}

impl TemplateService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Upsert a template by id, bumping `updated_at`.
    ///
    /// Placeholder tokens without a schema entry are legal but almost always
    /// an authoring mistake, so they are surfaced as a warning here.
    pub async fn save(&self, mut template: Template) -> Result<Template, ServiceError> {
        template.updated_at = Utc::now();

        let drift = undeclared_placeholders(&template);
        if !drift.is_empty() {
            tracing::warn!(
                template_id = %template.id,
                tokens = ?drift,
                "Template references variables its schema does not declare",
            );
        }

        TemplateRepo::save(&self.pool, &template).await?;
        Ok(template)
    }

    pub async fn get(&self, id: &EntityId) -> Result<Template, ServiceError> {
        TemplateRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| ServiceError::TemplateNotFound(id.clone()))
    }

    /// List templates newest-created-first, optionally filtered by niche.
    pub async fn list(&self, niche: Option<&str>) -> Result<Vec<Template>, ServiceError> {
        Ok(TemplateRepo::list(&self.pool, niche).await?)
    }

    /// Validate a proposed variable set against a stored template.
    pub async fn validate(
        &self,
        id: &EntityId,
        values: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ValidationReport, ServiceError> {
        let template = self.get(id).await?;
        Ok(validate_variables(&template, values))
    }

    /// Resolve a stored template against a variable set.
    pub async fn resolve(
        &self,
        id: &EntityId,
        values: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ResolvedTemplate, ServiceError> {
        let template = self.get(id).await?;
        Ok(resolve(&template, values)?)
    }

    /// Deep-copy a stored template under a fresh id and name.
    pub async fn clone_template(
        &self,
        id: &EntityId,
        new_name: &str,
    ) -> Result<Template, ServiceError> {
        let source = self.get(id).await?;
        let copy = source.duplicate(new_name);
        TemplateRepo::save(&self.pool, &copy).await?;
        Ok(copy)
    }

    /// Hard-delete a template. Returns `true` if a row was removed.
    pub async fn delete(&self, id: &EntityId) -> Result<bool, ServiceError> {
        Ok(TemplateRepo::delete(&self.pool, id).await?)
    }
}
