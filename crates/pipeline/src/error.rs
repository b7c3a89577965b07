use reelsmith_core::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("template not found: {0}")]
    TemplateNotFound(EntityId),

    #[error(transparent)]
    Core(#[from] reelsmith_core::CoreError),

    #[error(transparent)]
    Db(#[from] reelsmith_db::DbError),

    #[error(transparent)]
    Render(#[from] reelsmith_ffmpeg::RenderError),
}
