//! Reelsmith composition layer.
//!
//! Wires the domain core, the store, and the ffmpeg bridge into the two
//! surfaces the rest of the system consumes:
//!
//! - [`TemplateService`] — the template engine facade (save/get/list/
//!   validate/resolve/clone over the persistent store).
//! - [`CompositorPipeline`] — the production
//!   [`RenderPipeline`](reelsmith_scheduler::RenderPipeline): resolve →
//!   estimate → compose → encode for one job.

pub mod error;
pub mod render_job;
pub mod templates;

pub use error::ServiceError;
pub use render_job::CompositorPipeline;
pub use templates::TemplateService;
