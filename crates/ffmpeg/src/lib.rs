//! Reelsmith ffmpeg bridge (PRD-09): the media compositor.
//!
//! Turns a [`ResolvedTemplate`](reelsmith_core::template::ResolvedTemplate)
//! into a structured filter graph, estimates render cost, and supervises the
//! external ffmpeg process:
//!
//! - [`graph`] — filter-graph intermediate representation; ffmpeg's textual
//!   `-filter_complex` syntax is produced only at emission.
//! - [`compose`] — graph construction from a resolved template.
//! - [`estimate`] — advisory render-time/complexity heuristic.
//! - [`encode`] — process spawn, `-progress` stream normalization, and
//!   diagnostic capture.

pub mod compose;
pub mod encode;
pub mod error;
pub mod estimate;
pub mod graph;

pub use compose::{build_graph, OutputOptions};
pub use encode::{FfmpegRenderer, ProgressFn};
pub use error::RenderError;
pub use estimate::{estimate_render_time, RenderComplexity, RenderEstimate};
pub use graph::FilterGraph;
