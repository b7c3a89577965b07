//! Reelsmith event bus (PRD-10).
//!
//! Building blocks for the render lifecycle notification surface:
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`RenderEvent`] — the typed lifecycle event enum (one variant per event
//!   kind, so consumers are type-checked instead of matching on strings).

pub mod bus;

pub use bus::{EventBus, RenderEvent};
