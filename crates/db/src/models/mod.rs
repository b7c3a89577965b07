//! Row models and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` row struct matching the table (JSON columns as TEXT)
//! - The typed domain struct plus a `TryFrom<Row>` decoder
//! - `Deserialize` DTOs for inserts

pub mod job;
pub mod status;
pub mod template;
