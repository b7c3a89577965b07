//! Reelsmith domain core: the template model and the variable engine.
//!
//! Pure logic only — no database or I/O dependencies. This crate owns:
//!
//! - [`template`] — layered scene templates and their typed variable schema.
//! - [`validation`] — accumulating validation of a proposed variable set.
//! - [`substitution`] — `${VAR}` token substitution producing a
//!   [`ResolvedTemplate`](template::ResolvedTemplate).

pub mod error;
pub mod substitution;
pub mod template;
pub mod types;
pub mod validation;

pub use error::CoreError;
pub use template::{
    LayerKind, ResolvedTemplate, Template, TemplateLayer, TemplateVariable, VariableType,
};
pub use validation::{validate_variables, ValidationReport};
