//! Scene template model (PRD-03).
//!
//! A template is a timed, layered scene description plus a typed variable
//! schema. Jobs instantiate a template by supplying concrete values for the
//! declared variables; substitution produces a [`ResolvedTemplate`] that the
//! compositor turns into a filter graph.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{new_entity_id, EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// What a layer contributes to the rendered scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Video,
    Image,
    Audio,
    Text,
    Shape,
    Effect,
}

/// One timed element within a template.
///
/// `properties` is a free-form JSON object whose string values (at any
/// nesting depth) may contain `${VAR_NAME}` placeholder tokens. Layers are
/// stored in no particular order; rendering order is always derived from
/// `z_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLayer {
    pub id: EntityId,
    pub kind: LayerKind,
    pub name: String,
    /// Offset from the start of the scene, in seconds.
    pub start_time: f64,
    /// How long the layer is visible/audible, in seconds.
    pub duration: f64,
    pub z_index: i32,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// Declared type of a template variable.
///
/// Only `string`, `number`, and `boolean` are checked against the native
/// JSON kind of a submitted value; the media types and `color` carry intent
/// for the editing UI and rely on `pattern`/`enum` rules for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Image,
    Video,
    Audio,
    Color,
}

/// Optional constraint set attached to a variable declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableConstraints {
    /// Inclusive numeric lower bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive numeric upper bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Regex the value's string form must match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Closed set of allowed values.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<serde_json::Value>>,
}

/// A declared template variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: VariableType,
    #[serde(default)]
    pub required: bool,
    /// Fallback used when an optional variable is not supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<VariableConstraints>,
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// Output frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// A reusable, parameterized scene description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: EntityId,
    pub name: String,
    /// Content niche the template targets (e.g. `"horror"`, `"facts"`).
    pub niche: String,
    #[serde(default)]
    pub description: String,
    pub duration_seconds: f64,
    pub resolution: Resolution,
    pub framerate: u32,
    pub layers: Vec<TemplateLayer>,
    /// Variable schema, keyed by variable name. `BTreeMap` keeps the
    /// resolved output deterministic for identical inputs.
    #[serde(default)]
    pub variables: BTreeMap<String, TemplateVariable>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Template {
    /// Deep-copy this template under a fresh id, name, and creation
    /// timestamp. The source is left untouched.
    pub fn duplicate(&self, new_name: &str) -> Template {
        let now = Utc::now();
        Template {
            id: new_entity_id(),
            name: new_name.to_string(),
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// A template with every `${VAR}` token substituted, ready for composition.
///
/// Created fresh for each render invocation and owned exclusively by it;
/// never mutated after creation and never shared across jobs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTemplate {
    pub template_id: EntityId,
    pub name: String,
    pub duration_seconds: f64,
    pub resolution: Resolution,
    pub framerate: u32,
    pub layers: Vec<TemplateLayer>,
    /// The concrete values used for substitution (submitted values merged
    /// with declared defaults).
    pub resolved_variables: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_template() -> Template {
        let now = Utc::now();
        Template {
            id: new_entity_id(),
            name: "Spooky story".to_string(),
            niche: "horror".to_string(),
            description: String::new(),
            duration_seconds: 30.0,
            resolution: Resolution {
                width: 1080,
                height: 1920,
            },
            framerate: 30,
            layers: vec![TemplateLayer {
                id: new_entity_id(),
                kind: LayerKind::Image,
                name: "background".to_string(),
                start_time: 0.0,
                duration: 30.0,
                z_index: 0,
                properties: serde_json::Map::new(),
            }],
            variables: BTreeMap::new(),
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn duplicate_gets_fresh_identity() {
        let source = sample_template();
        let copy = source.duplicate("Spooky story v2");

        assert_ne!(copy.id, source.id);
        assert_eq!(copy.name, "Spooky story v2");
        assert_eq!(copy.niche, source.niche);
        assert_eq!(copy.layers.len(), source.layers.len());
        // Layer content is copied verbatim, including layer ids.
        assert_eq!(copy.layers[0].id, source.layers[0].id);
    }

    #[test]
    fn duplicate_does_not_mutate_source() {
        let source = sample_template();
        let original_name = source.name.clone();
        let _copy = source.duplicate("other");
        assert_eq!(source.name, original_name);
    }

    #[test]
    fn layer_kind_serializes_lowercase() {
        let json = serde_json::to_string(&LayerKind::Effect).unwrap();
        assert_eq!(json, "\"effect\"");
    }

    #[test]
    fn variable_schema_round_trips() {
        let var = TemplateVariable {
            name: "TITLE".to_string(),
            kind: VariableType::String,
            required: true,
            default: None,
            validation: Some(VariableConstraints {
                pattern: Some("^.{1,80}$".to_string()),
                ..Default::default()
            }),
        };
        let json = serde_json::to_value(&var).unwrap();
        assert_eq!(json["type"], "string");
        let back: TemplateVariable = serde_json::from_value(json).unwrap();
        assert!(back.required);
        assert_eq!(back.validation.unwrap().pattern.as_deref(), Some("^.{1,80}$"));
    }
}
