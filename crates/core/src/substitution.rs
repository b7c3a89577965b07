//! `${VAR}` token substitution and template resolution (PRD-03).
//!
//! Substitution is textual: the matched token is replaced by the variable's
//! string form wherever it appears inside a layer's string values, at any
//! nesting depth. Tokens without a resolved value pass through verbatim.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::CoreError;
use crate::template::{ResolvedTemplate, Template, TemplateLayer};
use crate::validation::validate_variables;

/// `${NAME}` where NAME is an identifier (letters, digits, underscore,
/// not starting with a digit).
fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid token regex"))
}

/// String form of a JSON value as used for substitution and rule checks:
/// strings verbatim (no quotes), numbers in decimal form, booleans as
/// `true`/`false`, everything else as compact JSON.
pub fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace every known `${NAME}` token in `input`; unknown tokens remain
/// exactly as written.
pub fn substitute_str(input: &str, vars: &BTreeMap<String, serde_json::Value>) -> String {
    token_re()
        .replace_all(input, |caps: &regex::Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => stringify(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Deep-walk a JSON tree, substituting tokens in every string value.
fn substitute_value(
    value: &serde_json::Value,
    vars: &BTreeMap<String, serde_json::Value>,
) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(substitute_str(s, vars)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| substitute_value(v, vars)).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve a template against a submitted variable set.
///
/// Fails fast with [`CoreError::Validation`] if the set does not satisfy the
/// schema. Missing optional variables are filled from their declared
/// defaults, then every layer is deep-copied with tokens substituted.
/// Deterministic: identical inputs produce an identical resolved template.
pub fn resolve(
    template: &Template,
    values: &serde_json::Map<String, serde_json::Value>,
) -> Result<ResolvedTemplate, CoreError> {
    let report = validate_variables(template, values);
    if !report.is_valid() {
        return Err(CoreError::Validation(report.summary()));
    }

    let mut resolved: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    for (name, var) in &template.variables {
        if let Some(value) = values.get(name) {
            resolved.insert(name.clone(), value.clone());
        } else if let Some(default) = &var.default {
            resolved.insert(name.clone(), default.clone());
        }
    }

    let layers = template
        .layers
        .iter()
        .map(|layer| substitute_layer(layer, &resolved))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ResolvedTemplate {
        template_id: template.id.clone(),
        name: template.name.clone(),
        duration_seconds: template.duration_seconds,
        resolution: template.resolution,
        framerate: template.framerate,
        layers,
        resolved_variables: resolved,
    })
}

/// Substitute across the whole serialized layer so every string field is
/// covered, not just `properties`.
fn substitute_layer(
    layer: &TemplateLayer,
    vars: &BTreeMap<String, serde_json::Value>,
) -> Result<TemplateLayer, CoreError> {
    let tree = serde_json::to_value(layer)
        .map_err(|e| CoreError::Internal(format!("layer serialization failed: {e}")))?;
    let substituted = substitute_value(&tree, vars);
    serde_json::from_value(substituted)
        .map_err(|e| CoreError::Internal(format!("layer deserialization failed: {e}")))
}

/// Collect the names of `${VAR}` tokens used anywhere in the template's
/// layers that have no schema entry. Advisory only — surfaced as a warning
/// on save, never as a validation error.
pub fn undeclared_placeholders(template: &Template) -> Vec<String> {
    let mut found = std::collections::BTreeSet::new();
    for layer in &template.layers {
        if let Ok(tree) = serde_json::to_value(layer) {
            collect_tokens(&tree, &mut found);
        }
    }
    found
        .into_iter()
        .filter(|name| !template.variables.contains_key(name))
        .collect()
}

fn collect_tokens(value: &serde_json::Value, out: &mut std::collections::BTreeSet<String>) {
    match value {
        serde_json::Value::String(s) => {
            for caps in token_re().captures_iter(s) {
                out.insert(caps[1].to_string());
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_tokens(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_tokens(item, out);
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::template::{
        LayerKind, Resolution, TemplateVariable, VariableConstraints, VariableType,
    };
    use crate::types::new_entity_id;

    fn layer_with_properties(properties: serde_json::Value) -> TemplateLayer {
        TemplateLayer {
            id: new_entity_id(),
            kind: LayerKind::Text,
            name: "title".to_string(),
            start_time: 0.0,
            duration: 5.0,
            z_index: 10,
            properties: properties.as_object().cloned().unwrap_or_default(),
        }
    }

    fn template_with(layers: Vec<TemplateLayer>, vars: Vec<TemplateVariable>) -> Template {
        let now = Utc::now();
        Template {
            id: new_entity_id(),
            name: "t".to_string(),
            niche: "test".to_string(),
            description: String::new(),
            duration_seconds: 15.0,
            resolution: Resolution {
                width: 1080,
                height: 1920,
            },
            framerate: 30,
            layers,
            variables: vars.into_iter().map(|v| (v.name.clone(), v)).collect(),
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn optional_string(name: &str, default: Option<serde_json::Value>) -> TemplateVariable {
        TemplateVariable {
            name: name.to_string(),
            kind: VariableType::String,
            required: false,
            default,
            validation: None,
        }
    }

    fn values(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    // -- substitute_str -----------------------------------------------------

    #[test]
    fn substitutes_known_tokens() {
        let vars: BTreeMap<String, serde_json::Value> =
            [("TITLE".to_string(), json!("Midnight"))].into_iter().collect();
        assert_eq!(substitute_str("Tonight: ${TITLE}!", &vars), "Tonight: Midnight!");
    }

    #[test]
    fn unknown_tokens_pass_through_verbatim() {
        let vars = BTreeMap::new();
        assert_eq!(substitute_str("${UNKNOWN}", &vars), "${UNKNOWN}");
    }

    #[test]
    fn numbers_and_booleans_substitute_as_text() {
        let vars: BTreeMap<String, serde_json::Value> = [
            ("N".to_string(), json!(3)),
            ("F".to_string(), json!(2.5)),
            ("B".to_string(), json!(true)),
        ]
        .into_iter()
        .collect();
        assert_eq!(substitute_str("${N}/${F}/${B}", &vars), "3/2.5/true");
    }

    #[test]
    fn repeated_tokens_all_substitute() {
        let vars: BTreeMap<String, serde_json::Value> =
            [("X".to_string(), json!("a"))].into_iter().collect();
        assert_eq!(substitute_str("${X}${X}${X}", &vars), "aaa");
    }

    // -- resolve ------------------------------------------------------------

    #[test]
    fn resolve_substitutes_nested_properties() {
        let layer = layer_with_properties(json!({
            "text": "${TITLE}",
            "style": {"font": "${FONT}", "sizes": ["${SIZE}", 12]}
        }));
        let size = TemplateVariable {
            name: "SIZE".to_string(),
            kind: VariableType::Number,
            required: false,
            default: None,
            validation: None,
        };
        let template = template_with(
            vec![layer],
            vec![optional_string("TITLE", None), optional_string("FONT", None), size],
        );
        let resolved = resolve(
            &template,
            &values(json!({"TITLE": "Boo", "FONT": "Mono", "SIZE": 42})),
        )
        .unwrap();

        let props = &resolved.layers[0].properties;
        assert_eq!(props["text"], json!("Boo"));
        assert_eq!(props["style"]["font"], json!("Mono"));
        assert_eq!(props["style"]["sizes"][0], json!("42"));
        // Non-string values are untouched by the walk.
        assert_eq!(props["style"]["sizes"][1], json!(12));
    }

    #[test]
    fn resolve_fills_defaults_for_missing_optionals() {
        let layer = layer_with_properties(json!({"text": "${GREETING}"}));
        let template = template_with(
            vec![layer],
            vec![optional_string("GREETING", Some(json!("hello")))],
        );
        let resolved = resolve(&template, &values(json!({}))).unwrap();
        assert_eq!(resolved.layers[0].properties["text"], json!("hello"));
        assert_eq!(resolved.resolved_variables["GREETING"], json!("hello"));
    }

    #[test]
    fn resolve_is_deterministic() {
        let layer = layer_with_properties(json!({"text": "${A} ${B}"}));
        let template = template_with(
            vec![layer],
            vec![optional_string("A", None), optional_string("B", None)],
        );
        let vars = values(json!({"A": "x", "B": "y"}));

        let first = resolve(&template, &vars).unwrap();
        let second = resolve(&template, &vars).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn resolve_rejects_invalid_variables() {
        let var = TemplateVariable {
            name: "X".to_string(),
            kind: VariableType::Number,
            required: true,
            default: None,
            validation: Some(VariableConstraints {
                min: Some(0.0),
                max: Some(10.0),
                ..Default::default()
            }),
        };
        let template = template_with(Vec::new(), vec![var]);
        let err = resolve(&template, &values(json!({}))).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(err.to_string().contains('X'));
    }

    #[test]
    fn resolve_with_empty_layers_is_legal() {
        let template = template_with(Vec::new(), Vec::new());
        let resolved = resolve(&template, &values(json!({}))).unwrap();
        assert!(resolved.layers.is_empty());
    }

    #[test]
    fn resolve_substitutes_layer_names_too() {
        let mut layer = layer_with_properties(json!({}));
        layer.name = "scene ${N}".to_string();
        let template = template_with(vec![layer], vec![optional_string("N", Some(json!(1)))]);
        let resolved = resolve(&template, &values(json!({}))).unwrap();
        assert_eq!(resolved.layers[0].name, "scene 1");
    }

    // -- lint ---------------------------------------------------------------

    #[test]
    fn lint_reports_tokens_without_schema_entries() {
        let layer = layer_with_properties(json!({"text": "${DECLARED} ${MISSING}"}));
        let template = template_with(vec![layer], vec![optional_string("DECLARED", None)]);
        assert_eq!(undeclared_placeholders(&template), vec!["MISSING".to_string()]);
    }

    #[test]
    fn lint_is_empty_for_fully_declared_templates() {
        let layer = layer_with_properties(json!({"text": "${DECLARED}"}));
        let template = template_with(vec![layer], vec![optional_string("DECLARED", None)]);
        assert!(undeclared_placeholders(&template).is_empty());
    }
}
