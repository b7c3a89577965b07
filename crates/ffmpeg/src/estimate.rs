//! Render-time and complexity estimation (PRD-09).
//!
//! Purely advisory: estimates feed the job record and progress UI, and never
//! block or fail a render.

use reelsmith_core::template::{LayerKind, ResolvedTemplate};

// ---------------------------------------------------------------------------
// Heuristic constants
// ---------------------------------------------------------------------------

/// Layer count at or below which a template (without effects) is "low".
pub const LOW_COMPLEXITY_MAX_LAYERS: usize = 3;

/// Layer count above which a template is always "high".
pub const HIGH_COMPLEXITY_MIN_LAYERS: usize = 8;

/// Effect-layer count at which a template is always "high".
pub const HIGH_COMPLEXITY_MIN_EFFECTS: usize = 2;

/// Fixed per-layer setup cost, in seconds of render time.
const SECONDS_PER_LAYER: f64 = 2.0;

/// Render seconds charged per second of output, by complexity.
const SPEED_FACTOR_LOW: f64 = 0.5;
const SPEED_FACTOR_MEDIUM: f64 = 1.0;
const SPEED_FACTOR_HIGH: f64 = 2.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Coarse render-cost class derived from layer count and effect usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderComplexity {
    Low,
    Medium,
    High,
}

impl RenderComplexity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Advisory estimate for one render.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RenderEstimate {
    pub estimated_seconds: i64,
    pub complexity: RenderComplexity,
}

// ---------------------------------------------------------------------------
// Estimation
// ---------------------------------------------------------------------------

/// Estimate wall-clock render time for a resolved template.
pub fn estimate_render_time(template: &ResolvedTemplate) -> RenderEstimate {
    let layer_count = template.layers.len();
    let effect_count = template
        .layers
        .iter()
        .filter(|l| l.kind == LayerKind::Effect)
        .count();

    let complexity = if layer_count > HIGH_COMPLEXITY_MIN_LAYERS
        || effect_count >= HIGH_COMPLEXITY_MIN_EFFECTS
    {
        RenderComplexity::High
    } else if layer_count > LOW_COMPLEXITY_MAX_LAYERS || effect_count > 0 {
        RenderComplexity::Medium
    } else {
        RenderComplexity::Low
    };

    let factor = match complexity {
        RenderComplexity::Low => SPEED_FACTOR_LOW,
        RenderComplexity::Medium => SPEED_FACTOR_MEDIUM,
        RenderComplexity::High => SPEED_FACTOR_HIGH,
    };
    let estimated = template.duration_seconds * factor + layer_count as f64 * SECONDS_PER_LAYER;

    RenderEstimate {
        estimated_seconds: estimated.ceil() as i64,
        complexity,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
