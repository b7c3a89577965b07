//! Filter-graph construction from a resolved template (PRD-09).
//!
//! Deterministic and order-sensitive: layers are stable-sorted by z-index,
//! partitioned into visual / audio / text buckets, and wired into a single
//! video stream (`[outv]`) and a single audio stream (`[outa]`). All
//! structural problems (no visual content, missing sources, half-specified
//! scale targets) are rejected here, before any engine process is spawned.

use reelsmith_core::template::{LayerKind, Resolution, ResolvedTemplate, TemplateLayer};

use crate::error::RenderError;
use crate::graph::{escape_filter_text, Filter, FilterGraph, GraphInput, AUDIO_OUT, VIDEO_OUT};

/// Sample rate of synthesized silence when a template has no audio layers.
const SILENCE_SAMPLE_RATE: u32 = 44_100;

/// Channel layout of synthesized silence.
const SILENCE_CHANNEL_LAYOUT: &str = "stereo";

/// Default text size in pixels when a text layer does not specify one.
const DEFAULT_FONT_SIZE: f64 = 48.0;

/// Default text color.
const DEFAULT_FONT_COLOR: &str = "white";

// ---------------------------------------------------------------------------
// Output options
// ---------------------------------------------------------------------------

/// Encoder settings emitted alongside the graph.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    /// Total output duration clamp, in seconds.
    pub duration_seconds: f64,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub video_bitrate: String,
}

impl OutputOptions {
    pub fn from_template(template: &ResolvedTemplate) -> Self {
        Self {
            width: template.resolution.width,
            height: template.resolution.height,
            framerate: template.framerate,
            duration_seconds: template.duration_seconds,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "medium".to_string(),
            video_bitrate: "5000k".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Graph construction
// ---------------------------------------------------------------------------

/// Build the filter graph for a resolved template.
///
/// Rejects templates with zero visual layers — there is nothing to render —
/// and layers whose properties cannot be turned into well-formed filters.
pub fn build_graph(template: &ResolvedTemplate) -> Result<FilterGraph, RenderError> {
    let mut ordered: Vec<&TemplateLayer> = template.layers.iter().collect();
    // Stable sort: equal z-indexes keep their storage order.
    ordered.sort_by_key(|l| l.z_index);

    let mut visual = Vec::new();
    let mut audio = Vec::new();
    let mut text = Vec::new();
    for layer in ordered {
        match layer.kind {
            LayerKind::Image | LayerKind::Video | LayerKind::Effect => visual.push(layer),
            LayerKind::Audio => audio.push(layer),
            LayerKind::Text => text.push(layer),
            LayerKind::Shape => {
                tracing::warn!(layer = %layer.name, "shape layers are not renderable; skipping");
            }
        }
    }

    if visual.is_empty() {
        return Err(RenderError::GraphBuild(
            "template has no visual layers to render".to_string(),
        ));
    }

    let mut graph = FilterGraph::new();
    let canvas = template.resolution;
    let fps = template.framerate;

    // Visual layers: per-layer chain, then composite onto the running
    // stream. The first visual layer seeds the stream.
    let mut current = String::new();
    for (idx, layer) in visual.iter().enumerate() {
        let source = require_source(layer)?;
        let mut input = GraphInput::file(source);
        if layer.kind == LayerKind::Image {
            // Still images loop for the layer's duration.
            input = input.option("-loop", 1).option("-t", layer.duration);
        }
        let input_idx = graph.add_input(input);

        let filters = visual_chain(layer, canvas, fps)?;
        let chained = format!("v{idx}");
        graph.add_chain(vec![format!("{input_idx}:v")], filters, vec![chained.clone()]);

        if idx == 0 {
            current = chained;
        } else {
            let merged = format!("mix{idx}");
            let overlay = Filter::new("overlay")
                .param(0)
                .param(0)
                .named("enable", enable_expr(layer));
            graph.add_chain(vec![current, chained], vec![overlay], vec![merged.clone()]);
            current = merged;
        }
    }

    // Text layers draw directly onto the running stream.
    for (idx, layer) in text.iter().enumerate() {
        let drawn = format!("txt{idx}");
        let filter = drawtext_filter(layer, canvas)?;
        graph.add_chain(vec![current], vec![filter], vec![drawn.clone()]);
        current = drawn;
    }

    // Pixel-format normalization labels the video output.
    graph.add_chain(
        vec![current],
        vec![Filter::new("format").param("yuv420p")],
        vec![VIDEO_OUT.to_string()],
    );

    build_audio(&mut graph, &audio, template.duration_seconds)?;

    Ok(graph)
}

/// Wire the audio bucket into `[outa]`: silence when empty, pass-through
/// for a single layer, equal-weight mix otherwise.
fn build_audio(
    graph: &mut FilterGraph,
    audio: &[&TemplateLayer],
    template_duration: f64,
) -> Result<(), RenderError> {
    match audio {
        [] => {
            let spec = format!("anullsrc=r={SILENCE_SAMPLE_RATE}:cl={SILENCE_CHANNEL_LAYOUT}");
            let idx = graph.add_input(GraphInput::lavfi(spec).option("-t", template_duration));
            graph.add_chain(
                vec![format!("{idx}:a")],
                vec![Filter::new("anull")],
                vec![AUDIO_OUT.to_string()],
            );
        }
        [layer] => {
            let idx = graph.add_input(GraphInput::file(require_source(layer)?));
            graph.add_chain(
                vec![format!("{idx}:a")],
                audio_chain(layer, template_duration),
                vec![AUDIO_OUT.to_string()],
            );
        }
        layers => {
            let mut labels = Vec::with_capacity(layers.len());
            for (idx, layer) in layers.iter().enumerate() {
                let input_idx = graph.add_input(GraphInput::file(require_source(layer)?));
                let label = format!("a{idx}");
                graph.add_chain(
                    vec![format!("{input_idx}:a")],
                    audio_chain(layer, template_duration),
                    vec![label.clone()],
                );
                labels.push(label);
            }
            let amix = Filter::new("amix")
                .named("inputs", layers.len())
                .named("duration", "longest");
            graph.add_chain(labels, vec![amix], vec![AUDIO_OUT.to_string()]);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Per-layer chains
// ---------------------------------------------------------------------------

/// Fixed filter order for a visual layer: scale/position, Ken Burns pan/zoom,
/// blur, opacity.
fn visual_chain(
    layer: &TemplateLayer,
    canvas: Resolution,
    fps: u32,
) -> Result<Vec<Filter>, RenderError> {
    let mut filters = Vec::new();

    let (width, height) = scale_size(layer, canvas)?;
    filters.push(Filter::new("scale").param(width).param(height));
    filters.push(Filter::new("setsar").param(1));

    if let Some((x, y)) = position(layer) {
        if u64::from(x) + u64::from(width) > u64::from(canvas.width)
            || u64::from(y) + u64::from(height) > u64::from(canvas.height)
        {
            return Err(RenderError::GraphBuild(format!(
                "layer {:?} placed at ({x}, {y}) does not fit the {}x{} canvas",
                layer.name, canvas.width, canvas.height
            )));
        }
        filters.push(
            Filter::new("pad")
                .param(canvas.width)
                .param(canvas.height)
                .param(x)
                .param(y)
                .param("black"),
        );
    }

    if let Some(kb) = ken_burns(layer) {
        filters.push(zoompan_filter(&kb, layer.duration, width, height, fps));
    }

    if let Some(radius) = prop_f64(layer, "blur") {
        if radius > 0.0 {
            filters.push(Filter::new("boxblur").param(radius));
        }
    }

    if let Some(opacity) = prop_f64(layer, "opacity") {
        if opacity < 1.0 {
            filters.push(Filter::new("format").param("rgba"));
            filters.push(Filter::new("colorchannelmixer").named("aa", opacity));
        }
    }

    Ok(filters)
}

/// Fixed filter order for an audio layer: volume, fade-in, fade-out, then a
/// start-offset delay. An unconfigured layer passes through via `anull`.
fn audio_chain(layer: &TemplateLayer, template_duration: f64) -> Vec<Filter> {
    let mut filters = Vec::new();

    if let Some(volume) = prop_f64(layer, "volume") {
        filters.push(Filter::new("volume").param(volume));
    }
    if let Some(fade) = prop_f64(layer, "fade_in") {
        if fade > 0.0 {
            filters.push(Filter::new("afade").named("t", "in").named("st", 0).named("d", fade));
        }
    }
    if let Some(fade) = prop_f64(layer, "fade_out") {
        if fade > 0.0 {
            let start = (template_duration - fade).max(0.0);
            filters.push(
                Filter::new("afade")
                    .named("t", "out")
                    .named("st", start)
                    .named("d", fade),
            );
        }
    }
    if layer.start_time > 0.0 {
        let millis = (layer.start_time * 1000.0).round() as i64;
        filters.push(Filter::new("adelay").param(millis).named("all", 1));
    }

    if filters.is_empty() {
        filters.push(Filter::new("anull"));
    }
    filters
}

/// Build the `drawtext` filter for a text layer.
fn drawtext_filter(layer: &TemplateLayer, canvas: Resolution) -> Result<Filter, RenderError> {
    let text = prop_str(layer, "text").ok_or_else(|| {
        RenderError::GraphBuild(format!("text layer {:?} has no text property", layer.name))
    })?;

    let font_size = prop_f64(layer, "font_size").unwrap_or(DEFAULT_FONT_SIZE);
    let color = prop_str(layer, "color").unwrap_or(DEFAULT_FONT_COLOR);
    let (x, y) = text_position(layer, canvas)?;

    let mut filter = Filter::new("drawtext")
        .named("text", escape_filter_text(text))
        .named("fontsize", font_size)
        .named("fontcolor", color)
        .named("x", x)
        .named("y", y);

    if let Some(stroke) = layer.properties.get("stroke").and_then(|v| v.as_object()) {
        let width = stroke.get("width").and_then(|v| v.as_f64()).unwrap_or(2.0);
        let color = stroke.get("color").and_then(|v| v.as_str()).unwrap_or("black");
        filter = filter.named("borderw", width).named("bordercolor", color);
    }

    if let Some(shadow) = layer.properties.get("shadow").and_then(|v| v.as_object()) {
        let x = shadow.get("x").and_then(|v| v.as_f64()).unwrap_or(2.0);
        let y = shadow.get("y").and_then(|v| v.as_f64()).unwrap_or(2.0);
        let color = shadow.get("color").and_then(|v| v.as_str()).unwrap_or("black");
        filter = filter
            .named("shadowx", x)
            .named("shadowy", y)
            .named("shadowcolor", color);
    }

    Ok(filter.named("enable", enable_expr(layer)))
}

// ---------------------------------------------------------------------------
// Property helpers
// ---------------------------------------------------------------------------

fn prop_str<'a>(layer: &'a TemplateLayer, key: &str) -> Option<&'a str> {
    layer.properties.get(key).and_then(|v| v.as_str())
}

fn prop_f64(layer: &TemplateLayer, key: &str) -> Option<f64> {
    layer.properties.get(key).and_then(|v| v.as_f64())
}

fn prop_u32(layer: &TemplateLayer, key: &str) -> Option<u32> {
    layer.properties.get(key).and_then(|v| v.as_u64()).map(|v| v as u32)
}

fn require_source<'a>(layer: &'a TemplateLayer) -> Result<&'a str, RenderError> {
    prop_str(layer, "source").ok_or_else(|| {
        RenderError::GraphBuild(format!("layer {:?} has no source property", layer.name))
    })
}

/// Target size for the scale filter: both dimensions from the layer, or the
/// canvas size. Specifying only one dimension is a build error rather than
/// an opaque engine failure.
fn scale_size(layer: &TemplateLayer, canvas: Resolution) -> Result<(u32, u32), RenderError> {
    match (prop_u32(layer, "width"), prop_u32(layer, "height")) {
        (Some(w), Some(h)) => Ok((w, h)),
        (None, None) => Ok((canvas.width, canvas.height)),
        _ => Err(RenderError::GraphBuild(format!(
            "layer {:?} sets only one of width/height for its scale filter",
            layer.name
        ))),
    }
}

/// Optional pixel offset of the scaled layer on the canvas.
fn position(layer: &TemplateLayer) -> Option<(u32, u32)> {
    let x = prop_u32(layer, "x");
    let y = prop_u32(layer, "y");
    if x.is_none() && y.is_none() {
        None
    } else {
        Some((x.unwrap_or(0), y.unwrap_or(0)))
    }
}

struct KenBurns {
    zoom_start: f64,
    zoom_end: f64,
    pan_x: f64,
    pan_y: f64,
}

/// Ken Burns configuration, when present and enabled.
fn ken_burns(layer: &TemplateLayer) -> Option<KenBurns> {
    let kb = layer.properties.get("ken_burns")?.as_object()?;
    if !kb.get("enabled").and_then(|v| v.as_bool()).unwrap_or(false) {
        return None;
    }
    Some(KenBurns {
        zoom_start: kb.get("zoom_start").and_then(|v| v.as_f64()).unwrap_or(1.0),
        zoom_end: kb.get("zoom_end").and_then(|v| v.as_f64()).unwrap_or(1.1),
        pan_x: kb.get("pan_x").and_then(|v| v.as_f64()).unwrap_or(0.0),
        pan_y: kb.get("pan_y").and_then(|v| v.as_f64()).unwrap_or(0.0),
    })
}

/// Linear zoom/pan over the layer's duration, centered by default.
fn zoompan_filter(kb: &KenBurns, duration: f64, width: u32, height: u32, fps: u32) -> Filter {
    let frames = ((duration * fps as f64).round() as i64).max(1);
    let KenBurns {
        zoom_start,
        zoom_end,
        pan_x,
        pan_y,
    } = kb;
    Filter::new("zoompan")
        .named("z", format!("{zoom_start}+({zoom_end}-{zoom_start})*on/{frames}"))
        .named("x", format!("(iw-iw/zoom)/2+{pan_x}*on/{frames}"))
        .named("y", format!("(ih-ih/zoom)/2+{pan_y}*on/{frames}"))
        .named("d", frames)
        .named("s", format!("{width}x{height}"))
        .named("fps", fps)
}

/// Restrict a filter to the layer's time window.
fn enable_expr(layer: &TemplateLayer) -> String {
    let end = layer.start_time + layer.duration;
    format!("'between(t,{},{end})'", layer.start_time)
}

/// Symbolic `center` or numeric coordinates for drawtext.
fn text_position(
    layer: &TemplateLayer,
    _canvas: Resolution,
) -> Result<(String, String), RenderError> {
    match layer.properties.get("position") {
        None => Ok(centered()),
        Some(serde_json::Value::String(s)) if s == "center" => Ok(centered()),
        Some(serde_json::Value::Object(map)) => {
            let x = map.get("x").and_then(|v| v.as_f64());
            let y = map.get("y").and_then(|v| v.as_f64());
            match (x, y) {
                (Some(x), Some(y)) => Ok((x.to_string(), y.to_string())),
                _ => Err(RenderError::GraphBuild(format!(
                    "text layer {:?} position needs numeric x and y",
                    layer.name
                ))),
            }
        }
        Some(other) => Err(RenderError::GraphBuild(format!(
            "text layer {:?} has unsupported position {other}",
            layer.name
        ))),
    }
}

fn centered() -> (String, String) {
    ("(w-text_w)/2".to_string(), "(h-text_h)/2".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
