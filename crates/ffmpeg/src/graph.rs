//! Filter-graph intermediate representation.
//!
//! The compositor builds an explicit node/edge structure — inputs, filter
//! chains, labeled streams — and renders it to ffmpeg's `-filter_complex`
//! text only at emission time. Build errors are therefore detected
//! structurally instead of surfacing as opaque engine parse failures.

use std::fmt::Display;

/// Label of the finalized video stream.
pub const VIDEO_OUT: &str = "outv";

/// Label of the finalized audio stream.
pub const AUDIO_OUT: &str = "outa";

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Where an input stream comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A media file on disk.
    File(String),
    /// A lavfi-generated source, e.g. `anullsrc=r=44100:cl=stereo`.
    Lavfi(String),
}

/// One `-i` entry of the final command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphInput {
    pub source: InputSource,
    /// Options placed before the `-i`, e.g. `["-loop", "1", "-t", "5"]`.
    pub options: Vec<String>,
}

impl GraphInput {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            source: InputSource::File(path.into()),
            options: Vec::new(),
        }
    }

    pub fn lavfi(spec: impl Into<String>) -> Self {
        Self {
            source: InputSource::Lavfi(spec.into()),
            options: Vec::new(),
        }
    }

    pub fn option(mut self, flag: &str, value: impl Display) -> Self {
        self.options.push(flag.to_string());
        self.options.push(value.to_string());
        self
    }
}

// ---------------------------------------------------------------------------
// Filters & chains
// ---------------------------------------------------------------------------

/// A single filter invocation, rendered as `name=arg1:arg2:...`.
///
/// Positional arguments must precede named ones, matching ffmpeg's option
/// parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub name: String,
    args: Vec<String>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append a positional argument.
    pub fn param(mut self, value: impl Display) -> Self {
        self.args.push(value.to_string());
        self
    }

    /// Append a `key=value` argument.
    pub fn named(mut self, key: &str, value: impl Display) -> Self {
        self.args.push(format!("{key}={value}"));
        self
    }

    fn render(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            format!("{}={}", self.name, self.args.join(":"))
        }
    }
}

/// A linear run of filters from labeled inputs to labeled outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    pub inputs: Vec<String>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<String>,
}

impl FilterChain {
    fn render(&self) -> String {
        let inputs: String = self.inputs.iter().map(|l| format!("[{l}]")).collect();
        let filters: Vec<String> = self.filters.iter().map(Filter::render).collect();
        let outputs: String = self.outputs.iter().map(|l| format!("[{l}]")).collect();
        format!("{inputs}{}{outputs}", filters.join(","))
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// The full program handed to the render engine: inputs plus the chains
/// wiring them into one video stream (`[outv]`) and one audio stream
/// (`[outa]`).
#[derive(Debug, Clone, Default)]
pub struct FilterGraph {
    pub inputs: Vec<GraphInput>,
    pub chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an input and return its stream index.
    pub fn add_input(&mut self, input: GraphInput) -> usize {
        self.inputs.push(input);
        self.inputs.len() - 1
    }

    pub fn add_chain(
        &mut self,
        inputs: Vec<String>,
        filters: Vec<Filter>,
        outputs: Vec<String>,
    ) {
        self.chains.push(FilterChain {
            inputs,
            filters,
            outputs,
        });
    }

    /// Inputs coming from files (as opposed to lavfi synthesis).
    pub fn file_input_count(&self) -> usize {
        self.inputs
            .iter()
            .filter(|i| matches!(i.source, InputSource::File(_)))
            .count()
    }

    /// Emit the `-filter_complex` program text.
    pub fn filter_complex(&self) -> String {
        self.chains
            .iter()
            .map(FilterChain::render)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Escape a literal value for embedding in a filter argument (drawtext text
/// and similar): backslash-escapes the characters the filter-graph parser
/// treats as structure.
pub fn escape_filter_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':' | ',' | ';' | '[' | ']' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
