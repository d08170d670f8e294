//! Sketch Decode - command-line front end for the Observer decoder
//!
//! Loads a JSON-encoded skeleton program, a solver trace and optional
//! configuration files, runs the decoder and writes the decoded program as
//! JSON or as rendered source.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use decode_core::{render_template, DecodeConfig, EventConfig, ObserverDecoder, Program};

/// Input and output locations for one decode run
#[derive(Debug, Clone, Default)]
pub struct DecodeRequest {
    pub program: PathBuf,
    pub trace: PathBuf,
    pub events: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub emit_source: bool,
}

/// What a run decoded, printed as JSON on stderr
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeReport {
    pub auxs_decoded: Vec<String>,
    /// `(aux, subject class)` pairs
    pub subjects: Vec<(String, String)>,
    pub transformations: u64,
    pub removals: u64,
}

pub fn load_program(request: &DecodeRequest) -> Result<Program> {
    let json = fs::read_to_string(&request.program)
        .with_context(|| format!("reading program {}", request.program.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("parsing program {}", request.program.display()))
}

pub fn load_config(request: &DecodeRequest) -> Result<DecodeConfig> {
    match &request.config {
        Some(path) => DecodeConfig::load(path)
            .with_context(|| format!("loading decoder config {}", path.display())),
        None => Ok(DecodeConfig::default()),
    }
}

pub fn load_events(request: &DecodeRequest) -> Result<EventConfig> {
    match &request.events {
        Some(path) => EventConfig::load(path)
            .with_context(|| format!("loading event config {}", path.display())),
        None => Ok(EventConfig::new()),
    }
}

/// Decoded program as pretty JSON, or as source text with `emit_source`
pub fn render_output(program: &Program, emit_source: bool) -> Result<String> {
    if emit_source {
        Ok(render_template(program))
    } else {
        Ok(serde_json::to_string_pretty(program)?)
    }
}

/// Run one decode; the output goes to `request.output` or is returned
pub fn run(request: &DecodeRequest) -> Result<(DecodeReport, Option<String>)> {
    let mut program = load_program(request)?;
    let config = load_config(request)?;
    let events = load_events(request)?;

    let mut decoder = ObserverDecoder::from_path(&request.trace, config, events)
        .with_context(|| format!("reading trace {}", request.trace.display()))?;
    let summary = decoder.decode(&mut program).context("decoding failed")?;

    let report = DecodeReport {
        subjects: decoder
            .subjects()
            .map(|(aux, subject)| (aux.to_string(), program.registry.class(subject).name.clone()))
            .collect(),
        transformations: summary.transformations(),
        removals: summary.removals(),
        auxs_decoded: summary.auxs_decoded,
    };

    let rendered = render_output(&program, request.emit_source)?;
    match &request.output {
        Some(path) => {
            fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))?;
            info!("wrote {}", path.display());
            Ok((report, None))
        }
        None => Ok((report, Some(rendered))),
    }
}
