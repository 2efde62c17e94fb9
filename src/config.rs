// src/config.rs
//
// Session configuration.
//
// One config is held by the process-wide context and shared by every
// session. All fields have defaults, so a host can deserialize a partial
// JSON object.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_UNIT_NAME: &str = "main";
const DEFAULT_COMPILE_FLAGS: &str = "-ftz 2";
const DEFAULT_SAMPLE_ASSET: &str = "02-XYLO1.mp3";
const DEFAULT_IDE_URL: &str = "https://faustide.grame.fr/";
const DEFAULT_DIAGRAM_PLACEHOLDER: &str = "Computing SVG...";

/// Settings for the analysis node feeding the scope and spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserOptions {
    pub fft_size: u32,
    pub min_decibels: f64,
    pub max_decibels: f64,
    pub smoothing: f64,
}

impl Default for AnalyserOptions {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            min_decibels: -96.0,
            max_decibels: 0.0,
            smoothing: 0.85,
        }
    }
}

/// Trace style for the oscilloscope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeStyle {
    pub color: String,
    /// Trigger threshold used to stabilise the trace.
    pub edge_threshold: f32,
}

impl Default for ScopeStyle {
    fn default() -> Self {
        Self {
            color: "rgb(212, 100, 100)".to_string(),
            edge_threshold: 0.09,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Lower bound on the editor height in pixels.
    pub min_editor_height: f64,
    /// Scale applied to the parameter UI's minimum size.
    pub ui_scale: f64,
    /// Editor/sidebar split (percent) used when the sidebar first opens.
    pub sidebar_sizes: [f64; 2],
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_editor_height: 125.0,
            ui_scale: 1.25,
            sidebar_sizes: [70.0, 30.0],
        }
    }
}

/// Configuration shared by all sessions of a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name the compiler knows the unit by; also the diagram folder prefix.
    pub unit_name: String,
    pub compile_flags: String,
    pub diagram_args: String,
    /// Sample played by the "file playback" input, relative to the
    /// hosting script's base URL.
    pub sample_asset: String,
    pub ide_url: String,
    pub diagram_placeholder: String,
    pub analyser: AnalyserOptions,
    pub scope: ScopeStyle,
    pub layout: LayoutConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            unit_name: DEFAULT_UNIT_NAME.to_string(),
            compile_flags: DEFAULT_COMPILE_FLAGS.to_string(),
            diagram_args: String::new(),
            sample_asset: DEFAULT_SAMPLE_ASSET.to_string(),
            ide_url: DEFAULT_IDE_URL.to_string(),
            diagram_placeholder: DEFAULT_DIAGRAM_PLACEHOLDER.to_string(),
            analyser: AnalyserOptions::default(),
            scope: ScopeStyle::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sub-diagram path inside the compiler's virtual filesystem.
    pub fn diagram_path(&self, target: &str) -> String {
        format!("{}-svg/{}", self.unit_name, target)
    }
}
