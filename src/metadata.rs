// src/metadata.rs
//
// Compiled unit metadata.
//
// The compiler describes a unit as JSON: its I/O counts, a `meta` list of
// declarations and the `ui` descriptor tree. Only the parts the session
// acts on are modelled here.

use std::collections::HashMap;
use std::sync::LazyLock;

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CompileError;

static MIDI_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[midi:(on|off)\]").expect("valid midi option regex"));
static NVOICES_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[nvoices:(\d+)\]").expect("valid nvoices option regex"));

/// Voice count reported when the source declares none.
pub const UNDECLARED_VOICES: i32 = -1;

/// Kind of a UI descriptor node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiItemKind {
    VGroup,
    HGroup,
    TGroup,
    HSlider,
    VSlider,
    NEntry,
    Button,
    Checkbox,
    HBargraph,
    VBargraph,
    Soundfile,
    #[serde(other)]
    Other,
}

impl UiItemKind {
    pub fn is_group(self) -> bool {
        matches!(self, UiItemKind::VGroup | UiItemKind::HGroup | UiItemKind::TGroup)
    }
}

/// One node of the UI descriptor tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiItem {
    #[serde(rename = "type")]
    pub kind: UiItemKind,
    #[serde(default)]
    pub label: String,
    /// Parameter path; present on widgets, absent on groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<UiItem>,
}

/// Top-level UI descriptor list.
pub type UiTree = Vec<UiItem>;

/// Whether a UI tree has anything worth showing in the controls tab.
pub fn has_controls(ui: &[UiItem]) -> bool {
    match ui {
        [] => false,
        [only] => !only.items.is_empty(),
        _ => true,
    }
}

/// Every parameter address in the tree, depth first.
pub fn param_addresses(ui: &[UiItem]) -> Vec<String> {
    let mut out = Vec::new();
    collect_addresses(ui, &mut out);
    out
}

fn collect_addresses(items: &[UiItem], out: &mut Vec<String>) {
    for item in items {
        if let Some(address) = &item.address {
            out.push(address.clone());
        }
        collect_addresses(&item.items, out);
    }
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: u32,
    #[serde(default)]
    outputs: u32,
    #[serde(default)]
    meta: Vec<HashMap<String, Value>>,
    #[serde(default)]
    ui: UiTree,
}

/// Immutable description of a compiled unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledMetadata {
    pub name: String,
    pub inputs: u32,
    pub outputs: u32,
    /// Declared voice count, or [`UNDECLARED_VOICES`].
    pub voice_count: i32,
    pub midi_enabled: bool,
    pub ui: UiTree,
}

impl CompiledMetadata {
    /// Parse the compiler's JSON description.
    ///
    /// A description that does not parse is reported as a compile failure
    /// without a source position.
    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        let raw: RawMetadata = serde_json::from_str(json)
            .map_err(|e| CompileError::new(None, format!("invalid unit description: {e}")))?;

        let options = raw
            .meta
            .iter()
            .find_map(|entry| entry.get("options").and_then(Value::as_str));
        let (midi_enabled, voice_count) = options.map_or((false, UNDECLARED_VOICES), parse_options);

        Ok(Self {
            name: raw.name,
            inputs: raw.inputs,
            outputs: raw.outputs,
            voice_count,
            midi_enabled,
            ui: raw.ui,
        })
    }
}

/// Read `[midi:on|off]` and `[nvoices:N]` from an options declaration.
pub fn parse_options(options: &str) -> (bool, i32) {
    let midi = MIDI_OPTION
        .captures(options)
        .is_some_and(|caps| &caps[1] == "on");
    let voices = NVOICES_OPTION
        .captures(options)
        .map(|caps| {
            // Digits only, so the parse can only overflow.
            caps[1].parse::<i32>().unwrap_or_else(|_| {
                warn!("voice count {} out of range, clamped to {}", &caps[1], i32::MAX);
                i32::MAX
            })
        })
        .unwrap_or(UNDECLARED_VOICES);
    (midi, voices)
}
