//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled. It exposes
//! the host-independent pieces of the session (MIDI decoding, metadata
//! parsing, diagnostics, share links) so the JavaScript side of the component
//! uses the same rules as the controller.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { livedsp_init, decode_midi, parse_metadata, MidiKind } from './livedsp.js';
//!
//! await init();
//! livedsp_init();
//!
//! const meta = parse_metadata(unitJson);
//! if (meta.midi_enabled) {
//!     input.onmidimessage = (e) => {
//!         const event = decode_midi(e.data);
//!         if (event && event.kind === MidiKind.NoteOn) noteOn(event.data1, event.data2);
//!     };
//! }
//! ```

use wasm_bindgen::prelude::*;

use crate::controller;
use crate::error::CompileError;
use crate::event::MidiEvent;
use crate::metadata::CompiledMetadata;

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn livedsp_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// MIDI
// ═══════════════════════════════════════════════════════════════════════════

/// Kind of a decoded MIDI message.
#[wasm_bindgen]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiKind {
    NoteOn = 0,
    NoteOff = 1,
    ControlChange = 2,
    PitchBend = 3,
}

/// A decoded MIDI message.
#[wasm_bindgen]
#[derive(Clone, Copy)]
pub struct LiveDspMidiEvent {
    pub kind: MidiKind,
    pub channel: u8,
    /// Note, controller number, or the 14-bit bend value.
    pub data1: u16,
    /// Velocity or controller value; 0 for pitch bend.
    pub data2: u8,
}

impl From<MidiEvent> for LiveDspMidiEvent {
    fn from(event: MidiEvent) -> Self {
        match event {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => Self {
                kind: MidiKind::NoteOn,
                channel,
                data1: note.into(),
                data2: velocity,
            },
            MidiEvent::NoteOff {
                channel,
                note,
                velocity,
            } => Self {
                kind: MidiKind::NoteOff,
                channel,
                data1: note.into(),
                data2: velocity,
            },
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => Self {
                kind: MidiKind::ControlChange,
                channel,
                data1: controller.into(),
                data2: value,
            },
            MidiEvent::PitchBend { channel, value } => Self {
                kind: MidiKind::PitchBend,
                channel,
                data1: value,
                data2: 0,
            },
        }
    }
}

/// Decode a raw MIDI message. Returns `undefined` for ignored messages.
#[wasm_bindgen]
pub fn decode_midi(bytes: &[u8]) -> Option<LiveDspMidiEvent> {
    MidiEvent::decode(bytes).map(Into::into)
}

// ═══════════════════════════════════════════════════════════════════════════
// Metadata
// ═══════════════════════════════════════════════════════════════════════════

/// The parts of a unit description the session acts on.
#[wasm_bindgen]
#[derive(Clone, Copy)]
pub struct LiveDspMetadata {
    pub inputs: u32,
    pub outputs: u32,
    /// Declared voice count, -1 when undeclared.
    pub voice_count: i32,
    pub midi_enabled: bool,
    /// Whether the controls tab has anything to show.
    pub has_controls: bool,
}

impl From<&CompiledMetadata> for LiveDspMetadata {
    fn from(m: &CompiledMetadata) -> Self {
        Self {
            inputs: m.inputs,
            outputs: m.outputs,
            voice_count: m.voice_count,
            midi_enabled: m.midi_enabled,
            has_controls: crate::metadata::has_controls(&m.ui),
        }
    }
}

/// Parse a compiled unit's JSON description.
#[wasm_bindgen]
pub fn parse_metadata(json: &str) -> Result<LiveDspMetadata, JsError> {
    let metadata = CompiledMetadata::from_json(json)?;
    Ok(LiveDspMetadata::from(&metadata))
}

// ═══════════════════════════════════════════════════════════════════════════
// Editor helpers
// ═══════════════════════════════════════════════════════════════════════════

/// Compiler error split into an editor position and message.
#[wasm_bindgen]
pub struct LiveDspDiagnostic {
    line: u32,
    message: String,
}

#[wasm_bindgen]
impl LiveDspDiagnostic {
    /// 1-based line, 0 when the message carries no position.
    #[wasm_bindgen(getter)]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[wasm_bindgen(getter)]
    pub fn message(&self) -> String {
        self.message.clone()
    }
}

/// Split a raw compiler error message into line and text.
#[wasm_bindgen]
pub fn compile_diagnostic(message: &str) -> LiveDspDiagnostic {
    let diagnostic = CompileError::from_compiler_message(message).diagnostic();
    LiveDspDiagnostic {
        line: diagnostic.line.unwrap_or(0),
        message: diagnostic.message,
    }
}

/// Share link opening `source` in the online IDE at `ide_url`.
#[wasm_bindgen]
pub fn ide_link(ide_url: &str, source: &str) -> String {
    controller::ide_link(ide_url, source)
}
