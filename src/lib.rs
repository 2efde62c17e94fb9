// src/lib.rs
//
// Library entry point. Hosts build a `Context` once, then one
// `SessionController` per editor instance.

mod audio_graph;
mod bridge;
mod compile;
mod config;
mod context;
mod controller;
mod error;
mod event;
mod host;
mod metadata;
mod midi;
mod state;
mod visualization;

#[cfg(test)]
mod testing;

#[cfg(feature = "web")]
pub mod wasm;

// Re-export key types for Rust consumers
pub use audio_graph::{AudioGraphBinder, Edge, FILE_PLAYBACK, InputSource, base_url, input_options};
pub use bridge::ParamBridge;
pub use compile::{CompiledUnit, Generator, select_generator};
pub use config::{AnalyserOptions, LayoutConfig, ScopeStyle, SessionConfig};
pub use context::{CallbackRegistry, Context, DeviceCache, Host, Subscription};
pub use controller::{SessionController, ide_link, initial_tab};
pub use error::{
    AssetLoadError, CompileError, ConfigError, DeviceAccessError, Diagnostic, InstantiateError,
    MidiAccessError, SessionError,
};
pub use event::{MidiEvent, SUPPRESSED_CHANNEL};
pub use host::*;
pub use metadata::{
    CompiledMetadata, UNDECLARED_VOICES, UiItem, UiItemKind, UiTree, has_controls,
    param_addresses, parse_options,
};
pub use midi::{MidiBridge, MidiHub};
pub use state::{RunOutcome, SessionState, TabState};
pub use visualization::{RenderLoop, TabManager, diagram_links};
