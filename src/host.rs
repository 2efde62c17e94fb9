//! Collaborator seams.
//!
//! Everything the session talks to but does not own is described here as an
//! object-safe trait: the DSP compiler, the process-wide audio clock, device
//! enumeration, MIDI access, asset fetching, the frame scheduler and the
//! per-session views (editor, control bar, renderers).
//!
//! # Threading
//!
//! Nothing here is `Send`. The session runs on one cooperative event loop
//! (the browser main thread, or a current-thread runtime in tests), so
//! suspending operations return a [`LocalBoxFuture`] and shared state uses
//! `Rc`/`RefCell`.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::{AnalyserOptions, ScopeStyle};
use crate::error::{
    AssetLoadError, CompileError, DeviceAccessError, Diagnostic, InstantiateError,
    MidiAccessError,
};
use crate::metadata::UiTree;
use crate::state::TabState;

/// Boxed, non-`Send` future returned by collaborator operations.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Handle to a node in the audio graph.
pub type NodeId = u32;

/// Handle to decoded audio held by the clock.
pub type BufferId = u32;

/// Handle to a pending animation-frame callback.
pub type FrameId = u64;

// ═══════════════════════════════════════════════════════════════════
// Audio clock
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Suspended,
    Running,
    Closed,
}

/// The process-wide audio context: clock, destination and node factory.
pub trait AudioClock {
    fn state(&self) -> ClockState;

    /// Resume a suspended clock (may wait on a user-gesture policy).
    fn resume(&self) -> LocalBoxFuture<'_, ()>;

    /// The hardware output sink.
    fn destination(&self) -> NodeId;

    fn connect(&self, source: NodeId, sink: NodeId);

    /// Remove every outgoing edge of `source`.
    fn disconnect(&self, source: NodeId);

    /// Create a passive analysis node.
    fn create_analyser(&self, options: &AnalyserOptions) -> NodeId;

    /// Open a live input stream for a device (may prompt for permission).
    fn open_input_stream<'a>(
        &'a self,
        device_id: &'a str,
    ) -> LocalBoxFuture<'a, Result<NodeId, DeviceAccessError>>;

    fn decode_audio(&self, bytes: Vec<u8>) -> LocalBoxFuture<'_, Result<BufferId, AssetLoadError>>;

    /// Create a one-shot source playing `buffer`.
    fn create_buffer_source(&self, buffer: BufferId) -> NodeId;

    fn start_source(&self, node: NodeId);

    fn stop_source(&self, node: NodeId);
}

// ═══════════════════════════════════════════════════════════════════
// Compiler and runtime unit
// ═══════════════════════════════════════════════════════════════════

/// Which instantiation path a compile targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneratorKind {
    Mono,
    Poly { voices: u32 },
}

/// External DSP compiler.
pub trait DspCompiler {
    /// Compile `source` for the given path.
    ///
    /// Every call returns a fresh artifact; artifacts are never shared
    /// between calls.
    fn compile<'a>(
        &'a self,
        kind: GeneratorKind,
        name: &'a str,
        source: &'a str,
        flags: &'a str,
    ) -> LocalBoxFuture<'a, Result<Box<dyn CompiledArtifact>, CompileError>>;

    /// Render the top-level structural diagram markup.
    fn render_diagram(&self, name: &str, source: &str, args: &str) -> Result<String, CompileError>;

    /// Read a file from the compiler's virtual filesystem.
    fn read_file(&self, path: &str) -> Option<String>;
}

/// Output of one compile call.
pub trait CompiledArtifact {
    /// JSON description of the compiled unit.
    fn metadata_json(&self) -> &str;

    /// Create a runnable unit. `voices` is `Some` on the polyphonic path.
    fn instantiate<'a>(
        &'a self,
        clock: &'a dyn AudioClock,
        voices: Option<u32>,
    ) -> LocalBoxFuture<'a, Result<Rc<dyn RuntimeUnit>, InstantiateError>>;
}

/// Callback receiving `(path, value)` parameter updates.
pub type ParamHandler = Box<dyn Fn(&str, f32)>;

/// An instantiated processing node.
pub trait RuntimeUnit {
    fn node(&self) -> NodeId;

    fn num_inputs(&self) -> usize;

    fn ui(&self) -> UiTree;

    fn set_param(&self, path: &str, value: f32);

    /// Install (or clear) the handler for unit-originated parameter changes.
    fn set_output_param_handler(&self, handler: Option<ParamHandler>);

    fn key_on(&self, channel: u8, note: u8, velocity: u8);

    fn key_off(&self, channel: u8, note: u8, velocity: u8);

    fn ctrl_change(&self, channel: u8, controller: u8, value: u8);

    /// 14-bit bend value, centre 8192.
    fn pitch_wheel(&self, channel: u8, value: u16);

    fn start_sensors(&self) -> LocalBoxFuture<'_, ()>;

    fn stop_sensors(&self);

    /// Release the unit's processing resources. The unit is unusable after.
    fn destroy(&self);
}

// ═══════════════════════════════════════════════════════════════════
// Devices, MIDI, assets, scheduling
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    AudioInput,
    AudioOutput,
    VideoInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub label: String,
    pub kind: DeviceKind,
}

pub trait DeviceProvider {
    fn enumerate(&self) -> LocalBoxFuture<'_, Result<Vec<DeviceDescriptor>, DeviceAccessError>>;

    /// Register the hot-plug callback. Called at most once per provider.
    fn watch(&self, on_change: Box<dyn Fn(Vec<DeviceDescriptor>)>);
}

/// Callback receiving raw MIDI messages.
pub type MidiListener = Rc<dyn Fn(&[u8])>;

pub trait MidiInput {
    fn set_listener(&self, listener: Option<MidiListener>);
}

pub trait MidiAccess {
    fn request(&self) -> LocalBoxFuture<'_, Result<Vec<Rc<dyn MidiInput>>, MidiAccessError>>;
}

pub trait AssetFetcher {
    /// Resolved URL of the script hosting this component.
    fn script_url(&self) -> Option<String>;

    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, AssetLoadError>>;
}

pub trait FrameScheduler {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> FrameId;

    fn cancel_frame(&self, id: FrameId);

    /// Run `callback` on the next scheduler tick.
    fn defer(&self, callback: Box<dyn FnOnce()>);
}

// ═══════════════════════════════════════════════════════════════════
// Per-session views
// ═══════════════════════════════════════════════════════════════════

pub trait Editor {
    fn text(&self) -> String;

    fn show_diagnostic(&self, diagnostic: &Diagnostic);

    fn clear_diagnostics(&self);
}

/// Sizes derived from the rendered parameter UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamLayout {
    pub editor_height: f64,
    pub controls_width: f64,
    pub controls_height: f64,
}

/// Run/stop buttons, tab strip and sidebar.
pub trait ControlBar {
    fn set_run_enabled(&self, enabled: bool);

    fn set_stop_enabled(&self, enabled: bool);

    fn set_tabs_enabled(&self, enabled: bool);

    fn set_active_tab(&self, tab: TabState);

    fn open_sidebar(&self, sizes: [f64; 2]);

    fn apply_layout(&self, layout: ParamLayout);
}

/// One entry of the input selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputOption {
    pub label: String,
    pub value: String,
}

pub trait InputSelector {
    fn set_enabled(&self, enabled: bool);

    fn set_options(&self, options: &[InputOption]);

    /// Show the disabled placeholder entry only.
    fn reset(&self);
}

pub trait ParamView {
    fn min_width(&self) -> f64;

    fn min_height(&self) -> f64;

    /// Install (or clear) the hook fired when the user edits a control.
    fn set_ui_change_handler(&self, handler: Option<ParamHandler>);

    /// Reflect a unit-originated change on the matching widget.
    fn apply_dsp_change(&self, path: &str, value: f32);
}

pub trait ParamUiFactory {
    fn render(&self, ui: &UiTree) -> Rc<dyn ParamView>;
}

pub trait DiagramView {
    /// Replace the displayed content. `links` are the activatable targets.
    fn show(&self, markup: &str, links: &[String]);
}

/// Oscilloscope / spectrum surface.
pub trait Plot {
    fn render_scope(&self, analyser: NodeId, style: &ScopeStyle);

    fn render_spectrum(&self, analyser: NodeId);

    fn on_resize(&self);

    fn clear(&self);
}

/// Views owned by one session.
#[derive(Clone)]
pub struct SessionView {
    pub editor: Rc<dyn Editor>,
    pub controls: Rc<dyn ControlBar>,
    pub inputs: Rc<dyn InputSelector>,
    pub params: Rc<dyn ParamUiFactory>,
    pub diagram: Rc<dyn DiagramView>,
    pub scope: Rc<dyn Plot>,
    pub spectrum: Rc<dyn Plot>,
}
