// src/testing.rs
//
// In-memory collaborators for unit tests.
//
// Every fake records what was asked of it and exposes readbacks. None of
// them suspend unless a test holds one with `hold_next`.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use tokio::sync::Notify;

use crate::audio_graph::AudioGraphBinder;
use crate::config::{AnalyserOptions, ScopeStyle, SessionConfig};
use crate::context::{Context, Host};
use crate::controller::SessionController;
use crate::error::{
    AssetLoadError, CompileError, DeviceAccessError, Diagnostic, InstantiateError,
    MidiAccessError,
};
use crate::host::{
    AssetFetcher, AudioClock, BufferId, ClockState, CompiledArtifact, ControlBar,
    DeviceDescriptor, DeviceKind, DeviceProvider, DiagramView, DspCompiler, Editor, FrameId,
    FrameScheduler, GeneratorKind, InputOption, InputSelector, LocalBoxFuture, MidiAccess,
    MidiInput, MidiListener, NodeId, ParamHandler, ParamLayout, ParamUiFactory, ParamView,
    Plot, RuntimeUnit, SessionView,
};
use crate::metadata::{CompiledMetadata, UiTree};
use crate::state::TabState;

// ═══════════════════════════════════════════════════════════════════
// Sources and devices
// ═══════════════════════════════════════════════════════════════════

const GAIN_SLIDER: &str = r#"{ "type": "hslider", "label": "gain", "address": "/main/gain",
      "init": 0.5, "min": 0, "max": 1, "step": 0.01 }"#;

/// Source for a monophonic unit with one slider. The fake compiler treats
/// source text as the unit description.
pub fn mono_source(inputs: u32) -> String {
    format!(
        r#"{{ "name": "main", "inputs": {inputs}, "outputs": 2, "meta": [],
             "ui": [{{ "type": "vgroup", "label": "main", "items": [{GAIN_SLIDER}] }}] }}"#
    )
}

/// Source declaring `voices` voices, with or without MIDI.
pub fn poly_source(voices: u32, midi: bool) -> String {
    let midi = if midi { "on" } else { "off" };
    format!(
        r#"{{ "name": "main", "inputs": 0, "outputs": 2,
             "meta": [{{ "options": "[midi:{midi}][nvoices:{voices}]" }}],
             "ui": [{{ "type": "vgroup", "label": "main", "items": [{GAIN_SLIDER}] }}] }}"#
    )
}

/// Source whose UI is a single empty group.
pub fn bare_source() -> String {
    r#"{ "name": "main", "inputs": 0, "outputs": 1, "meta": [],
         "ui": [{ "type": "vgroup", "label": "main", "items": [] }] }"#
        .to_string()
}

pub fn mic(id: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        id: id.to_string(),
        label: format!("Mic {id}"),
        kind: DeviceKind::AudioInput,
    }
}

// ═══════════════════════════════════════════════════════════════════
// Audio clock
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphOp {
    Connect(NodeId, NodeId),
    Disconnect(NodeId),
    Start(NodeId),
    Stop(NodeId),
}

const DESTINATION: NodeId = 0;

pub struct FakeClock {
    state: Cell<ClockState>,
    resumes: Cell<usize>,
    next_node: Cell<NodeId>,
    edges: RefCell<Vec<(NodeId, NodeId)>>,
    log: RefCell<Vec<GraphOp>>,
    playing: RefCell<HashSet<NodeId>>,
    deny_input: Cell<bool>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            state: Cell::new(ClockState::Running),
            resumes: Cell::new(0),
            next_node: Cell::new(1000),
            edges: RefCell::new(Vec::new()),
            log: RefCell::new(Vec::new()),
            playing: RefCell::new(HashSet::new()),
            deny_input: Cell::new(false),
        }
    }

    pub fn suspended() -> Self {
        let clock = Self::new();
        clock.state.set(ClockState::Suspended);
        clock
    }

    fn alloc(&self) -> NodeId {
        let id = self.next_node.get();
        self.next_node.set(id + 1);
        id
    }

    pub fn deny_input(&self) {
        self.deny_input.set(true);
    }

    pub fn resumes(&self) -> usize {
        self.resumes.get()
    }

    pub fn is_connected(&self, source: NodeId, sink: NodeId) -> bool {
        self.edges.borrow().contains(&(source, sink))
    }

    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.edges.borrow().clone()
    }

    /// Sources currently connected into `sink`.
    pub fn inputs_into(&self, sink: NodeId) -> Vec<NodeId> {
        self.edges
            .borrow()
            .iter()
            .filter(|(_, s)| *s == sink)
            .map(|(source, _)| *source)
            .collect()
    }

    pub fn is_playing(&self, node: NodeId) -> bool {
        self.playing.borrow().contains(&node)
    }

    pub fn log(&self) -> Vec<GraphOp> {
        self.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

impl AudioClock for FakeClock {
    fn state(&self) -> ClockState {
        self.state.get()
    }

    fn resume(&self) -> LocalBoxFuture<'_, ()> {
        self.resumes.set(self.resumes.get() + 1);
        self.state.set(ClockState::Running);
        Box::pin(async {})
    }

    fn destination(&self) -> NodeId {
        DESTINATION
    }

    fn connect(&self, source: NodeId, sink: NodeId) {
        let mut edges = self.edges.borrow_mut();
        if !edges.contains(&(source, sink)) {
            edges.push((source, sink));
        }
        self.log.borrow_mut().push(GraphOp::Connect(source, sink));
    }

    fn disconnect(&self, source: NodeId) {
        self.edges.borrow_mut().retain(|(s, _)| *s != source);
        self.log.borrow_mut().push(GraphOp::Disconnect(source));
    }

    fn create_analyser(&self, _options: &AnalyserOptions) -> NodeId {
        self.alloc()
    }

    fn open_input_stream<'a>(
        &'a self,
        device_id: &'a str,
    ) -> LocalBoxFuture<'a, Result<NodeId, DeviceAccessError>> {
        let result = if self.deny_input.get() {
            Err(DeviceAccessError::PermissionDenied(device_id.to_string()))
        } else {
            Ok(self.alloc())
        };
        Box::pin(async move { result })
    }

    fn decode_audio(&self, bytes: Vec<u8>) -> LocalBoxFuture<'_, Result<BufferId, AssetLoadError>> {
        let result = if bytes.is_empty() {
            Err(AssetLoadError::Decode("empty payload".into()))
        } else {
            Ok(self.alloc())
        };
        Box::pin(async move { result })
    }

    fn create_buffer_source(&self, _buffer: BufferId) -> NodeId {
        self.alloc()
    }

    fn start_source(&self, node: NodeId) {
        self.playing.borrow_mut().insert(node);
        self.log.borrow_mut().push(GraphOp::Start(node));
    }

    fn stop_source(&self, node: NodeId) {
        self.playing.borrow_mut().remove(&node);
        self.log.borrow_mut().push(GraphOp::Stop(node));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Compiler and units
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum UnitCall {
    SetParam(String, f32),
    KeyOn(u8, u8, u8),
    KeyOff(u8, u8, u8),
    CtrlChange(u8, u8, u8),
    PitchWheel(u8, u16),
}

pub struct FakeUnit {
    node: NodeId,
    inputs: usize,
    ui: UiTree,
    calls: RefCell<Vec<UnitCall>>,
    output: RefCell<Option<ParamHandler>>,
    sensors: Cell<bool>,
    destroyed: Cell<bool>,
}

impl FakeUnit {
    pub fn new(node: NodeId, inputs: usize) -> Rc<Self> {
        Self::with_ui(node, inputs, Vec::new())
    }

    pub fn with_ui(node: NodeId, inputs: usize, ui: UiTree) -> Rc<Self> {
        Rc::new(Self {
            node,
            inputs,
            ui,
            calls: RefCell::new(Vec::new()),
            output: RefCell::new(None),
            sensors: Cell::new(false),
            destroyed: Cell::new(false),
        })
    }

    fn record(&self, call: UnitCall) {
        self.calls.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<UnitCall> {
        self.calls.borrow().clone()
    }

    /// Emit a unit-originated parameter change.
    pub fn automate(&self, path: &str, value: f32) {
        if let Some(handler) = self.output.borrow().as_ref() {
            handler(path, value);
        }
    }

    pub fn has_output_handler(&self) -> bool {
        self.output.borrow().is_some()
    }

    pub fn sensors_running(&self) -> bool {
        self.sensors.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }
}

impl RuntimeUnit for FakeUnit {
    fn node(&self) -> NodeId {
        self.node
    }

    fn num_inputs(&self) -> usize {
        self.inputs
    }

    fn ui(&self) -> UiTree {
        self.ui.clone()
    }

    fn set_param(&self, path: &str, value: f32) {
        self.record(UnitCall::SetParam(path.to_string(), value));
    }

    fn set_output_param_handler(&self, handler: Option<ParamHandler>) {
        *self.output.borrow_mut() = handler;
    }

    fn key_on(&self, channel: u8, note: u8, velocity: u8) {
        self.record(UnitCall::KeyOn(channel, note, velocity));
    }

    fn key_off(&self, channel: u8, note: u8, velocity: u8) {
        self.record(UnitCall::KeyOff(channel, note, velocity));
    }

    fn ctrl_change(&self, channel: u8, controller: u8, value: u8) {
        self.record(UnitCall::CtrlChange(channel, controller, value));
    }

    fn pitch_wheel(&self, channel: u8, value: u16) {
        self.record(UnitCall::PitchWheel(channel, value));
    }

    fn start_sensors(&self) -> LocalBoxFuture<'_, ()> {
        self.sensors.set(true);
        Box::pin(async {})
    }

    fn stop_sensors(&self) {
        self.sensors.set(false);
    }

    fn destroy(&self) {
        self.destroyed.set(true);
    }
}

#[derive(Default)]
struct CompilerShared {
    next_node: Cell<NodeId>,
    instantiations: RefCell<Vec<Option<u32>>>,
    units: RefCell<Vec<Rc<FakeUnit>>>,
    fail_instantiate: Cell<bool>,
}

struct FakeArtifact {
    description: String,
    shared: Rc<CompilerShared>,
}

impl CompiledArtifact for FakeArtifact {
    fn metadata_json(&self) -> &str {
        &self.description
    }

    fn instantiate<'a>(
        &'a self,
        _clock: &'a dyn AudioClock,
        voices: Option<u32>,
    ) -> LocalBoxFuture<'a, Result<Rc<dyn RuntimeUnit>, InstantiateError>> {
        let shared = &self.shared;
        shared.instantiations.borrow_mut().push(voices);

        let result = if shared.fail_instantiate.get() {
            Err(InstantiateError("out of memory".into()))
        } else {
            match CompiledMetadata::from_json(&self.description) {
                Ok(metadata) => {
                    let node = shared.next_node.get();
                    shared.next_node.set(node + 1);
                    let unit = FakeUnit::with_ui(node, metadata.inputs as usize, metadata.ui);
                    shared.units.borrow_mut().push(Rc::clone(&unit));
                    Ok(unit as Rc<dyn RuntimeUnit>)
                }
                Err(e) => Err(InstantiateError(e.message)),
            }
        };
        Box::pin(async move { result })
    }
}

/// Scripted compiler: the source text is the unit description, and a
/// source starting with `broken` fails with the source as the message.
pub struct FakeCompiler {
    shared: Rc<CompilerShared>,
    compiles: RefCell<Vec<GeneratorKind>>,
    last_flags: RefCell<Option<String>>,
    gate: RefCell<Option<Rc<Notify>>>,
    diagram_renders: Cell<usize>,
    files_read: RefCell<Vec<String>>,
}

impl FakeCompiler {
    pub fn new() -> Self {
        let shared = CompilerShared::default();
        shared.next_node.set(100);
        Self {
            shared: Rc::new(shared),
            compiles: RefCell::new(Vec::new()),
            last_flags: RefCell::new(None),
            gate: RefCell::new(None),
            diagram_renders: Cell::new(0),
            files_read: RefCell::new(Vec::new()),
        }
    }

    /// Hold the next compile until the returned gate is notified.
    pub fn hold_next(&self) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        *self.gate.borrow_mut() = Some(Rc::clone(&gate));
        gate
    }

    pub fn fail_instantiate(&self) {
        self.shared.fail_instantiate.set(true);
    }

    pub fn compiles(&self) -> Vec<GeneratorKind> {
        self.compiles.borrow().clone()
    }

    pub fn last_flags(&self) -> Option<String> {
        self.last_flags.borrow().clone()
    }

    pub fn instantiations(&self) -> Vec<Option<u32>> {
        self.shared.instantiations.borrow().clone()
    }

    /// Every unit instantiated so far, oldest first.
    pub fn units(&self) -> Vec<Rc<FakeUnit>> {
        self.shared.units.borrow().clone()
    }

    pub fn live_units(&self) -> usize {
        self.shared
            .units
            .borrow()
            .iter()
            .filter(|u| !u.is_destroyed())
            .count()
    }

    pub fn diagram_renders(&self) -> usize {
        self.diagram_renders.get()
    }

    pub fn files_read(&self) -> Vec<String> {
        self.files_read.borrow().clone()
    }
}

impl DspCompiler for FakeCompiler {
    fn compile<'a>(
        &'a self,
        kind: GeneratorKind,
        _name: &'a str,
        source: &'a str,
        flags: &'a str,
    ) -> LocalBoxFuture<'a, Result<Box<dyn CompiledArtifact>, CompileError>> {
        self.compiles.borrow_mut().push(kind);
        *self.last_flags.borrow_mut() = Some(flags.to_string());
        let gate = self.gate.borrow_mut().take();

        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if source.starts_with("broken") {
                return Err(CompileError::from_compiler_message(source));
            }
            Ok(Box::new(FakeArtifact {
                description: source.to_string(),
                shared: Rc::clone(&self.shared),
            }) as Box<dyn CompiledArtifact>)
        })
    }

    fn render_diagram(&self, _name: &str, source: &str, _args: &str) -> Result<String, CompileError> {
        self.diagram_renders.set(self.diagram_renders.get() + 1);
        if source.starts_with("broken") {
            return Err(CompileError::from_compiler_message(source));
        }
        Ok(r#"<svg id="process"><a xlink:href="process-1.svg"><rect/></a></svg>"#.to_string())
    }

    fn read_file(&self, path: &str) -> Option<String> {
        self.files_read.borrow_mut().push(path.to_string());
        path.ends_with("/process-1.svg")
            .then(|| r#"<svg id="process-1"><a xlink:href="process-2.svg"/></svg>"#.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════
// Devices, MIDI, assets, scheduler
// ═══════════════════════════════════════════════════════════════════

pub struct FakeDevices {
    devices: RefCell<Vec<DeviceDescriptor>>,
    denied: Cell<bool>,
    enumerations: Cell<usize>,
    watchers: RefCell<Vec<Box<dyn Fn(Vec<DeviceDescriptor>)>>>,
}

impl FakeDevices {
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            devices: RefCell::new(devices),
            denied: Cell::new(false),
            enumerations: Cell::new(0),
            watchers: RefCell::new(Vec::new()),
        }
    }

    /// Fail every enumeration with a permission error.
    pub fn deny(&self) {
        self.denied.set(true);
    }

    /// Replace the device list and fire the hot-plug watchers.
    pub fn plug(&self, devices: Vec<DeviceDescriptor>) {
        *self.devices.borrow_mut() = devices.clone();
        for watcher in self.watchers.borrow().iter() {
            watcher(devices.clone());
        }
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.get()
    }

    pub fn watchers(&self) -> usize {
        self.watchers.borrow().len()
    }
}

impl DeviceProvider for FakeDevices {
    fn enumerate(&self) -> LocalBoxFuture<'_, Result<Vec<DeviceDescriptor>, DeviceAccessError>> {
        self.enumerations.set(self.enumerations.get() + 1);
        let devices: Result<_, DeviceAccessError> = if self.denied.get() {
            Err(DeviceAccessError::PermissionDenied("media devices".into()))
        } else {
            Ok(self.devices.borrow().clone())
        };
        Box::pin(async move { devices })
    }

    fn watch(&self, on_change: Box<dyn Fn(Vec<DeviceDescriptor>)>) {
        self.watchers.borrow_mut().push(on_change);
    }
}

#[derive(Default)]
pub struct FakePort {
    listener: RefCell<Option<MidiListener>>,
}

impl MidiInput for FakePort {
    fn set_listener(&self, listener: Option<MidiListener>) {
        *self.listener.borrow_mut() = listener;
    }
}

pub struct FakeMidi {
    ports: Vec<Rc<FakePort>>,
    supported: bool,
    denied: Cell<bool>,
    gate: RefCell<Option<Rc<Notify>>>,
    requests: Cell<usize>,
}

impl FakeMidi {
    pub fn with_ports(count: usize) -> Self {
        Self {
            ports: (0..count).map(|_| Rc::new(FakePort::default())).collect(),
            supported: true,
            denied: Cell::new(false),
            gate: RefCell::new(None),
            requests: Cell::new(0),
        }
    }

    /// Refuse the next request.
    pub fn deny_next(&self) {
        self.denied.set(true);
    }

    /// Hold the next request until the returned gate is notified.
    pub fn hold_next(&self) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        *self.gate.borrow_mut() = Some(Rc::clone(&gate));
        gate
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::with_ports(0)
        }
    }

    pub fn listening_ports(&self) -> usize {
        self.ports
            .iter()
            .filter(|p| p.listener.borrow().is_some())
            .count()
    }

    pub fn requests(&self) -> usize {
        self.requests.get()
    }

    /// Deliver a raw message on `port`.
    pub fn send(&self, port: usize, bytes: &[u8]) {
        let listener = self.ports[port].listener.borrow().clone();
        if let Some(listener) = listener {
            listener(bytes);
        }
    }
}

impl MidiAccess for FakeMidi {
    fn request(&self) -> LocalBoxFuture<'_, Result<Vec<Rc<dyn MidiInput>>, MidiAccessError>> {
        self.requests.set(self.requests.get() + 1);
        let result: Result<Vec<Rc<dyn MidiInput>>, MidiAccessError> = if !self.supported {
            Err(MidiAccessError::Unsupported)
        } else if self.denied.replace(false) {
            Err(MidiAccessError::Denied("blocked by user".into()))
        } else {
            Ok(self
                .ports
                .iter()
                .map(|p| Rc::clone(p) as Rc<dyn MidiInput>)
                .collect())
        };
        let gate = self.gate.borrow_mut().take();

        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            result
        })
    }
}

pub struct FakeAssets {
    script_url: Option<String>,
    fetched: RefCell<Vec<String>>,
    fail: Cell<bool>,
    gate: RefCell<Option<Rc<Notify>>>,
}

impl FakeAssets {
    pub fn new(script_url: Option<&str>) -> Self {
        Self {
            script_url: script_url.map(str::to_string),
            fetched: RefCell::new(Vec::new()),
            fail: Cell::new(false),
            gate: RefCell::new(None),
        }
    }

    pub fn fail(&self) {
        self.fail.set(true);
    }

    /// Hold the next fetch until the returned gate is notified.
    pub fn hold_next(&self) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        *self.gate.borrow_mut() = Some(Rc::clone(&gate));
        gate
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl AssetFetcher for FakeAssets {
    fn script_url(&self) -> Option<String> {
        self.script_url.clone()
    }

    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, AssetLoadError>> {
        self.fetched.borrow_mut().push(url.to_string());
        let result: Result<Vec<u8>, AssetLoadError> = if self.fail.get() {
            Err(AssetLoadError::Fetch {
                url: url.to_string(),
                reason: "404 Not Found".into(),
            })
        } else {
            Ok(vec![0x49, 0x44, 0x33, 0x04])
        };
        let gate = self.gate.borrow_mut().take();

        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            result
        })
    }
}

/// Frame scheduler driven by hand from the test.
pub struct ManualScheduler {
    next_id: Cell<FrameId>,
    frames: RefCell<Vec<(FrameId, Box<dyn FnOnce()>)>>,
    deferred: RefCell<Vec<Box<dyn FnOnce()>>>,
    ignore_cancels: Cell<bool>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            frames: RefCell::new(Vec::new()),
            deferred: RefCell::new(Vec::new()),
            ignore_cancels: Cell::new(false),
        }
    }

    /// Fire every frame requested so far. Frames requested while firing
    /// wait for the next call.
    pub fn run_frame(&self) {
        let frames = std::mem::take(&mut *self.frames.borrow_mut());
        for (_, callback) in frames {
            callback();
        }
    }

    /// Drain the deferred queue.
    pub fn run_deferred(&self) {
        loop {
            let deferred = std::mem::take(&mut *self.deferred.borrow_mut());
            if deferred.is_empty() {
                break;
            }
            for callback in deferred {
                callback();
            }
        }
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Keep cancelled frames queued, as a host may already have dispatched
    /// them.
    pub fn ignore_cancels(&self) {
        self.ignore_cancels.set(true);
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> FrameId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.frames.borrow_mut().push((id, callback));
        id
    }

    fn cancel_frame(&self, id: FrameId) {
        if !self.ignore_cancels.get() {
            self.frames.borrow_mut().retain(|(frame, _)| *frame != id);
        }
    }

    fn defer(&self, callback: Box<dyn FnOnce()>) {
        self.deferred.borrow_mut().push(callback);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Views
// ═══════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct FakeEditor {
    text: RefCell<String>,
    diagnostics: RefCell<Vec<Diagnostic>>,
    clears: Cell<usize>,
}

impl FakeEditor {
    pub fn set_text(&self, text: &str) {
        *self.text.borrow_mut() = text.to_string();
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.get()
    }
}

impl Editor for FakeEditor {
    fn text(&self) -> String {
        self.text.borrow().clone()
    }

    fn show_diagnostic(&self, diagnostic: &Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic.clone());
    }

    fn clear_diagnostics(&self) {
        self.clears.set(self.clears.get() + 1);
        self.diagnostics.borrow_mut().clear();
    }
}

#[derive(Default)]
pub struct FakeControlBar {
    run_enabled: Cell<bool>,
    stop_enabled: Cell<bool>,
    tabs_enabled: Cell<bool>,
    active_tab: Cell<TabState>,
    sidebar_opens: RefCell<Vec<[f64; 2]>>,
    layouts: RefCell<Vec<ParamLayout>>,
}

impl FakeControlBar {
    pub fn run_enabled(&self) -> bool {
        self.run_enabled.get()
    }

    pub fn stop_enabled(&self) -> bool {
        self.stop_enabled.get()
    }

    pub fn tabs_enabled(&self) -> bool {
        self.tabs_enabled.get()
    }

    pub fn active_tab(&self) -> TabState {
        self.active_tab.get()
    }

    pub fn sidebar_opens(&self) -> Vec<[f64; 2]> {
        self.sidebar_opens.borrow().clone()
    }

    pub fn layouts(&self) -> Vec<ParamLayout> {
        self.layouts.borrow().clone()
    }
}

impl ControlBar for FakeControlBar {
    fn set_run_enabled(&self, enabled: bool) {
        self.run_enabled.set(enabled);
    }

    fn set_stop_enabled(&self, enabled: bool) {
        self.stop_enabled.set(enabled);
    }

    fn set_tabs_enabled(&self, enabled: bool) {
        self.tabs_enabled.set(enabled);
    }

    fn set_active_tab(&self, tab: TabState) {
        self.active_tab.set(tab);
    }

    fn open_sidebar(&self, sizes: [f64; 2]) {
        self.sidebar_opens.borrow_mut().push(sizes);
    }

    fn apply_layout(&self, layout: ParamLayout) {
        self.layouts.borrow_mut().push(layout);
    }
}

#[derive(Default)]
pub struct FakeSelector {
    enabled: Cell<bool>,
    option_sets: RefCell<Vec<Vec<InputOption>>>,
    resets: Cell<usize>,
}

impl FakeSelector {
    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Every option list the selector was given, oldest first.
    pub fn option_sets(&self) -> Vec<Vec<InputOption>> {
        self.option_sets.borrow().clone()
    }

    pub fn resets(&self) -> usize {
        self.resets.get()
    }
}

impl InputSelector for FakeSelector {
    fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    fn set_options(&self, options: &[InputOption]) {
        self.option_sets.borrow_mut().push(options.to_vec());
    }

    fn reset(&self) {
        self.resets.set(self.resets.get() + 1);
    }
}

pub struct FakeParamView {
    min_width: f64,
    min_height: f64,
    handler: RefCell<Option<ParamHandler>>,
    dsp_changes: RefCell<Vec<(String, f32)>>,
}

impl FakeParamView {
    pub fn new(min_width: f64, min_height: f64) -> Rc<Self> {
        Rc::new(Self {
            min_width,
            min_height,
            handler: RefCell::new(None),
            dsp_changes: RefCell::new(Vec::new()),
        })
    }

    /// Simulate the user moving a control.
    pub fn user_edit(&self, path: &str, value: f32) {
        if let Some(handler) = self.handler.borrow().as_ref() {
            handler(path, value);
        }
    }

    pub fn dsp_changes(&self) -> Vec<(String, f32)> {
        self.dsp_changes.borrow().clone()
    }

    pub fn has_ui_handler(&self) -> bool {
        self.handler.borrow().is_some()
    }
}

impl ParamView for FakeParamView {
    fn min_width(&self) -> f64 {
        self.min_width
    }

    fn min_height(&self) -> f64 {
        self.min_height
    }

    fn set_ui_change_handler(&self, handler: Option<ParamHandler>) {
        *self.handler.borrow_mut() = handler;
    }

    fn apply_dsp_change(&self, path: &str, value: f32) {
        self.dsp_changes.borrow_mut().push((path.to_string(), value));
    }
}

pub struct FakeParamFactory {
    size: (f64, f64),
    views: RefCell<Vec<Rc<FakeParamView>>>,
}

impl FakeParamFactory {
    pub fn new(min_width: f64, min_height: f64) -> Self {
        Self {
            size: (min_width, min_height),
            views: RefCell::new(Vec::new()),
        }
    }

    pub fn last_view(&self) -> Option<Rc<FakeParamView>> {
        self.views.borrow().last().cloned()
    }
}

impl ParamUiFactory for FakeParamFactory {
    fn render(&self, _ui: &UiTree) -> Rc<dyn ParamView> {
        let view = FakeParamView::new(self.size.0, self.size.1);
        self.views.borrow_mut().push(Rc::clone(&view));
        view
    }
}

#[derive(Default)]
pub struct FakeDiagram {
    shown: RefCell<Vec<(String, Vec<String>)>>,
}

impl FakeDiagram {
    pub fn last(&self) -> Option<(String, Vec<String>)> {
        self.shown.borrow().last().cloned()
    }

    pub fn shown(&self) -> usize {
        self.shown.borrow().len()
    }
}

impl DiagramView for FakeDiagram {
    fn show(&self, markup: &str, links: &[String]) {
        self.shown
            .borrow_mut()
            .push((markup.to_string(), links.to_vec()));
    }
}

#[derive(Default)]
pub struct FakePlot {
    scope_renders: Cell<usize>,
    spectrum_renders: Cell<usize>,
    resizes: Cell<usize>,
    clears: Cell<usize>,
}

impl FakePlot {
    pub fn scope_renders(&self) -> usize {
        self.scope_renders.get()
    }

    pub fn spectrum_renders(&self) -> usize {
        self.spectrum_renders.get()
    }

    pub fn resizes(&self) -> usize {
        self.resizes.get()
    }

    pub fn clears(&self) -> usize {
        self.clears.get()
    }
}

impl Plot for FakePlot {
    fn render_scope(&self, _analyser: NodeId, _style: &ScopeStyle) {
        self.scope_renders.set(self.scope_renders.get() + 1);
    }

    fn render_spectrum(&self, _analyser: NodeId) {
        self.spectrum_renders.set(self.spectrum_renders.get() + 1);
    }

    fn on_resize(&self) {
        self.resizes.set(self.resizes.get() + 1);
    }

    fn clear(&self) {
        self.clears.set(self.clears.get() + 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Harness
// ═══════════════════════════════════════════════════════════════════

/// A context wired to fakes, plus one set of session views.
pub struct Harness {
    pub clock: Rc<FakeClock>,
    pub compiler: Rc<FakeCompiler>,
    pub devices: Rc<FakeDevices>,
    pub midi: Rc<FakeMidi>,
    pub assets: Rc<FakeAssets>,
    pub scheduler: Rc<ManualScheduler>,
    pub editor: Rc<FakeEditor>,
    pub controls: Rc<FakeControlBar>,
    pub selector: Rc<FakeSelector>,
    pub params: Rc<FakeParamFactory>,
    pub diagram: Rc<FakeDiagram>,
    pub scope: Rc<FakePlot>,
    pub spectrum: Rc<FakePlot>,
    pub ctx: Rc<Context>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_parts(FakeClock::new(), FakeMidi::with_ports(1))
    }

    pub fn with_parts(clock: FakeClock, midi: FakeMidi) -> Self {
        let clock = Rc::new(clock);
        let compiler = Rc::new(FakeCompiler::new());
        let devices = Rc::new(FakeDevices::new(vec![mic("mic-1"), mic("mic-2")]));
        let midi = Rc::new(midi);
        let assets = Rc::new(FakeAssets::new(Some("https://cdn.example.org/dist/component.js")));
        let scheduler = Rc::new(ManualScheduler::new());

        let ctx = Context::new(
            Host {
                compiler: compiler.clone(),
                clock: clock.clone(),
                devices: devices.clone(),
                midi: midi.clone(),
                assets: assets.clone(),
                scheduler: scheduler.clone(),
            },
            SessionConfig::default(),
        );

        Self {
            clock,
            compiler,
            devices,
            midi,
            assets,
            scheduler,
            editor: Rc::new(FakeEditor::default()),
            controls: Rc::new(FakeControlBar::default()),
            selector: Rc::new(FakeSelector::default()),
            params: Rc::new(FakeParamFactory::new(240.0, 160.0)),
            diagram: Rc::new(FakeDiagram::default()),
            scope: Rc::new(FakePlot::default()),
            spectrum: Rc::new(FakePlot::default()),
            ctx,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            editor: self.editor.clone(),
            controls: self.controls.clone(),
            inputs: self.selector.clone(),
            params: self.params.clone(),
            diagram: self.diagram.clone(),
            scope: self.scope.clone(),
            spectrum: self.spectrum.clone(),
        }
    }

    pub fn binder(&self) -> AudioGraphBinder {
        AudioGraphBinder::new(Rc::clone(&self.ctx), self.selector.clone())
    }

    pub fn session(&self) -> SessionController {
        SessionController::new(Rc::clone(&self.ctx), self.view())
    }
}
