// src/audio_graph.rs
//
// Audio graph binder.
//
// Owns the edges around the running unit: unit -> destination, unit ->
// analyser, and at most one input source -> unit. Also drives the input
// selector (devices plus a synthetic "file playback" entry) and follows
// device hot-plug.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use log::{debug, error, info, warn};

use crate::context::{Context, Subscription};
use crate::error::AssetLoadError;
use crate::host::{DeviceDescriptor, DeviceKind, InputOption, InputSelector, NodeId};

/// Selector value of the synthetic file-playback entry.
pub const FILE_PLAYBACK: &str = "Audio File";

/// A (source, sink) connection made by the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: NodeId,
    pub sink: NodeId,
}

/// What feeds the unit's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Device(String),
    FilePlayback,
}

impl InputSource {
    pub fn from_value(value: &str) -> Self {
        if value == FILE_PLAYBACK {
            InputSource::FilePlayback
        } else {
            InputSource::Device(value.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveInput {
    Stream(NodeId),
    Buffered(NodeId),
}

impl ActiveInput {
    fn node(self) -> NodeId {
        match self {
            ActiveInput::Stream(node) | ActiveInput::Buffered(node) => node,
        }
    }
}

#[derive(Default)]
struct BinderState {
    unit: Option<NodeId>,
    analyser: Option<NodeId>,
    accepts_input: bool,
    options: Vec<InputOption>,
    selected: Option<String>,
    active: Option<ActiveInput>,
    edges: Vec<Edge>,
}

/// Selector entries for a device list: audio inputs, then file playback.
pub fn input_options(devices: &[DeviceDescriptor]) -> Vec<InputOption> {
    devices
        .iter()
        .filter(|d| d.kind == DeviceKind::AudioInput)
        .map(|d| InputOption {
            label: if d.label.is_empty() {
                d.id.clone()
            } else {
                d.label.clone()
            },
            value: d.id.clone(),
        })
        .chain(std::iter::once(InputOption {
            label: FILE_PLAYBACK.to_string(),
            value: FILE_PLAYBACK.to_string(),
        }))
        .collect()
}

/// Directory part of a script URL, including the trailing slash.
pub fn base_url(script_url: &str) -> &str {
    match script_url.rfind('/') {
        Some(idx) => &script_url[..=idx],
        None => "",
    }
}

pub struct AudioGraphBinder {
    ctx: Rc<Context>,
    selector: Rc<dyn InputSelector>,
    state: Rc<RefCell<BinderState>>,
    /// Bumped on every source switch; an older switch still awaiting a
    /// stream or decode gives up when it sees a newer value.
    input_epoch: Rc<Cell<u64>>,
    _hotplug: Subscription,
}

impl AudioGraphBinder {
    pub fn new(ctx: Rc<Context>, selector: Rc<dyn InputSelector>) -> Self {
        let state = Rc::new(RefCell::new(BinderState::default()));

        let weak_state = Rc::downgrade(&state);
        let weak_selector = Rc::downgrade(&selector);
        let hotplug = ctx.devices.subscribe(move |devices| {
            repopulate(&weak_state, &weak_selector, devices);
        });

        selector.set_enabled(false);
        selector.reset();

        Self {
            ctx,
            selector,
            state,
            input_epoch: Rc::new(Cell::new(0)),
            _hotplug: hotplug,
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Unit wiring
    // ───────────────────────────────────────────────────────────────

    /// Connect a freshly started unit to the destination.
    ///
    /// Any previous unit must already have been detached.
    pub fn attach_unit(&self, unit: NodeId, num_inputs: usize) {
        let destination = self.ctx.clock.destination();
        self.connect(unit, destination);

        let mut state = self.state.borrow_mut();
        debug_assert!(state.unit.is_none(), "previous unit still attached");
        state.unit = Some(unit);
        state.accepts_input = num_inputs > 0;
        drop(state);

        if num_inputs == 0 {
            self.selector.set_enabled(false);
            self.selector.reset();
        }
    }

    /// Create the analysis node and feed it from the unit.
    pub fn attach_analyser(&self) -> Option<NodeId> {
        let unit = self.state.borrow().unit?;
        let analyser = self.ctx.clock.create_analyser(&self.ctx.config.analyser);
        self.connect(unit, analyser);
        self.state.borrow_mut().analyser = Some(analyser);
        Some(analyser)
    }

    /// Populate the selector and connect the chosen input, if the unit
    /// takes input at all.
    ///
    /// Without access to the device list the unit runs with no input and
    /// the selector stays disabled.
    pub async fn bind_inputs(&self) {
        if !self.state.borrow().accepts_input {
            return;
        }

        let devices = match self.ctx.devices.devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("{e}");
                self.state.borrow_mut().accepts_input = false;
                self.selector.set_enabled(false);
                self.selector.reset();
                return;
            }
        };
        // Detached while enumerating.
        if !self.state.borrow().accepts_input {
            return;
        }

        self.selector.set_enabled(true);
        self.populate(&devices);
        self.connect_selected().await;
    }

    /// Tear down every edge around the current unit.
    pub fn detach_unit(&self) {
        self.input_epoch.set(self.input_epoch.get() + 1);
        self.disconnect_input();

        let mut state = self.state.borrow_mut();
        let unit = state.unit.take();
        let analyser = state.analyser.take();
        state.accepts_input = false;
        state.edges.clear();
        drop(state);

        if let Some(analyser) = analyser {
            self.ctx.clock.disconnect(analyser);
        }
        if let Some(unit) = unit {
            self.ctx.clock.disconnect(unit);
            debug!("unit {unit} disconnected");
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Input selection
    // ───────────────────────────────────────────────────────────────

    /// Switch the unit's input to the selector entry `value`.
    pub async fn select_input(&self, value: &str) {
        self.state.borrow_mut().selected = Some(value.to_string());
        self.connect_selected().await;
    }

    async fn connect_selected(&self) {
        let epoch = self.input_epoch.get() + 1;
        self.input_epoch.set(epoch);

        // The prior input always goes first.
        self.disconnect_input();

        let (unit, selected) = {
            let state = self.state.borrow();
            match (state.unit, state.accepts_input) {
                (Some(unit), true) => (unit, state.selected.clone()),
                _ => return,
            }
        };
        let Some(selected) = selected else {
            return;
        };

        match InputSource::from_value(&selected) {
            InputSource::FilePlayback => match self.load_sample().await {
                Ok(source) => {
                    // Never started, so only the node is released.
                    if self.input_epoch.get() != epoch {
                        self.ctx.clock.disconnect(source);
                        return;
                    }
                    self.connect(source, unit);
                    self.ctx.clock.start_source(source);
                    self.state.borrow_mut().active = Some(ActiveInput::Buffered(source));
                    info!("file playback connected");
                }
                Err(e) => error!("{e}"),
            },
            InputSource::Device(id) => match self.ctx.clock.open_input_stream(&id).await {
                Ok(stream) => {
                    if self.input_epoch.get() != epoch {
                        self.ctx.clock.disconnect(stream);
                        return;
                    }
                    self.connect(stream, unit);
                    self.state.borrow_mut().active = Some(ActiveInput::Stream(stream));
                    info!("audio input '{id}' connected");
                }
                Err(e) => {
                    warn!("{e}");
                    if self.input_epoch.get() == epoch {
                        self.state.borrow_mut().accepts_input = false;
                        self.selector.set_enabled(false);
                    }
                }
            },
        }
    }

    async fn load_sample(&self) -> Result<NodeId, AssetLoadError> {
        let script = self.ctx.assets.script_url().ok_or(AssetLoadError::NoScriptUrl)?;
        let url = format!("{}{}", base_url(&script), self.ctx.config.sample_asset);
        let bytes = self.ctx.assets.fetch(&url).await?;
        let buffer = self.ctx.clock.decode_audio(bytes).await?;
        Ok(self.ctx.clock.create_buffer_source(buffer))
    }

    fn disconnect_input(&self) {
        let active = self.state.borrow_mut().active.take();
        let Some(active) = active else {
            return;
        };

        if let ActiveInput::Buffered(node) = active {
            self.ctx.clock.stop_source(node);
        }
        let node = active.node();
        self.ctx.clock.disconnect(node);
        self.state.borrow_mut().edges.retain(|e| e.source != node);
    }

    fn populate(&self, devices: &[DeviceDescriptor]) {
        repopulate(&Rc::downgrade(&self.state), &Rc::downgrade(&self.selector), devices);
    }

    fn connect(&self, source: NodeId, sink: NodeId) {
        self.ctx.clock.connect(source, sink);
        self.state.borrow_mut().edges.push(Edge { source, sink });
    }

    // ───────────────────────────────────────────────────────────────
    // Readback
    // ───────────────────────────────────────────────────────────────

    /// Edges currently held by the binder.
    pub fn edges(&self) -> Vec<Edge> {
        self.state.borrow().edges.clone()
    }

    pub fn options(&self) -> Vec<InputOption> {
        self.state.borrow().options.clone()
    }

    pub fn selected(&self) -> Option<String> {
        self.state.borrow().selected.clone()
    }

    pub fn input_enabled(&self) -> bool {
        self.state.borrow().accepts_input
    }

    pub fn active_input(&self) -> Option<NodeId> {
        self.state.borrow().active.map(ActiveInput::node)
    }
}

impl Drop for AudioGraphBinder {
    fn drop(&mut self) {
        self.detach_unit();
    }
}

/// Refill the selector unless the current unit takes no input.
///
/// Keeps the current selection when it is still listed, otherwise falls
/// back to the first entry.
fn repopulate(
    state: &Weak<RefCell<BinderState>>,
    selector: &Weak<dyn InputSelector>,
    devices: &[DeviceDescriptor],
) {
    let (Some(state), Some(selector)) = (state.upgrade(), selector.upgrade()) else {
        return;
    };
    let mut state = state.borrow_mut();
    if !state.accepts_input {
        return;
    }

    let options = input_options(devices);
    let keep = state
        .selected
        .as_ref()
        .is_some_and(|sel| options.iter().any(|o| &o.value == sel));
    if !keep {
        state.selected = options.first().map(|o| o.value.clone());
    }
    debug!("input selector repopulated with {} entries", options.len());
    selector.set_options(&options);
    state.options = options;
}
