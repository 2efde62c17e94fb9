// src/controller.rs
//
// Session controller.
//
// Drives one editor session through compile -> instantiate -> connect ->
// run -> stop. It owns the running unit and everything hung off it (param
// bridge, MIDI bridge, graph edges, render loop) and tears that set down as
// a whole before the next unit is wired.
//
// All methods run on the single event-loop thread. Two rules replace
// locking:
//
// - Only one compile or start is in flight at a time; a second request is
//   rejected with `SessionError::Busy`.
// - `stop()` bumps an epoch. Work that resumes after an await checks the
//   epoch it started under and throws its result away if it changed.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use base64::{Engine as _, engine::general_purpose};
use log::{debug, error, info, warn};

use crate::audio_graph::AudioGraphBinder;
use crate::bridge::ParamBridge;
use crate::compile::Generator;
use crate::context::Context;
use crate::error::SessionError;
use crate::host::{ClockState, ParamLayout, ParamView, RuntimeUnit, SessionView};
use crate::metadata::{UiItem, has_controls};
use crate::midi::MidiBridge;
use crate::state::{RunOutcome, SessionState, TabState};
use crate::visualization::TabManager;

/// Share link opening `source` in the online IDE.
pub fn ide_link(ide_url: &str, source: &str) -> String {
    let inline = general_purpose::URL_SAFE.encode(source).replace('=', "%3D");
    format!("{ide_url}?inline={inline}")
}

/// Tab shown when a unit starts.
pub fn initial_tab(ui: &[UiItem]) -> TabState {
    if has_controls(ui) {
        TabState::Controls
    } else {
        TabState::Spectrum
    }
}

/// A successful compile, kept so `start()` can re-instantiate it.
struct Compiled {
    generator: Generator,
    source: String,
}

/// The running unit and the handlers registered for it.
struct LiveUnit {
    unit: Rc<dyn RuntimeUnit>,
    params: ParamBridge,
    midi: Option<MidiBridge>,
}

#[derive(Default)]
struct SessionInner {
    state: SessionState,
    compiled: Option<Rc<Compiled>>,
    generation: u64,
    live: Option<LiveUnit>,
    sidebar_open: bool,
}

/// Clears the in-flight flag when the operation holding it returns.
struct InFlight<'a>(&'a Cell<bool>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct SessionController {
    ctx: Rc<Context>,
    view: SessionView,
    binder: AudioGraphBinder,
    tabs: TabManager,
    inner: RefCell<SessionInner>,
    in_flight: Cell<bool>,
    epoch: Cell<u64>,
}

impl SessionController {
    pub fn new(ctx: Rc<Context>, view: SessionView) -> Self {
        let binder = AudioGraphBinder::new(Rc::clone(&ctx), Rc::clone(&view.inputs));
        let tabs = TabManager::new(Rc::clone(&ctx), &view);

        view.controls.set_run_enabled(true);
        view.controls.set_stop_enabled(false);
        view.controls.set_tabs_enabled(false);
        view.controls.set_active_tab(TabState::None);

        Self {
            ctx,
            view,
            binder,
            tabs,
            inner: RefCell::new(SessionInner::default()),
            in_flight: Cell::new(false),
            epoch: Cell::new(0),
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Lifecycle
    // ───────────────────────────────────────────────────────────────

    /// Compile `source` and replace the running unit with the result.
    ///
    /// A compile error is shown in the editor and leaves the session as it
    /// was, including any unit already running.
    pub async fn compile_and_run(&self, source: &str) -> Result<RunOutcome, SessionError> {
        let _in_flight = self.begin()?;
        let epoch = self.epoch.get();
        self.inner.borrow_mut().state = SessionState::Compiling;

        self.resume_clock().await;
        if self.is_stale(epoch) {
            return Ok(self.discard());
        }

        let config = &self.ctx.config;
        let compiled = Generator::compile(
            self.ctx.compiler.as_ref(),
            &config.unit_name,
            source,
            &config.compile_flags,
        )
        .await;

        let generator = match compiled {
            Ok(generator) => generator,
            Err(e) => {
                warn!("compile failed: {e}");
                self.view.editor.show_diagnostic(&e.diagnostic());
                self.settle();
                return Err(e.into());
            }
        };
        if self.is_stale(epoch) {
            return Ok(self.discard());
        }
        self.view.editor.clear_diagnostics();

        let compiled = Rc::new(Compiled {
            generator,
            source: source.to_string(),
        });
        self.launch(compiled, epoch, true).await
    }

    /// Compile and run the editor's current text.
    pub async fn run(&self) -> Result<RunOutcome, SessionError> {
        let source = self.view.editor.text();
        self.compile_and_run(&source).await
    }

    /// Start a new unit from the last successful compile.
    pub async fn start(&self) -> Result<RunOutcome, SessionError> {
        let _in_flight = self.begin()?;
        let compiled = {
            let inner = self.inner.borrow();
            if inner.live.is_some() {
                return Ok(RunOutcome::Running {
                    generation: inner.generation,
                });
            }
            inner.compiled.clone().ok_or(SessionError::NotCompiled)?
        };

        let epoch = self.epoch.get();
        self.inner.borrow_mut().state = SessionState::Compiling;
        self.resume_clock().await;
        if self.is_stale(epoch) {
            return Ok(self.discard());
        }
        self.launch(compiled, epoch, false).await
    }

    /// Stop a running unit, start a compiled one, or compile the editor
    /// text when nothing has been compiled yet.
    pub async fn toggle(&self) -> Result<SessionState, SessionError> {
        match self.state() {
            SessionState::Running => self.stop(),
            SessionState::Ready => {
                self.start().await?;
            }
            SessionState::Idle => {
                self.run().await?;
            }
            SessionState::Compiling => return Err(SessionError::Busy),
        }
        Ok(self.state())
    }

    /// Tear down the running unit and its visual resources.
    ///
    /// Does nothing when no unit is running, except that a compile still in
    /// flight will discard its result.
    pub fn stop(&self) {
        self.epoch.set(self.epoch.get() + 1);

        if !self.teardown() {
            debug!("stop: no unit running");
            if !self.in_flight.get() {
                self.settle();
            }
            return;
        }
        self.tabs.shutdown();
        self.view.controls.set_stop_enabled(false);
        self.view.controls.set_tabs_enabled(false);
        self.view.inputs.set_enabled(false);

        if !self.in_flight.get() {
            self.settle();
        }
        info!("session stopped");
    }

    async fn launch(
        &self,
        compiled: Rc<Compiled>,
        epoch: u64,
        fresh: bool,
    ) -> Result<RunOutcome, SessionError> {
        let unit = match compiled.generator.instantiate(self.ctx.clock.as_ref()).await {
            Ok(unit) => unit,
            Err(e) => {
                error!("instantiation failed: {e}");
                self.settle();
                return Err(e.into());
            }
        };
        if self.is_stale(epoch) {
            unit.destroy();
            return Ok(self.discard());
        }

        // The previous unit is fully gone before the new one is connected.
        self.teardown();

        let generation = {
            let mut inner = self.inner.borrow_mut();
            if fresh {
                inner.generation += 1;
            }
            inner.compiled = Some(Rc::clone(&compiled));
            inner.generation
        };

        self.binder.attach_unit(unit.node(), unit.num_inputs());
        let analyser = self.binder.attach_analyser();

        let ui = unit.ui();
        let param_view = self.view.params.render(&ui);
        self.apply_layout(param_view.as_ref());
        let params = ParamBridge::bind(&unit, param_view);

        {
            let mut inner = self.inner.borrow_mut();
            inner.live = Some(LiveUnit {
                unit: Rc::clone(&unit),
                params,
                midi: None,
            });
            inner.state = SessionState::Running;
        }

        self.tabs.on_compiled(generation, &compiled.source, analyser);
        self.view.controls.set_stop_enabled(true);
        self.view.controls.set_tabs_enabled(true);
        self.open_sidebar_once();
        self.tabs.open(initial_tab(&ui));
        info!(
            "unit {} running ({:?}, generation {generation})",
            unit.node(),
            compiled.generator.kind()
        );

        self.binder.bind_inputs().await;
        if self.is_stale(epoch) {
            return Ok(self.discard());
        }

        unit.start_sensors().await;
        if self.is_stale(epoch) {
            return Ok(self.discard());
        }

        if compiled.generator.metadata().midi_enabled {
            let midi = MidiBridge::attach(&self.ctx.midi, Rc::downgrade(&unit)).await;
            if self.is_stale(epoch) {
                return Ok(self.discard());
            }
            match midi {
                Ok(bridge) => {
                    if let Some(live) = self.inner.borrow_mut().live.as_mut() {
                        live.midi = Some(bridge);
                    }
                }
                Err(e) => warn!("MIDI unavailable: {e}"),
            }
        }

        Ok(RunOutcome::Running { generation })
    }

    /// Release the live unit, last-registered first. Returns whether there
    /// was one.
    fn teardown(&self) -> bool {
        let live = self.inner.borrow_mut().live.take();
        let Some(LiveUnit { unit, params, midi }) = live else {
            return false;
        };

        if let Some(midi) = midi {
            midi.detach();
        }
        drop(params);
        self.binder.detach_unit();
        unit.stop_sensors();
        unit.destroy();
        debug!("unit {} destroyed", unit.node());
        true
    }

    fn begin(&self) -> Result<InFlight<'_>, SessionError> {
        if self.in_flight.replace(true) {
            debug!("request rejected, session busy");
            return Err(SessionError::Busy);
        }
        Ok(InFlight(&self.in_flight))
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.epoch.get() != epoch
    }

    fn discard(&self) -> RunOutcome {
        info!("session stopped while starting, result discarded");
        self.settle();
        RunOutcome::Discarded
    }

    /// Return to the stable state matching what the session holds.
    fn settle(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.state = if inner.live.is_some() {
            SessionState::Running
        } else if inner.compiled.is_some() {
            SessionState::Ready
        } else {
            SessionState::Idle
        };
    }

    async fn resume_clock(&self) {
        if self.ctx.clock.state() == ClockState::Suspended {
            debug!("resuming audio clock");
            self.ctx.clock.resume().await;
        }
    }

    fn apply_layout(&self, params: &dyn ParamView) {
        let layout = &self.ctx.config.layout;
        self.view.controls.apply_layout(ParamLayout {
            editor_height: layout.min_editor_height.max(params.min_height()),
            controls_width: params.min_width() * layout.ui_scale,
            controls_height: params.min_height() * layout.ui_scale,
        });
    }

    fn open_sidebar_once(&self) {
        let mut inner = self.inner.borrow_mut();
        if !inner.sidebar_open {
            inner.sidebar_open = true;
            drop(inner);
            self.view.controls.open_sidebar(self.ctx.config.layout.sidebar_sizes);
        }
    }

    // ───────────────────────────────────────────────────────────────
    // User interaction
    // ───────────────────────────────────────────────────────────────

    /// Switch the sidebar surface. Ignored unless a unit is running.
    pub fn select_tab(&self, tab: TabState) {
        if !self.state().is_running() {
            debug!("tab {tab:?} ignored, nothing running");
            return;
        }
        self.tabs.open(tab);
    }

    pub async fn select_input(&self, value: &str) {
        self.binder.select_input(value).await;
    }

    /// Show the sub-diagram behind a clicked diagram node.
    pub fn follow_diagram_link(&self, target: &str) -> bool {
        self.tabs.follow_link(target)
    }

    /// The sidebar or window was resized.
    pub fn on_layout_changed(&self) {
        self.tabs.resize();
    }

    pub fn ide_link(&self) -> String {
        ide_link(&self.ctx.config.ide_url, &self.view.editor.text())
    }

    // ───────────────────────────────────────────────────────────────
    // Readback
    // ───────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.inner.borrow().state
    }

    /// Number of successful compiles so far.
    pub fn generation(&self) -> u64 {
        self.inner.borrow().generation
    }

    pub fn tab(&self) -> TabState {
        self.tabs.active()
    }

    pub fn unit(&self) -> Option<Rc<dyn RuntimeUnit>> {
        self.inner
            .borrow()
            .live
            .as_ref()
            .map(|live| Rc::clone(&live.unit))
    }

    pub fn midi_attached(&self) -> bool {
        self.inner
            .borrow()
            .live
            .as_ref()
            .is_some_and(|live| live.midi.is_some())
    }

    pub fn binder(&self) -> &AudioGraphBinder {
        &self.binder
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}
