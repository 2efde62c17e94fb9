// src/visualization.rs
//
// Visualization tab manager.
//
// Decides which sidebar surface is live and keeps its resources in step:
// the structural diagram is computed lazily, once per compile generation,
// on the next scheduler tick; the scope and spectrum are fed by a
// per-animation-frame loop that exists only while one of them is shown.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;

use crate::context::Context;
use crate::host::{ControlBar, DiagramView, FrameId, FrameScheduler, NodeId, Plot, SessionView};
use crate::state::TabState;

static DIAGRAM_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a\b[^>]*?\s(?:xlink:)?href="([^"]+)""#).expect("valid diagram link regex")
});

/// Link targets in diagram markup, in document order.
pub fn diagram_links(markup: &str) -> Vec<String> {
    DIAGRAM_LINK
        .captures_iter(markup)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn show_markup(view: &dyn DiagramView, markup: &str) {
    view.show(markup, &diagram_links(markup));
}

// ═══════════════════════════════════════════════════════════════════
// Render loop
// ═══════════════════════════════════════════════════════════════════

struct LoopState {
    active: Cell<bool>,
    pending: Cell<Option<FrameId>>,
}

/// Self-rescheduling animation-frame loop.
///
/// Cancelling (or dropping) the loop cancels the pending frame, and a frame
/// that still fires afterwards does nothing.
pub struct RenderLoop {
    scheduler: Rc<dyn FrameScheduler>,
    state: Rc<LoopState>,
}

impl RenderLoop {
    pub fn start(scheduler: Rc<dyn FrameScheduler>, frame: Rc<dyn Fn()>) -> Self {
        let state = Rc::new(LoopState {
            active: Cell::new(true),
            pending: Cell::new(None),
        });
        schedule_frame(&scheduler, &state, frame);
        Self { scheduler, state }
    }

    pub fn is_active(&self) -> bool {
        self.state.active.get()
    }

    pub fn cancel(&self) {
        self.state.active.set(false);
        if let Some(id) = self.state.pending.take() {
            self.scheduler.cancel_frame(id);
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn schedule_frame(scheduler: &Rc<dyn FrameScheduler>, state: &Rc<LoopState>, frame: Rc<dyn Fn()>) {
    let weak = Rc::downgrade(state);
    let next = Rc::clone(scheduler);
    let id = scheduler.request_frame(Box::new(move || {
        let Some(state) = weak.upgrade() else {
            return;
        };
        state.pending.set(None);
        if !state.active.get() {
            return;
        }
        frame();
        schedule_frame(&next, &state, frame);
    }));
    state.pending.set(Some(id));
}

// ═══════════════════════════════════════════════════════════════════
// Tab manager
// ═══════════════════════════════════════════════════════════════════

#[derive(Default)]
struct TabInner {
    active: TabState,
    /// Generation of the unit currently shown.
    generation: u64,
    /// Generation the displayed diagram was computed for.
    diagram_generation: Option<u64>,
    /// Generation a deferred diagram computation is queued for.
    diagram_pending: Option<u64>,
    source: String,
    analyser: Option<NodeId>,
    render_loop: Option<RenderLoop>,
}

pub struct TabManager {
    ctx: Rc<Context>,
    controls: Rc<dyn ControlBar>,
    diagram: Rc<dyn DiagramView>,
    scope: Rc<dyn Plot>,
    spectrum: Rc<dyn Plot>,
    inner: Rc<RefCell<TabInner>>,
}

impl TabManager {
    pub fn new(ctx: Rc<Context>, view: &SessionView) -> Self {
        Self {
            ctx,
            controls: Rc::clone(&view.controls),
            diagram: Rc::clone(&view.diagram),
            scope: Rc::clone(&view.scope),
            spectrum: Rc::clone(&view.spectrum),
            inner: Rc::new(RefCell::new(TabInner::default())),
        }
    }

    /// Point the surfaces at a newly started unit.
    ///
    /// Clears both plots and invalidates the cached diagram.
    pub fn on_compiled(&self, generation: u64, source: &str, analyser: Option<NodeId>) {
        self.stop_loop();
        {
            let mut inner = self.inner.borrow_mut();
            inner.generation = generation;
            inner.source = source.to_string();
            inner.analyser = analyser;
            inner.diagram_pending = None;
        }
        self.scope.clear();
        self.spectrum.clear();
    }

    /// Make `tab` the active surface.
    pub fn open(&self, tab: TabState) {
        self.stop_loop();
        self.inner.borrow_mut().active = tab;
        self.controls.set_active_tab(tab);
        debug!("tab {tab:?} opened");

        match tab {
            TabState::Diagram => self.refresh_diagram(),
            TabState::Scope => {
                self.scope.on_resize();
                self.start_loop(tab);
            }
            TabState::Spectrum => {
                self.spectrum.on_resize();
                self.start_loop(tab);
            }
            TabState::Controls | TabState::None => {}
        }
    }

    /// Release the analysis resources and go blank.
    pub fn shutdown(&self) {
        self.open(TabState::None);
        self.inner.borrow_mut().analyser = None;
    }

    /// Re-run the plots' layout pass after the sidebar was resized.
    pub fn resize(&self) {
        self.scope.on_resize();
        self.spectrum.on_resize();
    }

    /// Replace the displayed diagram with the sub-diagram `target`.
    pub fn follow_link(&self, target: &str) -> bool {
        let path = self.ctx.config.diagram_path(target);
        match self.ctx.compiler.read_file(&path) {
            Some(markup) => {
                show_markup(self.diagram.as_ref(), &markup);
                true
            }
            None => {
                warn!("diagram '{path}' not found");
                false
            }
        }
    }

    pub fn active(&self) -> TabState {
        self.inner.borrow().active
    }

    pub fn is_animating(&self) -> bool {
        self.inner
            .borrow()
            .render_loop
            .as_ref()
            .is_some_and(RenderLoop::is_active)
    }

    pub fn diagram_generation(&self) -> Option<u64> {
        self.inner.borrow().diagram_generation
    }

    fn stop_loop(&self) {
        // Dropped outside the borrow; dropping cancels the pending frame.
        let render_loop = self.inner.borrow_mut().render_loop.take();
        drop(render_loop);
    }

    fn start_loop(&self, tab: TabState) {
        let Some(analyser) = self.inner.borrow().analyser else {
            return;
        };

        let frame: Rc<dyn Fn()> = match tab {
            TabState::Scope => {
                let plot = Rc::clone(&self.scope);
                let style = self.ctx.config.scope.clone();
                Rc::new(move || plot.render_scope(analyser, &style))
            }
            TabState::Spectrum => {
                let plot = Rc::clone(&self.spectrum);
                Rc::new(move || plot.render_spectrum(analyser))
            }
            _ => return,
        };

        let render_loop = RenderLoop::start(Rc::clone(&self.ctx.scheduler), frame);
        self.inner.borrow_mut().render_loop = Some(render_loop);
    }

    fn refresh_diagram(&self) {
        let generation = {
            let mut inner = self.inner.borrow_mut();
            if inner.diagram_generation == Some(inner.generation) {
                debug!("diagram for generation {} is cached", inner.generation);
                return;
            }
            if inner.diagram_pending == Some(inner.generation) {
                return;
            }
            inner.diagram_pending = Some(inner.generation);
            inner.generation
        };

        let placeholder = format!("<p><center>{}</center></p>", self.ctx.config.diagram_placeholder);
        self.diagram.show(&placeholder, &[]);

        let weak = Rc::downgrade(&self.inner);
        let ctx = Rc::clone(&self.ctx);
        let view = Rc::clone(&self.diagram);
        self.ctx.scheduler.defer(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let source = {
                let inner = inner.borrow();
                if inner.generation != generation || inner.diagram_pending != Some(generation) {
                    return;
                }
                inner.source.clone()
            };

            let config = &ctx.config;
            let rendered = ctx
                .compiler
                .render_diagram(&config.unit_name, &source, &config.diagram_args);

            let mut inner = inner.borrow_mut();
            inner.diagram_pending = None;
            match rendered {
                Ok(markup) => {
                    inner.diagram_generation = Some(generation);
                    drop(inner);
                    show_markup(view.as_ref(), &markup);
                }
                Err(e) => {
                    drop(inner);
                    warn!("diagram generation failed: {e}");
                    view.show(&format!("<p>{}</p>", e.message), &[]);
                }
            }
        }));
    }
}

impl Drop for TabManager {
    fn drop(&mut self) {
        self.stop_loop();
    }
}
