//! Parameter sync bridge between the control UI and a running unit.
//!
//! This module provides the two one-way channels that keep on-screen
//! controls and the unit's parameters in step.
//!
//! # Architecture
//!
//! - **UI → unit**: the [`ParamView`]'s change hook calls
//!   [`RuntimeUnit::set_param`]. The view updates its own widget directly, so
//!   a UI edit never round-trips through the unit.
//! - **Unit → UI**: the unit's output handler calls
//!   [`ParamView::apply_dsp_change`] for automation and bargraphs.
//!
//! Both closures hold weak references only. A [`ParamBridge`] is created once
//! per unit instantiation and must be dropped before that unit is destroyed;
//! dropping it clears both handlers.
//!
//! # Usage
//!
//! ```ignore
//! let view = factory.render(&unit.ui());
//! let bridge = ParamBridge::bind(&unit, view);
//! // ...
//! drop(bridge);
//! unit.destroy();
//! ```

use std::rc::{Rc, Weak};

use crate::host::{ParamView, RuntimeUnit};

/// Live handler pair for one unit.
pub struct ParamBridge {
    unit: Weak<dyn RuntimeUnit>,
    view: Rc<dyn ParamView>,
}

impl ParamBridge {
    /// Connect `view` and `unit` in both directions.
    pub fn bind(unit: &Rc<dyn RuntimeUnit>, view: Rc<dyn ParamView>) -> Self {
        let weak_unit = Rc::downgrade(unit);
        view.set_ui_change_handler(Some(Box::new(move |path: &str, value: f32| {
            if let Some(unit) = weak_unit.upgrade() {
                unit.set_param(path, value);
            }
        })));

        let weak_view = Rc::downgrade(&view);
        unit.set_output_param_handler(Some(Box::new(move |path: &str, value: f32| {
            if let Some(view) = weak_view.upgrade() {
                view.apply_dsp_change(path, value);
            }
        })));

        Self {
            unit: Rc::downgrade(unit),
            view,
        }
    }

}

impl Drop for ParamBridge {
    fn drop(&mut self) {
        self.view.set_ui_change_handler(None);
        if let Some(unit) = self.unit.upgrade() {
            unit.set_output_param_handler(None);
        }
    }
}
