// src/state/mod.rs
//
// Declarative session state.
//
// These are the small state machines the controller and tab manager drive.
// They hold no handles, only where the session is and where it may go next.

mod session;
mod tab;

pub use session::*;
pub use tab::*;
