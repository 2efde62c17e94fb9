// src/state/tab.rs
//
// Visualization tab state.

/// The visual surface shown in the sidebar. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TabState {
    Controls,
    Diagram,
    Scope,
    Spectrum,
    #[default]
    None,
}
