// src/state/session.rs
//
// Session lifecycle state.

use std::fmt;

/// Where a session is in its compile/run cycle.
///
/// `Compiling` is transient: a failed compile returns to the stable state
/// held before it, a successful one lands in `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing compiled yet.
    #[default]
    Idle,
    /// A compile (or start) is in flight.
    Compiling,
    /// Compiled, no unit alive.
    Ready,
    /// A unit is alive and connected to the destination.
    Running,
}

impl SessionState {
    pub fn is_running(self) -> bool {
        matches!(self, SessionState::Running)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Compiling => write!(f, "compiling"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Running => write!(f, "running"),
        }
    }
}

/// Result of a compile-and-run or start request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A new unit is running at this generation.
    Running { generation: u64 },
    /// The session was stopped while the request was in flight; its result
    /// was thrown away.
    Discarded,
}
