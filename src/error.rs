// src/error.rs
//
// Error taxonomy for the session lifecycle.
//
// Only `CompileError` interrupts the primary success path. Device, MIDI and
// asset errors stay inside the component that hit them and are logged.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// `<unit name> : <line> : <message>` as emitted by the DSP compiler.
static LOCATED_MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+ : (\d+) : (.*)$").expect("valid diagnostic regex"));

/// The compiler rejected the source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", display_compile_error(.line, .message))]
pub struct CompileError {
    /// 1-based source line, when the compiler reported one.
    pub line: Option<u32>,
    pub message: String,
}

fn display_compile_error(line: &Option<u32>, message: &str) -> String {
    match line {
        Some(line) => format!("line {line}: {message}"),
        None => message.to_string(),
    }
}

impl CompileError {
    pub fn new(line: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    /// Build an error from a raw compiler message, extracting the line
    /// number when the message is located.
    pub fn from_compiler_message(raw: &str) -> Self {
        let raw = raw.trim();
        match LOCATED_MESSAGE.captures(raw) {
            Some(caps) => {
                let line = caps[1].parse::<u32>().ok().filter(|&l| l > 0);
                Self::new(line, &caps[2])
            }
            None => Self::new(None, raw),
        }
    }

    /// The editor-facing view of this error.
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            line: self.line,
            message: self.message.clone(),
        }
    }
}

/// Inline diagnostic handed to the editor.
///
/// `line` is `None` when the position could not be derived; the editor then
/// anchors the message at the start of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: Option<u32>,
    pub message: String,
}

/// A compiled artifact could not produce a runnable unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InstantiateError(pub String);

/// Audio input could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceAccessError {
    #[error("permission to use audio input was denied: {0}")]
    PermissionDenied(String),

    #[error("audio input unavailable: {0}")]
    Unavailable(String),
}

/// MIDI input is best-effort; these are only ever logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MidiAccessError {
    #[error("MIDI is not supported by this host")]
    Unsupported,

    #[error("MIDI access denied: {0}")]
    Denied(String),

    #[error("no MIDI input ports available")]
    NoInputs,
}

/// File-playback sample could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetLoadError {
    #[error("hosting script URL is unknown")]
    NoScriptUrl,

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("failed to decode audio: {0}")]
    Decode(String),
}

/// Errors returned by session operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Another compile or start is still running on this session.
    #[error("session is busy compiling")]
    Busy,

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("failed to instantiate DSP unit: {0}")]
    Instantiate(#[from] InstantiateError),

    /// `start()` called before anything was compiled.
    #[error("nothing has been compiled yet")]
    NotCompiled,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid session config: {0}")]
    Json(#[from] serde_json::Error),
}
