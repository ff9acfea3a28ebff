//! Error taxonomies for outpost.
//!
//! Three taxonomies per spec.md §7: low-level I/O, subprocess execution, and
//! command dispatch (`FatalError`, which aborts a session — recoverable
//! command failures are represented as data, not as an error type, since the
//! session continues either way). A fourth, `ConfigError`, covers the
//! ambient config-load path and can only fail before a session ever starts.

use std::path::PathBuf;

use thiserror::Error;

/// Low-level byte I/O outcome (spec.md §4.1).
#[derive(Debug, Error)]
pub enum IoError {
    /// The first read at a boundary returned zero bytes: a clean close, not
    /// an error. Only meaningful at the start of a frame.
    #[error("end of stream")]
    Eof,
    /// A path is absent or denied to us, as opposed to some other failure.
    #[error("inaccessible: {0}")]
    Inaccessible(std::io::Error),
    /// Any other syscall failure, including a short read after partial
    /// progress (which is not a clean EOF).
    #[error("I/O failed: {0}")]
    Failed(std::io::Error),
}

/// Subprocess executor outcome (spec.md §4.2).
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("executable inaccessible: {path}")]
    Inaccessible { path: PathBuf },
    #[error("subprocess timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u32 },
    #[error("subprocess execution failed: {0}")]
    Failed(std::io::Error),
}

/// Wire-framing errors (spec.md §4.3). The clean end-of-session case (EOF at
/// the start of a command frame) is not an error and is represented
/// separately by `protocol::ReadCommandOutcome`.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed mid-frame")]
    ShortRead,
    #[error(transparent)]
    Io(IoError),
    #[error("response payload exceeds u32::MAX bytes")]
    PayloadTooLarge,
}

/// Aborts the session without sending a response (spec.md §4.4, "Fatal").
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("unknown command code: {0}")]
    UnknownCommand(u8),
    #[error("malformed command payload: {0}")]
    MalformedPayload(String),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Io(IoError),
}

/// Failures that can only occur before a session starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a default config directory")]
    NoConfigDir,
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("tool name must be exactly 4 bytes, got {0}")]
    ToolNameLength(usize),
}
