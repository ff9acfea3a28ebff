//! Command-dispatch state machine (spec.md §4.4).
//!
//! Each handler returns a ternary status: a reply to send back (`Ok`, with
//! a payload, or `Recoverable`, which the session encodes as `ret_code =
//! -1` with an empty payload and keeps the session alive), or a
//! `FatalError` that aborts the session with no response at all. `Control`
//! tells the session controller whether this command ends the session
//! (`Die`, `Sleep`) or whether it should keep reading commands.

use std::ffi::OsStr;
use std::fs::File;
use std::io::ErrorKind;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::error::{ExecError, FatalError, IoError};
use crate::exec::SubprocessRunner;
use crate::io;
use crate::logger::Logger;
use crate::protocol::{self, CMD_DIE, CMD_EXEC_COMMAND, CMD_GET_FILE, CMD_SLEEP, CMD_UNLOAD_LOGS};

/// What to send back to the controller for this command, if anything.
#[derive(Debug)]
pub enum Reply {
    Success(Vec<u8>),
    Recoverable,
}

/// What the session controller should do once this command's reply (if
/// any) has been sent.
#[derive(Debug)]
pub enum Control {
    Continue,
    EndWithSleep(u32),
    EndWithDie,
}

/// Dispatches one command frame. `Err` aborts the session with no response.
pub fn dispatch(
    code: u8,
    payload: &[u8],
    logger: &Logger,
    runner: &dyn SubprocessRunner,
) -> Result<(Reply, Control), FatalError> {
    match code {
        CMD_UNLOAD_LOGS => handle_unload_logs(logger).map(|r| (r, Control::Continue)),
        CMD_GET_FILE => handle_get_file(payload).map(|r| (r, Control::Continue)),
        CMD_EXEC_COMMAND => handle_exec(payload, runner).map(|r| (r, Control::Continue)),
        CMD_DIE => Ok((Reply::Success(Vec::new()), Control::EndWithDie)),
        CMD_SLEEP => {
            let secs = handle_sleep(payload)?;
            Ok((Reply::Success(Vec::new()), Control::EndWithSleep(secs)))
        }
        other => Err(FatalError::UnknownCommand(other)),
    }
}

fn handle_unload_logs(logger: &Logger) -> Result<Reply, FatalError> {
    logger.read_all().map(Reply::Success).map_err(FatalError::Io)
}

fn handle_get_file(payload: &[u8]) -> Result<Reply, FatalError> {
    let path = Path::new(OsStr::from_bytes(payload));
    match read_file_from_path(path) {
        Ok(bytes) => Ok(Reply::Success(bytes)),
        Err(IoError::Inaccessible(_)) => Ok(Reply::Recoverable),
        Err(other) => Err(FatalError::Io(other)),
    }
}

fn read_file_from_path(path: &Path) -> Result<Vec<u8>, IoError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
            return Err(IoError::Inaccessible(e));
        }
        Err(e) => return Err(IoError::Failed(e)),
    };
    read_file(file)
}

fn read_file(mut file: File) -> Result<Vec<u8>, IoError> {
    let meta = file.metadata().map_err(IoError::Failed)?;
    if !meta.is_file() {
        return Err(IoError::Inaccessible(std::io::Error::new(
            ErrorKind::Other,
            "not a regular file",
        )));
    }
    let size = meta.len();
    if size == 0 {
        return Ok(Vec::new());
    }
    let mut buf = vec![0u8; size as usize];
    io::read_all(&mut file, &mut buf)?;
    Ok(buf)
}

struct ExecRequest {
    timeout_ms: u32,
    path: PathBuf,
    argv: Vec<String>,
}

/// Parses the exec-command payload: `timeout_ms`, `path_len`, `path`,
/// `args_len`, `args` (NUL-separated). An empty args region means "no
/// arguments beyond the executable name"; the spec's own reference
/// implementation passes the raw NUL-separated buffer straight through as
/// if it were already a valid argv, which only works by accident — this
/// handler actually splits it into discrete strings and synthesizes a
/// single-element argv when the payload omits one.
fn parse_exec_payload(payload: &[u8]) -> Result<ExecRequest, FatalError> {
    const HEADER_MIN: usize = 4 + 4 + 4;
    if payload.len() < HEADER_MIN {
        return Err(FatalError::MalformedPayload(
            "exec payload shorter than the fixed header".into(),
        ));
    }

    let timeout_ms = u32::from_be_bytes(payload[0..4].try_into().unwrap());
    let path_len = u32::from_be_bytes(payload[4..8].try_into().unwrap()) as usize;

    let mut cursor = 8;
    if path_len == 0 || cursor + path_len > payload.len() {
        return Err(FatalError::MalformedPayload("invalid path_len".into()));
    }
    let path_bytes = &payload[cursor..cursor + path_len];
    cursor += path_len;

    if cursor + 4 > payload.len() {
        return Err(FatalError::MalformedPayload("truncated args_len".into()));
    }
    let args_len = u32::from_be_bytes(payload[cursor..cursor + 4].try_into().unwrap()) as usize;
    cursor += 4;

    if cursor + args_len > payload.len() {
        return Err(FatalError::MalformedPayload("invalid args_len".into()));
    }
    let args_bytes = &payload[cursor..cursor + args_len];

    let path = PathBuf::from(OsStr::from_bytes(path_bytes));

    let mut parts: Vec<&[u8]> = args_bytes.split(|&b| b == 0).collect();
    if parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    let mut argv: Vec<String> = parts
        .into_iter()
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect();
    if argv.is_empty() {
        argv.push(path.to_string_lossy().into_owned());
    }

    Ok(ExecRequest {
        timeout_ms,
        path,
        argv,
    })
}

fn handle_exec(payload: &[u8], runner: &dyn SubprocessRunner) -> Result<Reply, FatalError> {
    let request = parse_exec_payload(payload)?;
    match runner.run(&request.path, &request.argv, request.timeout_ms) {
        Ok(outcome) => {
            let encoded = protocol::encode_exec_response(outcome.exit_code, &outcome.stdout, &outcome.stderr)
                .map_err(|_| FatalError::MalformedPayload("captured output exceeds u32::MAX bytes".into()))?;
            Ok(Reply::Success(encoded))
        }
        Err(ExecError::Inaccessible { .. }) => Ok(Reply::Recoverable),
        Err(other) => Err(FatalError::Exec(other)),
    }
}

fn handle_sleep(payload: &[u8]) -> Result<u32, FatalError> {
    let bytes: [u8; 4] = payload
        .try_into()
        .map_err(|_| FatalError::MalformedPayload(format!("sleep payload must be 4 bytes, got {}", payload.len())))?;
    Ok(u32::from_be_bytes(bytes))
}
