//! Wire framing (spec.md §4.3, §3 Data Model).
//!
//! All multi-byte integers are big-endian ("network byte order"). Frames
//! are: a command frame (`code: u8`, `payload_len: u32`, `payload`), a
//! response frame (`ret_code: i32`, `payload_len: u32`, `payload`), and a
//! once-per-session hello frame (`version: u8`, 4 raw tool-name bytes).

use std::io::{Read, Write};

use crate::error::{IoError, ProtocolError};
use crate::io;

pub const PROTOCOL_VERSION: u8 = 1;

pub const CMD_UNLOAD_LOGS: u8 = 1;
pub const CMD_GET_FILE: u8 = 2;
pub const CMD_EXEC_COMMAND: u8 = 3;
pub const CMD_DIE: u8 = 254;
pub const CMD_SLEEP: u8 = 255;

#[derive(Debug, Clone)]
pub struct CommandFrame {
    pub code: u8,
    pub payload: Vec<u8>,
}

/// Distinguishes a real command from the clean end-of-session signal (the
/// controller closed the connection instead of sending another command).
#[derive(Debug)]
pub enum ReadCommandOutcome {
    Command(CommandFrame),
    PeerClosed,
}

/// Reads one command frame, or detects that the peer closed the connection
/// before sending a command code (a clean end of session, not an error).
pub fn read_command<R: Read + ?Sized>(reader: &mut R) -> Result<ReadCommandOutcome, ProtocolError> {
    let mut code_buf = [0u8; 1];
    match io::read_all(reader, &mut code_buf) {
        Ok(()) => {}
        Err(IoError::Eof) => return Ok(ReadCommandOutcome::PeerClosed),
        Err(e) => return Err(ProtocolError::Io(e)),
    }

    let mut len_buf = [0u8; 4];
    io::read_all(reader, &mut len_buf).map_err(map_mid_frame_eof)?;
    let payload_len = u32::from_be_bytes(len_buf) as usize;

    let mut payload = vec![0u8; payload_len];
    if payload_len > 0 {
        io::read_all(reader, &mut payload).map_err(map_mid_frame_eof)?;
    }

    Ok(ReadCommandOutcome::Command(CommandFrame {
        code: code_buf[0],
        payload,
    }))
}

fn map_mid_frame_eof(err: IoError) -> ProtocolError {
    match err {
        IoError::Eof => ProtocolError::ShortRead,
        other => ProtocolError::Io(other),
    }
}

/// Writes a response frame: `ret_code`, `payload_len`, `payload`.
pub fn send_response<W: Write + ?Sized>(
    writer: &mut W,
    ret_code: i32,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    if payload.len() > u32::MAX as usize {
        return Err(ProtocolError::PayloadTooLarge);
    }
    let mut header = Vec::with_capacity(8);
    header.extend_from_slice(&ret_code.to_be_bytes());
    header.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    io::write_all(writer, &header).map_err(ProtocolError::Io)?;
    if !payload.is_empty() {
        io::write_all(writer, payload).map_err(ProtocolError::Io)?;
    }
    Ok(())
}

/// Writes the once-per-session hello frame announcing this tool's identity.
pub fn send_hello<W: Write + ?Sized>(writer: &mut W, tool_name: &[u8; 4]) -> Result<(), ProtocolError> {
    io::write_all(writer, &[PROTOCOL_VERSION]).map_err(ProtocolError::Io)?;
    io::write_all(writer, tool_name).map_err(ProtocolError::Io)?;
    Ok(())
}

/// Encodes an exec-command response payload: `exit_code`, `stdout_len`,
/// `stdout`, `stderr_len`, `stderr`. `exit_code` is written as signed
/// big-endian, preserving sign on the wire exactly as produced by the
/// executor (including the documented wraparound through unsigned decoding
/// on a C-side peer).
pub fn encode_exec_response(exit_code: i32, stdout: &[u8], stderr: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if stdout.len() > u32::MAX as usize || stderr.len() > u32::MAX as usize {
        return Err(ProtocolError::PayloadTooLarge);
    }
    let mut buf = Vec::with_capacity(12 + stdout.len() + stderr.len());
    buf.extend_from_slice(&exit_code.to_be_bytes());
    buf.extend_from_slice(&(stdout.len() as u32).to_be_bytes());
    buf.extend_from_slice(stdout);
    buf.extend_from_slice(&(stderr.len() as u32).to_be_bytes());
    buf.extend_from_slice(stderr);
    Ok(buf)
}
