//! Byte I/O primitives (spec.md §4.1).
//!
//! Three operations over anything implementing `Read`/`Write`: `read_all`
//! (read exactly N bytes or fail, distinguishing a clean EOF at offset zero
//! from a short read after partial progress), `write_all` (write exactly N
//! bytes or fail), and `read_until_eof` (drain a stream to completion,
//! growing a buffer as it goes).

use std::io::{ErrorKind, Read, Write};

use crate::error::IoError;

const READ_CHUNK_SIZE: usize = 4096;

/// Fills `buf` completely. A zero-byte read before any progress is `Eof`; a
/// zero-byte read after partial progress is `Failed` (the peer hung up
/// mid-frame).
pub fn read_all<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<(), IoError> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) if total == 0 => return Err(IoError::Eof),
            Ok(0) => {
                return Err(IoError::Failed(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "short read",
                )));
            }
            Ok(n) => total += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(IoError::Failed(e)),
        }
    }
    Ok(())
}

/// Writes all of `buf`. There is no EOF concept on the write side; any
/// zero-byte write is treated as a failure.
pub fn write_all<W: Write + ?Sized>(writer: &mut W, buf: &[u8]) -> Result<(), IoError> {
    let mut total = 0;
    while total < buf.len() {
        match writer.write(&buf[total..]) {
            Ok(0) => {
                return Err(IoError::Failed(std::io::Error::new(
                    ErrorKind::WriteZero,
                    "write returned zero",
                )));
            }
            Ok(n) => total += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(IoError::Failed(e)),
        }
    }
    Ok(())
}

/// Reads until the stream reports EOF, growing the result buffer in
/// `READ_CHUNK_SIZE` increments. Returns an empty `Vec` if the stream was
/// already at EOF.
pub fn read_until_eof<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>, IoError> {
    let mut out = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => return Ok(out),
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(IoError::Failed(e)),
        }
    }
}
