//! Bounded subprocess executor (spec.md §4.2).
//!
//! Forks, redirects the child's stdout/stderr into pipes, execs, and polls
//! `waitpid(WNOHANG)` every `POLL_TICK` until the child exits or the
//! timeout elapses, killing it with `SIGKILL` on timeout. Unlike a
//! wait-then-drain executor, the pipes are drained non-blockingly on every
//! tick so a child that fills its pipe buffer before exiting can't deadlock
//! the parent (the REDESIGN FLAG closed in spec.md §5).
//!
//! A child that fails before exec calls `_exit(127)` directly rather than
//! unwinding through normal `std::process::exit`, to avoid re-running any
//! parent-side cleanup in the forked child.

use std::io::Read;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult};

use crate::error::ExecError;

const POLL_TICK: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Seam for testing command dispatch without actually forking. Production
/// code always uses `RealSubprocessRunner`; tests substitute
/// `MockSubprocessRunner`. Grounded in the teacher's
/// `CommandRunner`/`RealCommandRunner`/`MockCommandRunner` split.
pub trait SubprocessRunner: Send + Sync {
    fn run(&self, path: &Path, argv: &[String], timeout_ms: u32) -> Result<ExecOutcome, ExecError>;
}

pub struct RealSubprocessRunner;

impl SubprocessRunner for RealSubprocessRunner {
    fn run(&self, path: &Path, argv: &[String], timeout_ms: u32) -> Result<ExecOutcome, ExecError> {
        run(path, argv, timeout_ms)
    }
}

/// Confirms `path` is executable and a regular file before forking, so a
/// missing/unreadable/non-regular target is reported as `Inaccessible`
/// (recoverable) rather than surfacing as a generic fork/exec failure.
fn check_executable_access(path: &Path) -> Result<(), ExecError> {
    let accessible = unistd::access(path, unistd::AccessFlags::X_OK).is_ok();
    let is_regular_file = std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false);
    if !accessible || !is_regular_file {
        return Err(ExecError::Inaccessible {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn set_nonblocking(fd: &OwnedFd) -> Result<(), ExecError> {
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK)).map_err(|errno| {
        ExecError::Failed(std::io::Error::from_raw_os_error(errno as i32))
    })?;
    Ok(())
}

/// Runs `path` with `argv` (argv[0] is expected to be `path` by the
/// caller's convention), enforcing `timeout_ms`.
pub fn run(path: &Path, argv: &[String], timeout_ms: u32) -> Result<ExecOutcome, ExecError> {
    check_executable_access(path)?;

    let (stdout_read, stdout_write) =
        unistd::pipe().map_err(|e| ExecError::Failed(std::io::Error::from_raw_os_error(e as i32)))?;
    let (stderr_read, stderr_write) =
        unistd::pipe().map_err(|e| ExecError::Failed(std::io::Error::from_raw_os_error(e as i32)))?;

    set_nonblocking(&stdout_read)?;
    set_nonblocking(&stderr_read)?;

    // Safety: immediately followed by either exec or _exit in the child; no
    // other threads exist in this single-threaded process.
    match unsafe { unistd::fork() } {
        Ok(ForkResult::Child) => {
            drop(stdout_read);
            drop(stderr_read);
            exec_child(stdout_write, stderr_write, path, argv);
            unreachable!("exec_child never returns");
        }
        Ok(ForkResult::Parent { child }) => {
            drop(stdout_write);
            drop(stderr_write);
            run_parent(child, stdout_read, stderr_read, timeout_ms)
        }
        Err(e) => Err(ExecError::Failed(std::io::Error::from_raw_os_error(e as i32))),
    }
}

fn exec_child(stdout_write: OwnedFd, stderr_write: OwnedFd, path: &Path, argv: &[String]) -> ! {
    unsafe {
        if libc::dup2(stdout_write.as_raw_fd(), libc::STDOUT_FILENO) < 0 {
            libc::_exit(127);
        }
        if libc::dup2(stderr_write.as_raw_fd(), libc::STDERR_FILENO) < 0 {
            libc::_exit(127);
        }
    }
    drop(stdout_write);
    drop(stderr_write);

    let arg0 = argv.first().map(String::as_str).unwrap_or("");
    let mut command = std::process::Command::new(path);
    command.arg0(arg0);
    if argv.len() > 1 {
        command.args(&argv[1..]);
    }
    // `.exec()` replaces the process image on success and never returns.
    let _ = command.exec();
    unsafe { libc::_exit(127) }
}

fn run_parent(
    child: nix::unistd::Pid,
    stdout_read: OwnedFd,
    stderr_read: OwnedFd,
    timeout_ms: u32,
) -> Result<ExecOutcome, ExecError> {
    let mut stdout_file: std::fs::File = unsafe { std::fs::File::from_raw_fd(stdout_read.into_raw_fd()) };
    let mut stderr_file: std::fs::File = unsafe { std::fs::File::from_raw_fd(stderr_read.into_raw_fd()) };

    let deadline = Duration::from_millis(timeout_ms as u64);
    let start = Instant::now();
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    loop {
        match waitpid(child, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => {
                drain_available(&mut stdout_file, &mut stdout_buf);
                drain_available(&mut stderr_file, &mut stderr_buf);

                if start.elapsed() >= deadline {
                    let _ = kill(child, Signal::SIGKILL);
                    let _ = waitpid(child, None);
                    return Err(ExecError::Timeout { timeout_ms });
                }

                std::thread::sleep(POLL_TICK);
            }
            Ok(status) => {
                drain_to_eof(&mut stdout_file, &mut stdout_buf);
                drain_to_eof(&mut stderr_file, &mut stderr_buf);
                return Ok(ExecOutcome {
                    exit_code: exit_code_from_status(status),
                    stdout: stdout_buf,
                    stderr: stderr_buf,
                });
            }
            Err(e) => return Err(ExecError::Failed(std::io::Error::from_raw_os_error(e as i32))),
        }
    }
}

fn exit_code_from_status(status: WaitStatus) -> i32 {
    match status {
        WaitStatus::Exited(_, code) => code,
        _ => -1,
    }
}

/// Drains whatever is currently buffered in a non-blocking pipe without
/// waiting for more. Called every poll tick so output never backs up enough
/// to block the child.
fn drain_available(file: &mut std::fs::File, out: &mut Vec<u8>) {
    let mut chunk = [0u8; 4096];
    loop {
        match file.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => return,
        }
    }
}

/// Final drain after the child has been reaped: both write ends are closed
/// by now, so a blocking-style loop (which still must tolerate transient
/// `WouldBlock` since the fd is non-blocking) reaches EOF promptly.
fn drain_to_eof(file: &mut std::fs::File, out: &mut Vec<u8>) {
    let mut chunk = [0u8; 4096];
    loop {
        match file.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(1));
                continue;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => return,
        }
    }
}
