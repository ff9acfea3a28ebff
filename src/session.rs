//! Session controller (spec.md §4.5): one TCP connection, start to finish.
//!
//! Connecting → Hello → AwaitCommand → Dispatch → Respond → {AwaitCommand,
//! Ended}. A `FatalError` from dispatch, a protocol error, or the
//! controller closing the connection before the handshake completes all
//! end the session; only `DIE` and `SLEEP` end it "normally" and carry
//! instructions back to the runloop about what happens next.

use std::net::TcpStream;

use crate::commands::{self, Control};
use crate::config::Tool;
use crate::exec::SubprocessRunner;
use crate::logger::Logger;
use crate::protocol::{self, ReadCommandOutcome};

#[derive(Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Ok,
    Error,
}

#[derive(Debug)]
pub struct SessionOutcome {
    pub status: SessionStatus,
    pub sleep_secs: u32,
    pub should_die: bool,
}

impl SessionOutcome {
    fn error() -> Self {
        Self {
            status: SessionStatus::Error,
            sleep_secs: 0,
            should_die: false,
        }
    }

    fn clean_end(sleep_secs: u32, should_die: bool) -> Self {
        Self {
            status: SessionStatus::Ok,
            sleep_secs,
            should_die,
        }
    }
}

pub struct SessionController<'a> {
    tool: &'a Tool,
    logger: &'a Logger,
    runner: &'a dyn SubprocessRunner,
}

impl<'a> SessionController<'a> {
    pub fn new(tool: &'a Tool, logger: &'a Logger, runner: &'a dyn SubprocessRunner) -> Self {
        Self { tool, logger, runner }
    }

    /// Connects to the configured controller and runs one full session.
    /// A connection failure is reported the same way a mid-session protocol
    /// error would be: `SessionStatus::Error`, no sleep override, no die.
    pub fn connect_and_run(&self) -> SessionOutcome {
        match TcpStream::connect((self.tool.config.ip.as_str(), self.tool.config.port)) {
            Ok(stream) => self.run(stream),
            Err(e) => {
                tracing::warn!(error = %e, ip = %self.tool.config.ip, port = self.tool.config.port, "failed to connect to controller");
                SessionOutcome::error()
            }
        }
    }

    /// Runs one session over an already-connected stream. Exposed
    /// separately from `connect_and_run` so tests can drive it against a
    /// local `TcpListener` stub instead of a real controller.
    pub fn run(&self, mut stream: TcpStream) -> SessionOutcome {
        if let Err(e) = protocol::send_hello(&mut stream, &self.tool.name) {
            tracing::warn!(error = %e, "failed to send hello frame");
            return SessionOutcome::error();
        }
        self.command_loop(&mut stream)
    }

    fn command_loop(&self, stream: &mut TcpStream) -> SessionOutcome {
        loop {
            let frame = match protocol::read_command(stream) {
                Ok(ReadCommandOutcome::PeerClosed) => return SessionOutcome::clean_end(0, false),
                Ok(ReadCommandOutcome::Command(f)) => f,
                Err(e) => {
                    tracing::warn!(error = %e, "protocol read error, aborting session");
                    return SessionOutcome::error();
                }
            };

            let dispatched = commands::dispatch(frame.code, &frame.payload, self.logger, self.runner);

            let (reply, control) = match dispatched {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, code = frame.code, "fatal command error, aborting session");
                    return SessionOutcome::error();
                }
            };

            let (ret_code, payload) = match reply {
                commands::Reply::Success(p) => (0, p),
                commands::Reply::Recoverable => (-1, Vec::new()),
            };

            if let Err(e) = protocol::send_response(stream, ret_code, &payload) {
                tracing::warn!(error = %e, "failed to send response, aborting session");
                return SessionOutcome::error();
            }

            match control {
                Control::Continue => continue,
                Control::EndWithSleep(secs) => return SessionOutcome::clean_end(secs, false),
                Control::EndWithDie => return SessionOutcome::clean_end(0, true),
            }
        }
    }
}
