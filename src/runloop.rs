//! The agent runloop (spec.md §4.6): connect, run one session, sleep for
//! however long the session said to (or the configured default, if it said
//! zero), repeat, until `DIE` or an operator `Ctrl-C`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::{self, ResolvedConfig};
use crate::exec::RealSubprocessRunner;
use crate::logger::Logger;
use crate::session::{SessionController, SessionStatus};

const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

pub fn run_foreground(config_path: Option<&Path>) -> Result<()> {
    let resolved = load(config_path)?;
    let logger = Logger::open(&resolved.log_path)
        .with_context(|| format!("opening log file {}", resolved.log_path.display()))?;
    let runner = RealSubprocessRunner;
    let controller = SessionController::new(&resolved.tool, &logger, &runner);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    tracing::info!(
        tool = %String::from_utf8_lossy(&resolved.tool.name),
        ip = %resolved.tool.config.ip,
        port = resolved.tool.config.port,
        "outpost starting"
    );

    while !shutdown.load(Ordering::SeqCst) {
        let outcome = controller.connect_and_run();

        if outcome.status == SessionStatus::Error {
            anyhow::bail!("session ended with a fatal error; terminating the agent");
        }

        if outcome.should_die {
            tracing::info!("received die command, exiting agent loop");
            break;
        }

        let sleep_secs = if outcome.sleep_secs == 0 {
            resolved.tool.config.default_sleep_secs
        } else {
            outcome.sleep_secs
        };
        sleep_interruptible(Duration::from_secs(sleep_secs as u64), &shutdown);
    }

    Ok(())
}

pub fn run_once(config_path: Option<&Path>) -> Result<()> {
    let resolved = load(config_path)?;
    let logger = Logger::open(&resolved.log_path)
        .with_context(|| format!("opening log file {}", resolved.log_path.display()))?;
    let runner = RealSubprocessRunner;
    let controller = SessionController::new(&resolved.tool, &logger, &runner);
    let outcome = controller.connect_and_run();
    println!(
        "status={:?} sleep_secs={} should_die={}",
        outcome.status, outcome.sleep_secs, outcome.should_die
    );
    Ok(())
}

pub fn show_config(config_path: Option<&Path>) -> Result<()> {
    let resolved = load(config_path)?;
    println!("tool name: {}", String::from_utf8_lossy(&resolved.tool.name));
    println!(
        "controller: {}:{}",
        resolved.tool.config.ip, resolved.tool.config.port
    );
    println!("default sleep: {}s", resolved.tool.config.default_sleep_secs);
    println!("log path: {}", resolved.log_path.display());
    Ok(())
}

fn load(config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let path = config::resolve_config_path(config_path)?;
    config::load(&path).with_context(|| format!("loading config from {}", path.display()))
}

/// Sleeps for `total`, checking `shutdown` every `SHUTDOWN_POLL` so a
/// `Ctrl-C` during the inter-session sleep is honored promptly instead of
/// only at the next connection attempt.
fn sleep_interruptible(total: Duration, shutdown: &AtomicBool) {
    let mut waited = Duration::ZERO;
    while waited < total {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let step = SHUTDOWN_POLL.min(total - waited);
        std::thread::sleep(step);
        waited += step;
    }
}
