// Cancellation: tear down an in-flight conversion from outside the
// worker thread

use super::lifecycle::{Engine, EngineManager, LifecycleSignal, PidRegistry};
use crate::progress::ProgressReporter;
use std::sync::Arc;
use std::sync::atomic::Ordering;

#[cfg(unix)]
pub(crate) fn terminate_pid(pid: u32) -> std::io::Result<()> {
    // SAFETY: plain kill(2); an invalid pid just returns an error.
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
pub(crate) fn terminate_pid(_pid: u32) -> std::io::Result<()> {
    Ok(())
}

/// Requests termination of whatever the engine is doing and resets the
/// lifecycle so the next operation starts clean.
///
/// `cancel` always appears to succeed: termination is best-effort, its
/// faults are logged and swallowed, and calling it with no engine alive
/// is a no-op. The manager observes the request at its next
/// `ensure_ready` and constructs a fresh handle instead of reusing the
/// cancelled one.
#[derive(Debug, Clone)]
pub struct CancelController {
    pids: PidRegistry,
    signal: Arc<LifecycleSignal>,
    reporter: ProgressReporter,
}

impl CancelController {
    pub fn new<E: Engine>(manager: &EngineManager<E>, reporter: &ProgressReporter) -> Self {
        Self {
            pids: Arc::clone(&manager.pids),
            signal: Arc::clone(&manager.signal),
            reporter: reporter.clone(),
        }
    }

    /// Returns promptly; does not wait for the engine to acknowledge
    /// shutdown.
    pub fn cancel(&self) {
        self.signal.discard_requested.store(true, Ordering::SeqCst);
        // Invalidate before killing so a racing progress tick from the
        // dying process cannot land on the reset value.
        self.reporter.invalidate();

        let pids: Vec<u32> = self.pids.lock().unwrap().iter().copied().collect();
        if pids.is_empty() {
            tracing::debug!("cancel requested with no conversion in flight");
        }
        for pid in pids {
            match terminate_pid(pid) {
                Ok(()) => tracing::info!(pid, "signalled engine process"),
                Err(err) => {
                    tracing::debug!(pid, error = %err, "termination fault suppressed")
                }
            }
        }
    }
}
