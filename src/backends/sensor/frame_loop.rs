// SPDX-License-Identifier: GPL-3.0-only
//! Capture thread lifecycle for depth backends
//!
//! Every streaming backend runs the same shape of thread: set up the device
//! (or scene, or file list) once, then publish frames until told to stop.
//! [`CaptureLoop`] owns that thread. Setup runs on the capture thread itself,
//! but its outcome is handed back to the caller of [`CaptureLoop::spawn`], so
//! a sensor's `open` fails synchronously when the device cannot be set up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::errors::{SensorError, SensorResult};

/// What the loop body wants to happen next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Run another iteration
    Continue,
    /// Leave the loop (end of stream, device gone)
    Stop,
}

/// A running capture thread
///
/// Dropping the loop stops and joins the thread.
pub struct CaptureLoop {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoop {
    /// Spawn a capture thread and wait for its setup to finish
    ///
    /// `init` builds the thread-local state (device handle, stream, scene).
    /// On failure the thread exits and the error is returned here. On success
    /// `step` is called with that state until it returns [`LoopAction::Stop`]
    /// or [`stop`](Self::stop) is requested.
    pub fn spawn<S, I, F>(name: &str, init: I, mut step: F) -> SensorResult<Self>
    where
        S: 'static,
        I: FnOnce() -> SensorResult<S> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();
        let (ready_tx, ready_rx) = mpsc::channel::<SensorResult<()>>();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %thread_name, "Capture thread started, initializing");

                let mut state = match init() {
                    Ok(state) => {
                        let _ = ready_tx.send(Ok(()));
                        state
                    }
                    Err(e) => {
                        warn!(name = %thread_name, error = %e, "Capture initialization failed");
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let mut iterations = 0u64;
                while !thread_stop.load(Ordering::SeqCst) {
                    iterations += 1;
                    if step(&mut state) == LoopAction::Stop {
                        debug!(name = %thread_name, "Loop requested stop");
                        break;
                    }
                }

                info!(name = %thread_name, iterations, "Capture thread exiting");
            })?;

        let mut capture = Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(capture),
            Ok(Err(e)) => {
                capture.join();
                Err(e)
            }
            // Sender dropped without a message: init panicked
            Err(_) => {
                capture.join();
                Err(SensorError::Backend(format!(
                    "capture thread '{name}' died during initialization"
                )))
            }
        }
    }

    /// Check if the thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting for it
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture thread finished");
            }
        }
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoop dropped, stopping thread");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[test]
    fn test_loop_stops_itself() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut capture = CaptureLoop::spawn(
            "test-loop",
            || Ok(()),
            move |_| {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                if count >= 10 {
                    LoopAction::Stop
                } else {
                    LoopAction::Continue
                }
            },
        )
        .unwrap();

        capture.join();
        assert_eq!(counter.load(Ordering::SeqCst), 11); // 0-10 inclusive
        assert!(!capture.is_running());
    }

    #[test]
    fn test_stop_signal() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut capture = CaptureLoop::spawn(
            "test-stop",
            || Ok(()),
            move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                LoopAction::Continue
            },
        )
        .unwrap();

        assert!(capture.is_running());
        thread::sleep(Duration::from_millis(30));
        capture.stop();
        assert!(counter.load(Ordering::SeqCst) > 0);
        assert!(!capture.is_running());
    }

    #[test]
    fn test_state_from_init() {
        let result = Arc::new(AtomicU32::new(0));
        let result_clone = Arc::clone(&result);

        let mut capture = CaptureLoop::spawn(
            "test-init",
            || Ok(42u32),
            move |state| {
                result_clone.store(*state, Ordering::SeqCst);
                LoopAction::Stop
            },
        )
        .unwrap();

        capture.join();
        assert_eq!(result.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_init_failure_is_returned() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        let result = CaptureLoop::spawn(
            "test-fail-init",
            || Err::<(), _>(SensorError::NoDeviceFound),
            move |_: &mut ()| {
                ran_clone.store(true, Ordering::SeqCst);
                LoopAction::Stop
            },
        );

        assert!(matches!(result, Err(SensorError::NoDeviceFound)));
        assert!(!ran.load(Ordering::SeqCst));
    }
}
