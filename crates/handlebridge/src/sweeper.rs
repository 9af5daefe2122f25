//! Reclamation sweeper
//!
//! Local objects bound to handles are tracked weakly. Once an object is
//! gone, nothing on the local side will ever mention its handle again, so a
//! periodic sweep finds such bindings and runs their release sequence.

use crate::context::BridgeShared;
use crate::handle::HandleTable;
use crossbeam::channel::{self, Sender};
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Handles whose release sequence this sweep ran
    pub released: usize,
    /// Stale identity mappings dropped
    pub pruned: usize,
}

/// Release every binding whose object is unreachable, then prune the
/// identity map.
pub(crate) fn sweep(table: &HandleTable) -> SweepReport {
    let mut report = SweepReport::default();
    for sentinel in table.unreachable() {
        if sentinel.dispose() {
            trace!(handle = %sentinel.handle(), generation = sentinel.generation(), "swept");
            report.released += 1;
        }
    }
    report.pruned = table.prune_identity();

    if report.released > 0 || report.pruned > 0 {
        debug!(released = report.released, pruned = report.pruned, "sweep reclaimed handles");
    }
    report
}

/// Background thread running [`sweep`] on a fixed period
pub(crate) struct Sweeper {
    stop: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Start sweeping `shared` every `interval`.
    ///
    /// The thread holds the context weakly and exits on its own once the
    /// context is gone.
    pub(crate) fn spawn(shared: Weak<BridgeShared>, interval: Duration) -> std::io::Result<Self> {
        let (stop, stop_rx) = channel::bounded::<()>(1);

        let thread = thread::Builder::new()
            .name("handlebridge-sweeper".to_string())
            .spawn(move || {
                let ticker = channel::tick(interval);
                loop {
                    channel::select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            let Some(shared) = shared.upgrade() else {
                                break;
                            };
                            shared.sweep();
                        },
                    }
                }
                trace!("sweeper stopped");
            })?;

        debug!(interval_ms = interval.as_millis() as u64, "sweeper started");
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Signal the thread and wait briefly for it to finish
    pub(crate) fn stop(mut self) {
        let _ = self.stop.try_send(());

        let Some(handle) = self.thread.take() else {
            return;
        };
        // the last context reference can be dropped by the sweeper itself
        if handle.thread().id() == thread::current().id() {
            return;
        }

        let start = Instant::now();
        let timeout = Duration::from_secs(2);
        loop {
            if handle.is_finished() {
                let _ = handle.join();
                return;
            }
            if start.elapsed() > timeout {
                drop(handle);
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}
