//! Lifetime sentinels
//!
//! A sentinel is attached to every tracked object. Disposing it runs the
//! release sequence for its handle exactly once, whether triggered by an
//! explicit release, by the sweeper, by a proxy going out of scope or by
//! context shutdown.

use handlebridge_sdk::Handle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use tracing::trace;

/// Runs the release sequence for a handle binding.
///
/// `generation` identifies the binding the sentinel was created for; a
/// handle rebound since then must not be released.
pub(crate) trait Reclaim: Send + Sync {
    fn reclaim(&self, handle: Handle, generation: u64);
}

/// One-shot release trigger for a single handle binding
pub(crate) struct Sentinel {
    handle: Handle,
    generation: u64,
    disposed: AtomicBool,
    owner: Weak<dyn Reclaim>,
}

impl Sentinel {
    pub(crate) fn new(handle: Handle, generation: u64, owner: Weak<dyn Reclaim>) -> Self {
        Self {
            handle,
            generation,
            disposed: AtomicBool::new(false),
            owner,
        }
    }

    pub(crate) fn handle(&self) -> Handle {
        self.handle
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Claim the right to run the release sequence.
    ///
    /// Returns `true` for exactly one caller.
    pub(crate) fn mark_disposed(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }

    /// Run the release sequence if nobody has yet.
    ///
    /// Returns `true` if this call performed the disposal.
    pub(crate) fn dispose(&self) -> bool {
        if !self.mark_disposed() {
            return false;
        }
        match self.owner.upgrade() {
            Some(owner) => owner.reclaim(self.handle, self.generation),
            None => trace!(handle = %self.handle, "sentinel outlived its context"),
        }
        true
    }
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Handle, u64)>>,
    }

    impl Reclaim for Recorder {
        fn reclaim(&self, handle: Handle, generation: u64) {
            self.calls.lock().push((handle, generation));
        }
    }

    fn sentinel_for(recorder: &Arc<Recorder>, raw: u32, generation: u64) -> Sentinel {
        let owner: Weak<dyn Reclaim> = Arc::downgrade(recorder) as Weak<dyn Reclaim>;
        Sentinel::new(Handle::from_raw(raw), generation, owner)
    }

    #[test]
    fn test_dispose_runs_once() {
        let recorder = Arc::new(Recorder::default());
        let sentinel = sentinel_for(&recorder, 5, 1);

        assert!(sentinel.dispose());
        assert!(!sentinel.dispose());
        assert!(sentinel.is_disposed());
        drop(sentinel);

        assert_eq!(*recorder.calls.lock(), vec![(Handle::from_raw(5), 1)]);
    }

    #[test]
    fn test_drop_disposes() {
        let recorder = Arc::new(Recorder::default());
        drop(sentinel_for(&recorder, 9, 4));
        assert_eq!(*recorder.calls.lock(), vec![(Handle::from_raw(9), 4)]);
    }

    #[test]
    fn test_concurrent_dispose_single_winner() {
        let recorder = Arc::new(Recorder::default());
        let sentinel = Arc::new(sentinel_for(&recorder, 3, 2));

        let winners: usize = (0..8)
            .map(|_| {
                let sentinel = sentinel.clone();
                std::thread::spawn(move || sentinel.dispose())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| usize::from(t.join().unwrap()))
            .sum();

        assert_eq!(winners, 1);
        assert_eq!(recorder.calls.lock().len(), 1);
    }

    #[test]
    fn test_dead_owner_is_tolerated() {
        let recorder = Arc::new(Recorder::default());
        let sentinel = sentinel_for(&recorder, 1, 1);
        drop(recorder);
        assert!(sentinel.dispose());
    }
}
