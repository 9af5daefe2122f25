//! Random handle allocation
//!
//! Handles are drawn uniformly from `[floor, ceiling]` so they are not
//! guessable from allocation order. The caller supplies the reservation
//! step; a candidate only counts once the caller has atomically claimed it.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use handlebridge_sdk::Handle;
use rand::Rng;
use tracing::{error, trace};

/// Draws random handle candidates within the configured range
#[derive(Debug, Clone)]
pub(crate) struct HandleAllocator {
    floor: u32,
    ceiling: u32,
    max_attempts: u32,
}

impl HandleAllocator {
    /// Allocator for the range and attempt bound in `config`
    pub(crate) fn new(config: &BridgeConfig) -> Self {
        Self {
            floor: config.handle_floor.max(1),
            ceiling: config.handle_ceiling.max(config.handle_floor.max(1)),
            max_attempts: config.max_allocation_attempts.max(1),
        }
    }

    /// Whether `handle` falls inside the locally assigned range
    pub(crate) fn in_range(&self, handle: Handle) -> bool {
        (self.floor..=self.ceiling).contains(&handle.raw())
    }

    /// Draw candidates until `reserve` accepts one.
    ///
    /// `reserve` must check and claim the candidate in one atomic step and
    /// return `true` only if the claim succeeded.
    pub(crate) fn allocate(&self, mut reserve: impl FnMut(Handle) -> bool) -> BridgeResult<Handle> {
        let mut rng = rand::thread_rng();
        for attempt in 1..=self.max_attempts {
            let candidate = Handle::from_raw(rng.gen_range(self.floor..=self.ceiling));
            if reserve(candidate) {
                trace!(handle = %candidate, attempt, "handle allocated");
                return Ok(candidate);
            }
        }
        error!(
            attempts = self.max_attempts,
            floor = self.floor,
            ceiling = self.ceiling,
            "handle allocation exhausted"
        );
        Err(BridgeError::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn allocator(floor: u32, ceiling: u32, attempts: u32) -> HandleAllocator {
        HandleAllocator::new(&BridgeConfig {
            handle_floor: floor,
            handle_ceiling: ceiling,
            max_allocation_attempts: attempts,
            ..BridgeConfig::default()
        })
    }

    #[test]
    fn test_allocates_within_range() {
        let alloc = allocator(10, 20, 100);
        let mut taken = HashSet::new();
        for _ in 0..5 {
            let handle = alloc.allocate(|h| taken.insert(h)).unwrap();
            assert!((10..=20).contains(&handle.raw()));
            assert!(alloc.in_range(handle));
        }
        assert_eq!(taken.len(), 5);
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let alloc = allocator(7, 7, 3);
        let mut taken = HashSet::new();
        assert_eq!(alloc.allocate(|h| taken.insert(h)).unwrap(), Handle::from_raw(7));

        let mut tries = 0;
        let err = alloc
            .allocate(|h| {
                tries += 1;
                taken.insert(h)
            })
            .unwrap_err();
        assert!(matches!(err, BridgeError::AllocationExhausted { attempts: 3 }));
        assert_eq!(tries, 3);
    }

    #[test]
    fn test_never_issues_null() {
        let alloc = allocator(1, 2, 50);
        for _ in 0..50 {
            let handle = alloc.allocate(|_| true).unwrap();
            assert!(!handle.is_null());
        }
        assert!(!alloc.in_range(Handle::NULL));
    }
}
