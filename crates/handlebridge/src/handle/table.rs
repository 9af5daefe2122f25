//! Handle table
//!
//! One table holds every binding the local side knows about, whatever its
//! origin:
//!
//! - auto bindings for local objects, allocated on first export
//! - pinned bindings for handles the remote side chose (remote objects
//!   reached through proxies, or local objects bound to a caller-supplied
//!   handle)
//!
//! The set of keys doubles as the reservation set, so an allocated handle
//! can never collide with a pinned one. Targets are held weakly; a binding
//! keeps its object alive only while retained.
//!
//! # Locking
//!
//! The identity map is a single mutex and is always taken before any shard
//! of the entry map. No lock is held while native code runs or while an
//! entry (and with it a sentinel or a retained object) is dropped.

use super::allocator::HandleAllocator;
use super::sentinel::{Reclaim, Sentinel};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::exported::Exported;
use crate::value::{LocalObject, LocalRef};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use handlebridge_sdk::Handle;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

// ============================================================================
// Public types
// ============================================================================

/// Whether a binding keeps its object alive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionMode {
    /// The binding does not keep the object alive
    Weak,
    /// The binding keeps the object alive until the remote side releases it
    StrongUntilReleased,
}

/// How a binding's handle was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Allocated locally
    Auto,
    /// Supplied by the remote side or the caller
    Pinned,
}

/// Observable state of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Bound to a live object
    Live(RetentionMode),
    /// Object unreachable or release in progress
    PendingRelease,
}

/// Point-in-time counts over the table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleStats {
    /// All bindings, including those pending release
    pub total: usize,
    /// Bindings whose object is alive
    pub live: usize,
    /// Bindings holding a strong reference
    pub retained: usize,
    /// Bindings with a caller or remote supplied handle
    pub pinned: usize,
    /// Bindings with a locally allocated handle
    pub auto: usize,
    /// Bindings whose object is gone or whose release is in progress
    pub pending_release: usize,
}

/// Whether a release sequence may proceed to the native release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseTicket {
    Proceed,
    /// The handle has been rebound since the sentinel was created
    Superseded,
}

// ============================================================================
// Entries
// ============================================================================

pub(crate) struct HandleEntry {
    target: Weak<dyn Any + Send + Sync>,
    exported: Option<Weak<dyn Exported>>,
    class_name: Arc<str>,
    address: usize,
    retained: Option<LocalObject>,
    origin: Origin,
    generation: u64,
    sentinel: Arc<Sentinel>,
    releasing: bool,
    /// Bound to a handle the remote side minted
    remote: bool,
}

impl HandleEntry {
    fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    fn is_bound_to(&self, address: usize) -> bool {
        !self.releasing && self.address == address && self.is_alive()
    }

    fn is_unreachable(&self) -> bool {
        !self.releasing && self.retained.is_none() && !self.is_alive()
    }

    fn upgrade(&self) -> Option<LocalRef> {
        let object = self.target.upgrade()?;
        let exported = self.exported.as_ref().and_then(Weak::upgrade);
        Some(LocalRef::from_parts(object, exported, self.class_name.clone()))
    }
}

#[derive(Debug, Default)]
struct Identity {
    pinned: Option<Handle>,
    auto: Option<Handle>,
}

impl Identity {
    fn forget(&mut self, handle: Handle) {
        if self.pinned == Some(handle) {
            self.pinned = None;
        }
        if self.auto == Some(handle) {
            self.auto = None;
        }
    }

    fn is_empty(&self) -> bool {
        self.pinned.is_none() && self.auto.is_none()
    }
}

// ============================================================================
// HandleTable
// ============================================================================

pub(crate) struct HandleTable {
    entries: DashMap<Handle, HandleEntry>,
    identity: Mutex<FxHashMap<usize, Identity>>,
    allocator: HandleAllocator,
    generations: AtomicU64,
    owner: Weak<dyn Reclaim>,
}

impl HandleTable {
    pub(crate) fn new(config: &BridgeConfig, owner: Weak<dyn Reclaim>) -> Self {
        Self {
            entries: DashMap::new(),
            identity: Mutex::new(FxHashMap::default()),
            allocator: HandleAllocator::new(config),
            generations: AtomicU64::new(0),
            owner,
        }
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn local_entry(
        &self,
        handle: Handle,
        target: &LocalRef,
        origin: Origin,
        mode: RetentionMode,
        generation: u64,
    ) -> HandleEntry {
        HandleEntry {
            target: Arc::downgrade(target.object()),
            exported: target.as_exported().map(Arc::downgrade),
            class_name: target.class_name_arc(),
            address: target.address(),
            retained: (mode == RetentionMode::StrongUntilReleased).then(|| target.object().clone()),
            origin,
            generation,
            sentinel: Arc::new(Sentinel::new(handle, generation, self.owner.clone())),
            releasing: false,
            remote: false,
        }
    }

    fn is_bound(&self, handle: Handle, address: usize) -> bool {
        self.entries
            .get(&handle)
            .is_some_and(|entry| entry.is_bound_to(address))
    }

    /// Handle for `target`, allocating one on first use.
    ///
    /// A pinned binding wins over an auto one. Proxies wrapped as local
    /// objects answer with their own handle.
    pub(crate) fn get_or_create(&self, target: &LocalRef, mode: RetentionMode) -> BridgeResult<Handle> {
        if let Some(handle) = target.proxy_handle() {
            return Ok(handle);
        }

        let address = target.address();
        let mut identity = self.identity.lock();

        if let Some(known) = identity.get(&address) {
            for handle in [known.pinned, known.auto].into_iter().flatten() {
                if let Some(mut entry) = self.entries.get_mut(&handle) {
                    if entry.is_bound_to(address) {
                        if mode == RetentionMode::StrongUntilReleased && entry.retained.is_none() {
                            entry.retained = Some(target.object().clone());
                            trace!(%handle, "handle retained");
                        }
                        return Ok(handle);
                    }
                }
            }
        }

        let generation = self.next_generation();
        let handle = self.allocator.allocate(|candidate| match self.entries.entry(candidate) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(self.local_entry(candidate, target, Origin::Auto, mode, generation));
                true
            }
        })?;

        let pinned_is_stale = identity
            .get(&address)
            .and_then(|known| known.pinned)
            .is_some_and(|pinned| !self.is_bound(pinned, address));
        let known = identity.entry(address).or_default();
        if pinned_is_stale {
            known.pinned = None;
        }
        known.auto = Some(handle);

        Ok(handle)
    }

    /// Bind `target` to a caller-supplied handle.
    ///
    /// Rebinding the same object is a no-op. A handle whose previous object
    /// is gone or being released is taken over. Any other live binding of
    /// the object is retired without a native release, so the object keeps
    /// a single sentinel.
    pub(crate) fn pin(&self, target: &LocalRef, handle: Handle) -> BridgeResult<()> {
        if handle.is_null() {
            return Err(BridgeError::ReservedHandle);
        }

        let address = target.address();
        let mut identity = self.identity.lock();
        let replaced = match self.entries.entry(handle) {
            Entry::Occupied(mut slot) => {
                let current = slot.get();
                if current.is_bound_to(address) {
                    None
                } else if !current.releasing && current.is_alive() {
                    return Err(BridgeError::HandleConflict { handle });
                } else {
                    let generation = self.next_generation();
                    let entry =
                        self.local_entry(handle, target, Origin::Pinned, RetentionMode::Weak, generation);
                    Some(slot.insert(entry))
                }
            }
            Entry::Vacant(slot) => {
                let generation = self.next_generation();
                slot.insert(self.local_entry(handle, target, Origin::Pinned, RetentionMode::Weak, generation));
                None
            }
        };
        let retired = self.retire_others(&mut identity, address, handle);
        identity.entry(address).or_default().pinned = Some(handle);
        drop(identity);
        drop(replaced);
        drop(retired);

        trace!(%handle, "handle pinned");
        Ok(())
    }

    /// Remove the live bindings of `address` other than `keep`, moving any
    /// retention onto `keep`. Called with the identity lock held.
    fn retire_others(
        &self,
        identity: &mut FxHashMap<usize, Identity>,
        address: usize,
        keep: Handle,
    ) -> Vec<HandleEntry> {
        let Some(known) = identity.get_mut(&address) else {
            return Vec::new();
        };
        let mut retired = Vec::new();
        for other in [known.pinned, known.auto].into_iter().flatten() {
            if other == keep {
                continue;
            }
            // a sentinel already claimed belongs to a release in flight
            let removed = self.entries.remove_if(&other, |_, entry| {
                entry.is_bound_to(address) && entry.sentinel.mark_disposed()
            });
            if let Some((_, mut entry)) = removed {
                known.forget(other);
                if entry.retained.is_some() {
                    if let Some(mut kept) = self.entries.get_mut(&keep) {
                        if kept.retained.is_none() {
                            kept.retained = entry.retained.take();
                        }
                    }
                }
                trace!(handle = %other, kept = %keep, "binding retired");
                retired.push(entry);
            }
        }
        retired
    }

    /// Bind a remote handle to the object built by `make`, or return the
    /// object already bound to it.
    ///
    /// `make` receives the sentinel of the new binding. Remote bindings do
    /// not enter the identity map.
    pub(crate) fn bind_remote<F>(&self, handle: Handle, make: F) -> BridgeResult<LocalRef>
    where
        F: FnOnce(Arc<Sentinel>) -> LocalRef,
    {
        if handle.is_null() {
            return Err(BridgeError::ReservedHandle);
        }

        let generation = self.next_generation();
        let (bound, replaced) = match self.entries.entry(handle) {
            Entry::Occupied(mut slot) => {
                let current = slot.get();
                if !current.releasing {
                    if let Some(existing) = current.upgrade() {
                        return Ok(existing);
                    }
                }
                if !current.remote {
                    return Err(BridgeError::StaleHandle(handle));
                }
                let (bound, entry) = self.remote_entry(handle, generation, make);
                (bound, Some(slot.insert(entry)))
            }
            Entry::Vacant(slot) => {
                let (bound, entry) = self.remote_entry(handle, generation, make);
                slot.insert(entry);
                (bound, None)
            }
        };
        drop(replaced);

        trace!(%handle, "remote handle bound");
        Ok(bound)
    }

    fn remote_entry<F>(&self, handle: Handle, generation: u64, make: F) -> (LocalRef, HandleEntry)
    where
        F: FnOnce(Arc<Sentinel>) -> LocalRef,
    {
        let sentinel = Arc::new(Sentinel::new(handle, generation, self.owner.clone()));
        let bound = make(sentinel.clone());
        let entry = HandleEntry {
            target: Arc::downgrade(bound.object()),
            exported: None,
            class_name: bound.class_name_arc(),
            address: bound.address(),
            retained: None,
            origin: Origin::Pinned,
            generation,
            sentinel,
            releasing: false,
            remote: true,
        };
        (bound, entry)
    }

    /// Object bound to `handle`, if it is live and not being released
    pub(crate) fn resolve(&self, handle: Handle) -> Option<LocalRef> {
        let entry = self.entries.get(&handle)?;
        if entry.releasing {
            return None;
        }
        entry.upgrade()
    }

    pub(crate) fn sentinel_of(&self, handle: Handle) -> Option<Arc<Sentinel>> {
        self.entries.get(&handle).map(|entry| entry.sentinel.clone())
    }

    pub(crate) fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Whether `handle` can only name a local object: it lies in the local
    /// allocation range or is still held by a local binding
    pub(crate) fn is_local(&self, handle: Handle) -> bool {
        self.allocator.in_range(handle)
            || self.entries.get(&handle).is_some_and(|entry| !entry.remote)
    }

    /// Make the binding keep its object alive
    pub(crate) fn retain(&self, handle: Handle) -> BridgeResult<()> {
        let mut entry = self
            .entries
            .get_mut(&handle)
            .ok_or(BridgeError::StaleHandle(handle))?;
        if entry.releasing {
            return Err(BridgeError::StaleHandle(handle));
        }
        if entry.retained.is_none() {
            let object = entry.target.upgrade().ok_or(BridgeError::StaleHandle(handle))?;
            entry.retained = Some(object);
            trace!(%handle, "handle retained");
        }
        Ok(())
    }

    /// Drop the binding's strong reference. Returns whether one was held.
    pub(crate) fn unretain(&self, handle: Handle) -> bool {
        let released = self
            .entries
            .get_mut(&handle)
            .and_then(|mut entry| entry.retained.take());
        let held = released.is_some();
        drop(released);
        if held {
            trace!(%handle, "handle unretained");
        }
        held
    }

    pub(crate) fn state(&self, handle: Handle) -> Option<HandleState> {
        let entry = self.entries.get(&handle)?;
        if entry.releasing || entry.is_unreachable() {
            return Some(HandleState::PendingRelease);
        }
        Some(HandleState::Live(if entry.retained.is_some() {
            RetentionMode::StrongUntilReleased
        } else {
            RetentionMode::Weak
        }))
    }

    // ------------------------------------------------------------------------
    // Release sequence
    // ------------------------------------------------------------------------

    /// First step of a release: mark the binding as releasing unless it has
    /// been superseded.
    pub(crate) fn begin_release(&self, handle: Handle, generation: u64) -> ReleaseTicket {
        match self.entries.get_mut(&handle) {
            Some(mut entry) if entry.generation == generation => {
                entry.releasing = true;
                ReleaseTicket::Proceed
            }
            Some(_) => ReleaseTicket::Superseded,
            None => ReleaseTicket::Proceed,
        }
    }

    /// Last step of a release: purge the binding and its identity mapping.
    ///
    /// The removed entry is handed back so the caller drops it outside all
    /// locks.
    pub(crate) fn finish_release(&self, handle: Handle, generation: u64) -> Option<HandleEntry> {
        let mut identity = self.identity.lock();
        let (_, entry) = self
            .entries
            .remove_if(&handle, |_, entry| entry.generation == generation)?;
        if let Some(known) = identity.get_mut(&entry.address) {
            known.forget(handle);
            if known.is_empty() {
                identity.remove(&entry.address);
            }
        }
        Some(entry)
    }

    // ------------------------------------------------------------------------
    // Sweeping and shutdown
    // ------------------------------------------------------------------------

    /// Sentinels of bindings whose object is gone and that are not retained
    pub(crate) fn unreachable(&self) -> Vec<Arc<Sentinel>> {
        self.entries
            .iter()
            .filter(|entry| entry.is_unreachable())
            .map(|entry| entry.sentinel.clone())
            .collect()
    }

    /// Drop identity mappings that no longer point at a live binding.
    /// Returns the number of objects forgotten.
    pub(crate) fn prune_identity(&self) -> usize {
        let mut identity = self.identity.lock();
        let before = identity.len();
        identity.retain(|&address, known| {
            for slot in [&mut known.pinned, &mut known.auto] {
                if slot.is_some_and(|handle| !self.is_bound(handle, address)) {
                    *slot = None;
                }
            }
            !known.is_empty()
        });
        before - identity.len()
    }

    /// Sentinels of every binding
    pub(crate) fn sentinels(&self) -> Vec<Arc<Sentinel>> {
        self.entries.iter().map(|entry| entry.sentinel.clone()).collect()
    }

    /// Remove every binding. The caller drops the result outside all locks.
    pub(crate) fn clear(&self) -> Vec<HandleEntry> {
        let mut identity = self.identity.lock();
        identity.clear();
        let handles: Vec<Handle> = self.entries.iter().map(|entry| *entry.key()).collect();
        handles
            .into_iter()
            .filter_map(|handle| self.entries.remove(&handle).map(|(_, entry)| entry))
            .collect()
    }

    pub(crate) fn stats(&self) -> HandleStats {
        let mut stats = HandleStats::default();
        for entry in self.entries.iter() {
            stats.total += 1;
            if entry.releasing || entry.is_unreachable() {
                stats.pending_release += 1;
            }
            if entry.is_alive() {
                stats.live += 1;
            }
            if entry.retained.is_some() {
                stats.retained += 1;
            }
            match entry.origin {
                Origin::Auto => stats.auto += 1,
                Origin::Pinned => stats.pinned += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Harness {
        table: HandleTable,
        released: Mutex<Vec<Handle>>,
    }

    impl Reclaim for Harness {
        fn reclaim(&self, handle: Handle, generation: u64) {
            if self.table.begin_release(handle, generation) == ReleaseTicket::Superseded {
                return;
            }
            self.released.lock().push(handle);
            drop(self.table.finish_release(handle, generation));
        }
    }

    fn harness_with(config: BridgeConfig) -> Arc<Harness> {
        Arc::new_cyclic(|weak: &Weak<Harness>| {
            let owner: Weak<dyn Reclaim> = weak.clone();
            Harness {
                table: HandleTable::new(&config, owner),
                released: Mutex::new(Vec::new()),
            }
        })
    }

    fn harness() -> Arc<Harness> {
        harness_with(BridgeConfig::default())
    }

    fn release(h: &Harness, handle: Handle) -> bool {
        h.table.sentinel_of(handle).is_some_and(|s| s.dispose())
    }

    #[test]
    fn test_identity_is_stable() {
        let h = harness();
        let obj = LocalRef::new(1u8);

        let first = h.table.get_or_create(&obj, RetentionMode::Weak).unwrap();
        let second = h.table.get_or_create(&obj.clone(), RetentionMode::Weak).unwrap();
        assert_eq!(first, second);
        assert!(h.table.resolve(first).unwrap().ptr_eq(&obj));
    }

    #[test]
    fn test_distinct_objects_get_distinct_handles() {
        let h = harness();
        let objects: Vec<LocalRef> = (0..100).map(LocalRef::new).collect();
        let handles: HashSet<Handle> = objects
            .iter()
            .map(|o| h.table.get_or_create(o, RetentionMode::Weak).unwrap())
            .collect();
        assert_eq!(handles.len(), 100);
        assert!(handles.iter().all(|handle| !handle.is_null()));
    }

    #[test]
    fn test_release_is_idempotent() {
        let h = harness();
        let obj = LocalRef::new("a");
        let handle = h.table.get_or_create(&obj, RetentionMode::Weak).unwrap();

        assert!(release(&h, handle));
        assert!(h.table.resolve(handle).is_none());
        assert!(!release(&h, handle));
        assert_eq!(*h.released.lock(), vec![handle]);

        let again = h.table.get_or_create(&obj, RetentionMode::Weak).unwrap();
        assert_ne!(again, Handle::NULL);
        assert!(h.table.resolve(again).unwrap().ptr_eq(&obj));
    }

    #[test]
    fn test_weak_binding_becomes_unreachable() {
        let h = harness();
        let obj = LocalRef::new(5i64);
        let handle = h.table.get_or_create(&obj, RetentionMode::Weak).unwrap();
        assert_eq!(h.table.state(handle), Some(HandleState::Live(RetentionMode::Weak)));
        assert!(h.table.unreachable().is_empty());

        drop(obj);
        assert_eq!(h.table.state(handle), Some(HandleState::PendingRelease));
        let candidates = h.table.unreachable();
        assert_eq!(candidates.len(), 1);
        for sentinel in candidates {
            assert!(sentinel.dispose());
        }
        assert_eq!(h.table.state(handle), None);
        assert_eq!(h.table.stats().total, 0);
        assert_eq!(h.table.prune_identity(), 0);
    }

    #[test]
    fn test_retention_keeps_object_alive() {
        let h = harness();
        let obj = LocalRef::new(vec![1u8, 2, 3]);
        let handle = h
            .table
            .get_or_create(&obj, RetentionMode::StrongUntilReleased)
            .unwrap();
        drop(obj);

        assert!(h.table.unreachable().is_empty());
        let resolved = h.table.resolve(handle).unwrap();
        assert_eq!(*resolved.downcast::<Vec<u8>>().unwrap(), vec![1, 2, 3]);
        drop(resolved);

        assert!(h.table.unretain(handle));
        assert!(!h.table.unretain(handle));
        assert_eq!(h.table.unreachable().len(), 1);
    }

    #[test]
    fn test_retain_after_weak_registration() {
        let h = harness();
        let obj = LocalRef::new(0u16);
        let handle = h.table.get_or_create(&obj, RetentionMode::Weak).unwrap();
        h.table.retain(handle).unwrap();
        assert_eq!(
            h.table.state(handle),
            Some(HandleState::Live(RetentionMode::StrongUntilReleased))
        );
        assert!(h.table.retain(Handle::from_raw(1)).is_err());
    }

    #[test]
    fn test_pinned_handle_wins() {
        let h = harness();
        let obj = LocalRef::new('b');
        let auto = h.table.get_or_create(&obj, RetentionMode::Weak).unwrap();

        let pinned = Handle::from_raw(42);
        h.table.pin(&obj, pinned).unwrap();
        h.table.pin(&obj, pinned).unwrap();

        assert_eq!(h.table.get_or_create(&obj, RetentionMode::Weak).unwrap(), pinned);
        assert!(h.table.resolve(auto).is_none());
        assert!(h.table.resolve(pinned).unwrap().ptr_eq(&obj));

        let stats = h.table.stats();
        assert_eq!((stats.total, stats.pinned, stats.auto), (1, 1, 0));
        assert!(h.released.lock().is_empty());

        drop(obj);
        for sentinel in h.table.unreachable() {
            sentinel.dispose();
        }
        assert_eq!(*h.released.lock(), vec![pinned]);
        assert_eq!(h.table.stats().total, 0);
    }

    #[test]
    fn test_pin_carries_retention_over() {
        let h = harness();
        let obj = LocalRef::new(3u8);
        h.table
            .get_or_create(&obj, RetentionMode::StrongUntilReleased)
            .unwrap();

        let pinned = Handle::from_raw(43);
        h.table.pin(&obj, pinned).unwrap();
        drop(obj);

        assert!(h.table.unreachable().is_empty());
        assert_eq!(
            h.table.state(pinned),
            Some(HandleState::Live(RetentionMode::StrongUntilReleased))
        );
        assert!(h.table.unretain(pinned));
        assert_eq!(h.table.unreachable().len(), 1);
    }

    #[test]
    fn test_repin_moves_binding() {
        let h = harness();
        let obj = LocalRef::new(4u8);
        let (first, second) = (Handle::from_raw(44), Handle::from_raw(45));

        h.table.pin(&obj, first).unwrap();
        h.table.pin(&obj, second).unwrap();
        assert!(h.table.resolve(first).is_none());
        assert_eq!(h.table.stats().total, 1);

        drop(obj);
        for sentinel in h.table.unreachable() {
            sentinel.dispose();
        }
        assert_eq!(*h.released.lock(), vec![second]);
    }

    #[test]
    fn test_local_handles_never_bind_remote() {
        let h = harness();
        let obj = LocalRef::new(6u8);
        let auto = h.table.get_or_create(&obj, RetentionMode::Weak).unwrap();
        assert!(h.table.is_local(auto));
        drop(obj);

        assert!(matches!(
            h.table.bind_remote(auto, |_sentinel| LocalRef::new(0u8)),
            Err(BridgeError::StaleHandle(handle)) if handle == auto
        ));
        assert_eq!(h.table.stats().auto, 1);

        let pinned = Handle::from_raw(46);
        let kept = LocalRef::new(7u8);
        h.table.pin(&kept, pinned).unwrap();
        assert!(h.table.is_local(pinned));
        assert!(!h.table.is_local(Handle::from_raw(47)));
    }

    #[test]
    fn test_pin_conflict_and_takeover() {
        let h = harness();
        let handle = Handle::from_raw(42);
        let first = LocalRef::new(1u32);
        let second = LocalRef::new(2u32);

        h.table.pin(&first, handle).unwrap();
        assert!(matches!(
            h.table.pin(&second, handle),
            Err(BridgeError::HandleConflict { .. })
        ));

        drop(first);
        h.table.pin(&second, handle).unwrap();
        assert!(h.table.resolve(handle).unwrap().ptr_eq(&second));
        // the superseded binding must not release the handle
        assert!(h.released.lock().is_empty());
        assert!(matches!(
            h.table.pin(&second, Handle::NULL),
            Err(BridgeError::ReservedHandle)
        ));
    }

    #[test]
    fn test_bind_remote_reuses_live_binding() {
        let h = harness();
        let handle = Handle::from_raw(7);
        let first = h
            .table
            .bind_remote(handle, |_sentinel| LocalRef::new(7u64))
            .unwrap();
        let second = h
            .table
            .bind_remote(handle, |_sentinel| LocalRef::new(8u64))
            .unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(h.table.stats().pinned, 1);
    }

    #[test]
    fn test_exhaustion_reports_error() {
        let h = harness_with(BridgeConfig {
            handle_floor: 3,
            handle_ceiling: 4,
            max_allocation_attempts: 64,
            ..BridgeConfig::default()
        });
        let keep: Vec<LocalRef> = (0..2).map(LocalRef::new).collect();
        for obj in &keep {
            h.table.get_or_create(obj, RetentionMode::Weak).unwrap();
        }
        let err = h
            .table
            .get_or_create(&LocalRef::new(99), RetentionMode::Weak)
            .unwrap_err();
        assert!(matches!(err, BridgeError::AllocationExhausted { attempts: 64 }));
    }

    #[test]
    fn test_concurrent_allocation_never_collides() {
        let h = harness();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let h = h.clone();
                std::thread::spawn(move || {
                    let objects: Vec<LocalRef> = (0..200).map(LocalRef::new).collect();
                    let handles: Vec<Handle> = objects
                        .iter()
                        .map(|o| h.table.get_or_create(o, RetentionMode::Weak).unwrap())
                        .collect();
                    (objects, handles)
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut keep = Vec::new();
        for thread in threads {
            let (objects, handles) = thread.join().unwrap();
            for handle in handles {
                assert!(seen.insert(handle), "handle {} issued twice", handle);
            }
            keep.push(objects);
        }
        assert_eq!(seen.len(), 1600);
    }
}
