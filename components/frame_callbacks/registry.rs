/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::hash::Hash;
use std::mem;

use log::{trace, warn};
use malloc_size_of::{MallocShallowSizeOf, MallocSizeOf, MallocSizeOfOps};
use num_traits::PrimInt;

/// A numeric identifier for a scheduled callback.
///
/// Handles are allocated by pre-incrementing a counter seeded with
/// [`CallbackHandle::origin`], so the first handle a registry issues is one
/// past the origin and the origin itself is never issued. Any primitive
/// integer works as a handle type; animation frame requests use `i32` and
/// video frame requests use `u32`.
pub trait CallbackHandle: Copy + Eq + Ord + Hash + fmt::Debug {
    /// The counter seed. Never issued to callers.
    fn origin() -> Self;

    /// The handle following `self`, or `None` once the handle space is
    /// exhausted.
    fn next(self) -> Option<Self>;
}

impl<T> CallbackHandle for T
where
    T: PrimInt + Hash + fmt::Debug,
{
    fn origin() -> Self {
        T::zero()
    }

    fn next(self) -> Option<Self> {
        self.checked_add(&T::one())
    }
}

/// The error returned by [`CallbackRegistry::schedule`] once every handle of
/// the registry's handle type has been issued.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HandlesExhausted;

impl fmt::Display for HandlesExhausted {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("callback handle space exhausted")
    }
}

impl Error for HandlesExhausted {}

/// A scheduled callback paired with the handle it was scheduled under.
pub struct CallbackEntry<C, H> {
    pub callback: C,
    pub handle: H,
}

/// An insertion-ordered registry of cancelable callbacks.
///
/// The registry owns its callbacks outright. Schedulers get back a numeric
/// handle and nothing else; a callback leaves the registry again through
/// [`Self::cancel`], [`Self::take`] or [`Self::unlink`], and in the last
/// case it is dropped without being invoked.
///
/// This is single-owner, single-writer state. It never locks and never
/// invokes callbacks itself; draining a batch and running it is the dispatch
/// loop's job, see [`AnimationFrameProvider`](crate::AnimationFrameProvider).
pub struct CallbackRegistry<C, H: CallbackHandle> {
    /// Scheduled callbacks, sorted by handle. Handles are allocated
    /// monotonically, so appending at the tail keeps this sorted.
    entries: Vec<CallbackEntry<C, H>>,

    /// Handles that were canceled after their entry had already been drained
    /// by [`Self::take`], or that were never scheduled at all. The dispatch
    /// loop consults this through [`Self::is_canceled`] before invoking each
    /// entry of a taken batch. Cleared on every take.
    canceled: HashSet<H>,

    /// The most recently issued handle. A handle is never issued twice for
    /// the lifetime of the registry.
    last_handle: H,

    /// Set once [`Self::unlink`] has torn the registry down.
    unlinked: bool,
}

impl<C, H: CallbackHandle> Default for CallbackRegistry<C, H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            canceled: HashSet::new(),
            last_handle: H::origin(),
            unlinked: false,
        }
    }
}

impl<C, H: CallbackHandle> CallbackRegistry<C, H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `callback` and returns the handle under which it can be
    /// canceled. Fails with [`HandlesExhausted`] when the handle counter
    /// cannot be incremented any further, leaving the registry unchanged.
    pub fn schedule(&mut self, callback: C) -> Result<H, HandlesExhausted> {
        debug_assert!(!self.unlinked, "scheduling on an unlinked registry");

        let Some(handle) = self.last_handle.next() else {
            warn!("Callback handle space exhausted");
            return Err(HandlesExhausted);
        };
        self.last_handle = handle;
        self.entries.push(CallbackEntry { callback, handle });
        trace!("Scheduled callback {handle:?}");
        Ok(handle)
    }

    /// Cancels the callback scheduled under `handle`.
    ///
    /// Returns true if the callback was still pending and has now been
    /// removed, dropping it without invocation. Otherwise the handle is
    /// recorded and false is returned; a handle whose entry is in an already
    /// taken batch is indistinguishable from one that was never issued,
    /// and both get recorded.
    pub fn cancel(&mut self, handle: H) -> bool {
        trace!("Canceling callback {handle:?}");
        if let Ok(index) = self
            .entries
            .binary_search_by(|entry| entry.handle.cmp(&handle))
        {
            self.entries.remove(index);
            return true;
        }

        // The entry may be in flight in a batch taken earlier this tick.
        // Record the handle so is_canceled can tell the dispatch loop to
        // skip it.
        self.canceled.insert(handle);
        false
    }

    /// Whether `handle` was canceled after its entry had been taken. The
    /// dispatch loop checks this for every entry of a taken batch before
    /// invoking it.
    pub fn is_canceled(&self, handle: H) -> bool {
        !self.canceled.is_empty() && self.canceled.contains(&handle)
    }

    /// Removes and returns every scheduled entry in schedule order, clearing
    /// the canceled set. One tick's batch.
    pub fn take(&mut self) -> Vec<CallbackEntry<C, H>> {
        let entries = mem::take(&mut self.entries);
        self.canceled.clear();
        entries
    }

    /// Whether no callbacks are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tears the registry down, dropping all pending callbacks without
    /// invoking them. Unlinking twice is fine; scheduling afterwards is a
    /// caller bug and asserts in debug builds.
    pub fn unlink(&mut self) {
        self.entries.clear();
        self.unlinked = true;
    }
}

impl<C, H: CallbackHandle> MallocSizeOf for CallbackRegistry<C, H> {
    fn size_of(&self, ops: &mut MallocSizeOfOps) -> usize {
        // Callback payloads are opaque to measurement; count the containers.
        self.entries.shallow_size_of(ops) + self.canceled.shallow_size_of(ops)
    }
}
