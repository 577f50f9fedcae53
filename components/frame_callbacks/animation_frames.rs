/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use log::{debug, trace};
use malloc_size_of::{MallocShallowSizeOf, MallocSizeOf, MallocSizeOfOps};

use crate::registry::{CallbackEntry, CallbackRegistry, HandlesExhausted};
use crate::video_frames::VideoFrameProvider;

/// A callback scheduled through
/// [`AnimationFrameProvider::request_animation_frame`]. Receives the tick
/// timestamp in milliseconds and runs at most once.
pub type FrameRequestCallback = Box<dyn FnOnce(f64) + 'static>;

/// The callback bookkeeping behind an [`AnimationFrameProvider`]: the
/// registry of pending animation frame callbacks, plus the video frame
/// providers waiting to run their own callbacks on the next tick.
///
/// <https://html.spec.whatwg.org/multipage/#list-of-animation-frame-callbacks>
#[derive(Default)]
pub struct FrameRequestManager {
    callbacks: CallbackRegistry<FrameRequestCallback, i32>,

    /// Providers with pending video frame callbacks, in registration order.
    /// Keyed by identity rather than by handle; each provider's own registry
    /// keys its individual callbacks.
    video_frame_providers: Vec<Rc<dyn VideoFrameProvider>>,
}

impl FrameRequestManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules an animation frame callback and returns its handle.
    pub fn schedule(&mut self, callback: FrameRequestCallback) -> Result<i32, HandlesExhausted> {
        self.callbacks.schedule(callback)
    }

    /// Cancels a pending animation frame callback. Returns false when no
    /// entry was pending under `handle`, recording the cancellation instead.
    pub fn cancel(&mut self, handle: i32) -> bool {
        self.callbacks.cancel(handle)
    }

    /// Whether `handle` was canceled after the current batch was taken.
    pub fn is_canceled(&self, handle: i32) -> bool {
        self.callbacks.is_canceled(handle)
    }

    /// Registers `provider` to run its video frame callbacks on the next
    /// tick. Registration is by identity and idempotent.
    pub fn observe_video_frames(&mut self, provider: Rc<dyn VideoFrameProvider>) {
        if self
            .video_frame_providers
            .iter()
            .any(|registered| Rc::ptr_eq(registered, &provider))
        {
            return;
        }
        self.video_frame_providers.push(provider);
    }

    /// Unregisters `provider`. Returns whether it was registered.
    pub fn unobserve_video_frames(&mut self, provider: &Rc<dyn VideoFrameProvider>) -> bool {
        let registered = self.video_frame_providers.len();
        self.video_frame_providers
            .retain(|candidate| !Rc::ptr_eq(candidate, provider));
        self.video_frame_providers.len() != registered
    }

    /// Removes and returns the current batch of animation frame callbacks.
    pub fn take(&mut self) -> Vec<CallbackEntry<FrameRequestCallback, i32>> {
        self.callbacks.take()
    }

    /// Removes and returns the providers registered for this tick.
    pub fn take_video_frame_providers(&mut self) -> Vec<Rc<dyn VideoFrameProvider>> {
        mem::take(&mut self.video_frame_providers)
    }

    /// Whether neither callbacks nor video frame providers are pending.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty() && self.video_frame_providers.is_empty()
    }

    /// Drops everything scheduled without invoking it.
    pub fn unlink(&mut self) {
        self.callbacks.unlink();
        self.video_frame_providers.clear();
    }
}

impl MallocSizeOf for FrameRequestManager {
    fn size_of(&self, ops: &mut MallocSizeOfOps) -> usize {
        self.callbacks.size_of(ops) + self.video_frame_providers.shallow_size_of(ops)
    }
}

/// The per-context owner of a [`FrameRequestManager`]. It services
/// `requestAnimationFrame` and `cancelAnimationFrame` for script and runs
/// one batch of callbacks whenever the external tick source (the refresh
/// driver, or a test harness) delivers a tick.
///
/// Callbacks run with the manager's borrow released, so they are free to
/// schedule and cancel further callbacks on this same provider. Whatever
/// they schedule lands in the next tick's batch.
///
/// <https://html.spec.whatwg.org/multipage/#animation-frames>
#[derive(Default)]
pub struct AnimationFrameProvider {
    manager: RefCell<FrameRequestManager>,
}

impl AnimationFrameProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// <https://html.spec.whatwg.org/multipage/#dom-animationframeprovider-requestanimationframe>
    pub fn request_animation_frame(
        &self,
        callback: FrameRequestCallback,
    ) -> Result<i32, HandlesExhausted> {
        self.manager.borrow_mut().schedule(callback)
    }

    /// <https://html.spec.whatwg.org/multipage/#dom-animationframeprovider-cancelanimationframe>
    pub fn cancel_animation_frame(&self, handle: i32) -> bool {
        self.manager.borrow_mut().cancel(handle)
    }

    /// Registers `provider` to run its video frame callbacks on the next
    /// tick. Hosts call this every time one of their video frame callbacks
    /// is requested; registering an already registered provider is a no-op.
    pub fn observe_video_frames(&self, provider: Rc<dyn VideoFrameProvider>) {
        self.manager.borrow_mut().observe_video_frames(provider);
    }

    /// Unregisters `provider`. Returns whether it was registered.
    pub fn unobserve_video_frames(&self, provider: &Rc<dyn VideoFrameProvider>) -> bool {
        self.manager.borrow_mut().unobserve_video_frames(provider)
    }

    /// Runs one tick's worth of callbacks. `now` is the tick timestamp in
    /// milliseconds.
    ///
    /// Both batches are drained up front, so anything scheduled while they
    /// run goes to the next tick, while cancellations landing mid-batch
    /// still suppress entries of the current batch that have not run yet.
    pub fn run_frame_callbacks(&self, now: f64) {
        let (providers, entries) = {
            let mut manager = self.manager.borrow_mut();
            (manager.take_video_frame_providers(), manager.take())
        };
        debug!(
            "Running {} video frame providers and {} animation frame callbacks",
            providers.len(),
            entries.len()
        );

        // Video frame callbacks run before animation frame callbacks.
        // <https://wicg.github.io/video-rvfc/#video-frame-request-callbacks>
        for provider in providers {
            if provider.run_video_frame_callbacks(now) {
                self.manager.borrow_mut().observe_video_frames(provider);
            }
        }

        for entry in entries {
            // The cancellation may have arrived after the batch was taken,
            // including from a callback that already ran this tick.
            if self.manager.borrow().is_canceled(entry.handle) {
                trace!("Skipping canceled animation frame callback {}", entry.handle);
                continue;
            }
            (entry.callback)(now);
        }
    }

    /// Whether another tick is needed. The tick source polls this to decide
    /// whether to keep this provider on its observer list.
    pub fn has_pending_callbacks(&self) -> bool {
        !self.manager.borrow().is_empty()
    }

    /// Tears the provider down, dropping every pending callback without
    /// invoking it and unregistering every video frame provider. Called when
    /// the owning context is discarded.
    pub fn unlink(&self) {
        debug!("Unlinking frame request callbacks");
        self.manager.borrow_mut().unlink();
    }
}

impl MallocSizeOf for AnimationFrameProvider {
    fn size_of(&self, ops: &mut MallocSizeOfOps) -> usize {
        self.manager.borrow().size_of(ops)
    }
}
