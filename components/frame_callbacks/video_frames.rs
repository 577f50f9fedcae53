/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use malloc_size_of::{MallocSizeOf, MallocSizeOfOps};
use malloc_size_of_derive::MallocSizeOf;
use serde::{Deserialize, Serialize};

use crate::registry::{CallbackEntry, CallbackRegistry, HandlesExhausted};

/// A callback scheduled through [`VideoFrameRequestManager::schedule`].
/// Receives the tick timestamp in milliseconds and the metadata of the most
/// recently presented video frame.
pub type VideoFrameRequestCallback = Box<dyn FnOnce(f64, &VideoFrameCallbackMetadata) + 'static>;

/// Description of a presented video frame, handed to every video frame
/// callback.
///
/// <https://wicg.github.io/video-rvfc/#video-frame-callback-metadata>
#[derive(Clone, Copy, Debug, Deserialize, MallocSizeOf, PartialEq, Serialize)]
pub struct VideoFrameCallbackMetadata {
    /// When the frame was submitted for composition, in milliseconds.
    pub presentation_time: f64,
    /// When the compositor expects the frame to be visible, in milliseconds.
    pub expected_display_time: f64,
    /// Width of the frame in media pixels.
    pub width: u32,
    /// Height of the frame in media pixels.
    pub height: u32,
    /// Media presentation timestamp of the frame, in seconds.
    pub media_time: f64,
    /// Total number of frames submitted for composition so far. Allows
    /// callers to detect skipped frames between callbacks.
    pub presented_frames: u32,
    /// Time spent decoding the frame, in seconds. Only present when the
    /// pipeline exposes it.
    pub processing_duration: Option<f64>,
    /// When the frame was captured, in milliseconds. WebRTC sources only.
    pub capture_time: Option<f64>,
    /// When the encoded frame was received, in milliseconds. WebRTC
    /// sources only.
    pub receive_time: Option<f64>,
    /// The RTP timestamp of the encoded frame. WebRTC sources only.
    pub rtp_timestamp: Option<u32>,
}

/// A host of video frame callbacks, typically a media element. While it has
/// callbacks pending, the host keeps itself registered with its context's
/// [`AnimationFrameProvider`](crate::AnimationFrameProvider), which calls
/// back into it once per tick.
pub trait VideoFrameProvider {
    /// Runs whatever video frame callbacks are due on this tick. Hosts check
    /// [`VideoFrameRequestManager::is_canceled`] for each taken entry before
    /// invoking it. Returns true to stay registered for the next tick.
    fn run_video_frame_callbacks(&self, now: f64) -> bool;
}

/// The pending video frame callbacks of a single host.
///
/// <https://wicg.github.io/video-rvfc/#dom-htmlvideoelement-requestvideoframecallback>
#[derive(Default)]
pub struct VideoFrameRequestManager {
    callbacks: CallbackRegistry<VideoFrameRequestCallback, u32>,
}

impl VideoFrameRequestManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a video frame callback and returns its handle.
    pub fn schedule(
        &mut self,
        callback: VideoFrameRequestCallback,
    ) -> Result<u32, HandlesExhausted> {
        self.callbacks.schedule(callback)
    }

    /// Cancels a pending video frame callback. Returns false when no entry
    /// was pending under `handle`, recording the cancellation instead.
    pub fn cancel(&mut self, handle: u32) -> bool {
        self.callbacks.cancel(handle)
    }

    /// Whether `handle` was canceled after the current batch was taken.
    pub fn is_canceled(&self, handle: u32) -> bool {
        self.callbacks.is_canceled(handle)
    }

    /// Removes and returns the current batch of video frame callbacks.
    pub fn take(&mut self) -> Vec<CallbackEntry<VideoFrameRequestCallback, u32>> {
        self.callbacks.take()
    }

    /// Whether no callbacks are pending.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Drops every pending callback without invoking it.
    pub fn unlink(&mut self) {
        self.callbacks.unlink();
    }
}

impl MallocSizeOf for VideoFrameRequestManager {
    fn size_of(&self, ops: &mut MallocSizeOfOps) -> usize {
        self.callbacks.size_of(ops)
    }
}
