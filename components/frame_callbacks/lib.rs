/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

//! Bookkeeping for frame request callbacks.
//!
//! This crate provides the cancelable, insertion-ordered callback registries
//! behind `requestAnimationFrame` and `requestVideoFrameCallback`, together
//! with the per-context [`AnimationFrameProvider`] that an external tick
//! source (the refresh driver, or a test harness) drives once per frame.
//!
//! The registries never invoke anything themselves. They hand out numeric
//! handles, keep the scheduled callbacks in schedule order, and let the
//! dispatch loop drain one batch per tick while cancellations can keep
//! arriving, even from callbacks running in the current batch.
//!
//! <https://html.spec.whatwg.org/multipage/#animation-frames>
//! <https://wicg.github.io/video-rvfc/>

mod animation_frames;
mod registry;
mod video_frames;

pub use animation_frames::{AnimationFrameProvider, FrameRequestCallback, FrameRequestManager};
pub use registry::{CallbackEntry, CallbackHandle, CallbackRegistry, HandlesExhausted};
pub use video_frames::{
    VideoFrameCallbackMetadata, VideoFrameProvider, VideoFrameRequestCallback,
    VideoFrameRequestManager,
};
