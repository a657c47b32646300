//! Cross-thread exchange of the latest video frame and input snapshot.
//!
//! Both directions have latest-wins semantics: an unconsumed value is
//! silently replaced when a newer one arrives, and a consumer may read the
//! same value twice. Each side has its own lock, held only for a
//! fixed-size copy, and the two locks are never nested.
use std::sync::Mutex;

use crate::common::constants::FRAME_PIXELS;

/// Fixed-size packed-pixel raster holding one complete video frame.
#[derive(Clone)]
pub struct VideoFrame {
    pixels: Vec<u16>,
}

impl Default for VideoFrame {
    fn default() -> Self {
        Self {
            pixels: vec![0; FRAME_PIXELS],
        }
    }
}

impl VideoFrame {
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }
}

/// Hands the most recently published frame from the emulation thread to
/// the render thread.
pub struct VideoSync {
    frame: Mutex<VideoFrame>,
}

impl VideoSync {
    pub fn new() -> Self {
        Self {
            frame: Mutex::new(VideoFrame::default()),
        }
    }

    /// Called by the emulation thread once per emitted frame. Overwrites
    /// the stored frame unconditionally; a frame the render thread never
    /// picked up is dropped.
    pub fn publish(&self, frame: &[u16]) {
        let mut stored = self.frame.lock().unwrap();
        stored.pixels.copy_from_slice(&frame[..FRAME_PIXELS]);
    }

    /// Called by the render thread each display tick. Copies out whatever
    /// is stored, whether or not it was already consumed.
    pub fn consume_into(&self, dst: &mut VideoFrame) {
        let stored = self.frame.lock().unwrap();
        dst.pixels.copy_from_slice(&stored.pixels);
    }
}

impl Default for VideoSync {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands the most recently polled physical key mask from the render
/// thread to the emulation thread.
pub struct InputSync {
    keys: Mutex<u32>,
}

impl InputSync {
    pub fn new() -> Self {
        Self { keys: Mutex::new(0) }
    }

    pub fn publish(&self, keys: u32) {
        *self.keys.lock().unwrap() = keys;
    }

    pub fn read(&self) -> u32 {
        *self.keys.lock().unwrap()
    }
}

impl Default for InputSync {
    fn default() -> Self {
        Self::new()
    }
}
