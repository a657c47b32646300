//! Frame pacing for the emulation thread.
//!
//! One iteration reads the latest input snapshot, drives the core until it
//! has produced at least one video frame and one audio chunk, then sleeps
//! off the remainder of a fixed per-frame budget. There is no smoothing or
//! catch-up across iterations: under sustained overload the clock simply
//! drifts, one iteration at a time.
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use crate::audio::AudioBufferPool;
use crate::audio::AudioOut;
use crate::common::constants::FRAME_DURATION;
use crate::core::Core;
use crate::core::StepSink;
use crate::sensor;
use crate::sync::VideoSync;
use crate::RuntimeState;
use crate::Session;
use crate::Shared;

/// Computes the sleep that pads one iteration out to the native frame
/// interval.
pub struct Pacer {
    target: Duration,
}

impl Pacer {
    pub fn new() -> Self {
        Self {
            target: FRAME_DURATION,
        }
    }

    /// Remaining budget for this iteration, or `None` when the iteration
    /// already ran over or the unthrottle input is held.
    pub fn sleep_budget(&self, elapsed: Duration, unthrottled: bool) -> Option<Duration> {
        if unthrottled || elapsed >= self.target {
            return None;
        }
        Some(self.target - elapsed)
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes core output to the synchronizer and the audio pool, counting
/// what arrived during the current step burst.
struct HostSink<'a> {
    video: &'a VideoSync,
    pool: &'a mut AudioBufferPool,
    out: &'a mut dyn AudioOut,
    video_frames: u64,
    audio_chunks: u64,
}

impl StepSink for HostSink<'_> {
    fn video_frame(&mut self, frame: &[u16]) {
        self.video.publish(frame);
        self.video_frames += 1;
    }

    fn audio_chunk(&mut self, samples: &[i16]) {
        self.pool.publish(samples, self.out);
        self.audio_chunks += 1;
    }
}

/// Advances the core until the burst has emitted at least one video frame
/// and one audio chunk. Returns the number of video frames published.
pub(crate) fn run_frame(
    core: &mut dyn Core,
    video: &VideoSync,
    pool: &mut AudioBufferPool,
    out: &mut dyn AudioOut,
) -> u64 {
    let mut sink = HostSink {
        video,
        pool,
        out,
        video_frames: 0,
        audio_chunks: 0,
    };
    while sink.video_frames == 0 || sink.audio_chunks == 0 {
        core.run_one_step(&mut sink);
    }
    sink.video_frames
}

/// Body of the emulation thread. Checks the shared running flag at the top
/// of every iteration; the render thread joins on this loop before tearing
/// down any platform resource.
pub(crate) fn emulation_loop<C: Core>(shared: &Shared<C>) {
    let pacer = Pacer::new();
    while shared.running.load(Ordering::Acquire) {
        let start = Instant::now();
        let physical = shared.input.read();

        let unthrottled;
        {
            let mut session = shared.session.lock().unwrap();
            unthrottled = session.button_map.unthrottle_held(physical);
            if session.state == RuntimeState::Running {
                let keys = session.button_map.remap(physical);
                let darkness = sensor::darkness_byte(session.sensor.as_ref());
                let Session {
                    core,
                    audio_pool,
                    audio_out,
                    video_frames,
                    ..
                } = &mut *session;
                core.set_keys(keys);
                core.set_darkness(darkness);
                *video_frames += run_frame(core, &shared.video, audio_pool, audio_out.as_mut());
            }
        }

        if let Some(budget) = pacer.sleep_budget(start.elapsed(), unthrottled) {
            thread::sleep(budget);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use anyhow::Result;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::constants::AUDIO_CHUNK_SAMPLES;
    use crate::common::constants::FRAME_PIXELS;
    use crate::save::TitlePreferences;
    use crate::sync::VideoFrame;

    #[test]
    fn test_sleep_budget_pads_fast_iterations() {
        let pacer = Pacer::new();
        let elapsed = Duration::from_millis(4);
        let budget = pacer.sleep_budget(elapsed, false).unwrap();
        assert_eq!(budget, FRAME_DURATION - elapsed);
    }

    #[test]
    fn test_no_sleep_when_over_budget() {
        let pacer = Pacer::new();
        assert_eq!(pacer.sleep_budget(FRAME_DURATION, false), None);
        assert_eq!(
            pacer.sleep_budget(FRAME_DURATION + Duration::from_millis(3), false),
            None
        );
    }

    #[test]
    fn test_no_sleep_while_unthrottled() {
        let pacer = Pacer::new();
        assert_eq!(pacer.sleep_budget(Duration::ZERO, true), None);
        assert_eq!(pacer.sleep_budget(FRAME_DURATION * 2, true), None);
    }

    /// Emits a video frame every `video_interval` steps and an audio chunk
    /// every `audio_interval` steps.
    struct StubCore {
        steps: u64,
        video_interval: u64,
        audio_interval: u64,
    }

    impl StubCore {
        fn new(video_interval: u64, audio_interval: u64) -> Self {
            Self {
                steps: 0,
                video_interval,
                audio_interval,
            }
        }
    }

    impl Core for StubCore {
        fn load_rom(&mut self, _path: &Path) -> Result<()> {
            Ok(())
        }
        fn reset(&mut self) {}
        fn game_code(&self) -> [u8; 4] {
            *b"TEST"
        }
        fn save_memory(&self) -> &[u8] {
            &[]
        }
        fn apply_preferences(&mut self, _prefs: &TitlePreferences) {}
        fn set_keys(&mut self, _keys: u16) {}
        fn set_darkness(&mut self, _darkness: u8) {}
        fn run_one_step(&mut self, sink: &mut dyn StepSink) {
            self.steps += 1;
            if self.steps % self.video_interval == 0 {
                sink.video_frame(&vec![0x7FFF; FRAME_PIXELS]);
            }
            if self.steps % self.audio_interval == 0 {
                sink.audio_chunk(&vec![0; AUDIO_CHUNK_SAMPLES]);
            }
        }
        fn write_full_state(&mut self, _buffer: &mut [u8]) -> Option<usize> {
            Some(0)
        }
        fn read_full_state(&mut self, _buffer: &[u8]) -> bool {
            true
        }
        fn read_battery_file(&mut self, _path: &Path) -> bool {
            false
        }
        fn write_battery_file(&mut self, _path: &Path) -> bool {
            true
        }
    }

    /// Never in flight; counts submissions.
    #[derive(Default)]
    struct CountingOut {
        submitted: usize,
    }

    impl AudioOut for CountingOut {
        fn slot_in_flight(&self, _slot: usize) -> bool {
            false
        }
        fn submit(&mut self, _slot: usize, _samples: &[i16]) {
            self.submitted += 1;
        }
    }

    #[test]
    fn test_burst_runs_until_video_and_audio() {
        let mut core = StubCore::new(3, 5);
        let video = VideoSync::new();
        let mut pool = AudioBufferPool::new(2);
        let mut out = CountingOut::default();

        let frames = run_frame(&mut core, &video, &mut pool, &mut out);

        // Video arrives on step 3, audio on step 5; the burst stops there.
        assert_eq!(core.steps, 5);
        assert_eq!(frames, 1);
        assert_eq!(out.submitted, 1);

        let mut consumed = VideoFrame::default();
        video.consume_into(&mut consumed);
        assert!(consumed.pixels().iter().all(|&p| p == 0x7FFF));
    }

    #[test]
    fn test_burst_may_publish_multiple_frames() {
        // Audio lags video: two frames are published before the first
        // audio chunk completes the burst.
        let mut core = StubCore::new(2, 5);
        let video = VideoSync::new();
        let mut pool = AudioBufferPool::new(2);
        let mut out = CountingOut::default();

        let frames = run_frame(&mut core, &video, &mut pool, &mut out);
        assert_eq!(core.steps, 5);
        assert_eq!(frames, 2);
    }
}
