//! Scripted core and platform stand-ins for runtime integration tests.
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use agb_host::audio::AudioOut;
use agb_host::common::constants::AUDIO_CHUNK_SAMPLES;
use agb_host::common::constants::FRAME_PIXELS;
use agb_host::core::Core;
use agb_host::core::StepSink;
use agb_host::save::erased_save_image;
use agb_host::save::TitlePreferences;
use anyhow::bail;
use anyhow::Result;

/// Size of the fake core's serialized state blob.
pub const FAKE_STATE_SIZE: usize = 4096;

/// A core whose observable behavior is fully scripted: it emits a solid
/// frame every third step and an audio chunk every fifth, serializes its
/// state as `FAKE_STATE_SIZE` copies of one byte, and records every call
/// the host makes.
pub struct FakeCore {
    pub game_code: [u8; 4],
    pub save_memory: Vec<u8>,
    pub rom_path: Option<PathBuf>,
    pub applied_preferences: Option<TitlePreferences>,
    pub keys: u16,
    pub darkness: u8,
    pub state_word: u8,
    pub reject_state_loads: bool,
    pub fail_battery_writes: bool,
    pub battery_reads: Vec<PathBuf>,
    pub battery_writes: Vec<PathBuf>,
    pub frame_color: u16,
    steps: u64,
}

impl Default for FakeCore {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCore {
    pub fn new() -> Self {
        Self {
            game_code: *b"ZZZZ",
            save_memory: erased_save_image(),
            rom_path: None,
            applied_preferences: None,
            keys: 0,
            darkness: 0,
            state_word: 0xA5,
            reject_state_loads: false,
            fail_battery_writes: false,
            battery_reads: Vec::new(),
            battery_writes: Vec::new(),
            frame_color: 0x1234,
            steps: 0,
        }
    }
}

impl Core for FakeCore {
    fn load_rom(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            bail!("no such rom: {}", path.display());
        }
        self.rom_path = Some(path.to_path_buf());
        Ok(())
    }

    fn reset(&mut self) {}

    fn game_code(&self) -> [u8; 4] {
        self.game_code
    }

    fn save_memory(&self) -> &[u8] {
        &self.save_memory
    }

    fn apply_preferences(&mut self, prefs: &TitlePreferences) {
        self.applied_preferences = Some(*prefs);
    }

    fn set_keys(&mut self, keys: u16) {
        self.keys = keys;
    }

    fn set_darkness(&mut self, darkness: u8) {
        self.darkness = darkness;
    }

    fn run_one_step(&mut self, sink: &mut dyn StepSink) {
        self.steps += 1;
        if self.steps % 3 == 0 {
            sink.video_frame(&vec![self.frame_color; FRAME_PIXELS]);
        }
        if self.steps % 5 == 0 {
            sink.audio_chunk(&vec![0; AUDIO_CHUNK_SAMPLES]);
        }
    }

    fn write_full_state(&mut self, buffer: &mut [u8]) -> Option<usize> {
        if buffer.len() < FAKE_STATE_SIZE {
            return None;
        }
        buffer[..FAKE_STATE_SIZE].fill(self.state_word);
        Some(FAKE_STATE_SIZE)
    }

    fn read_full_state(&mut self, buffer: &[u8]) -> bool {
        if self.reject_state_loads || buffer.len() != FAKE_STATE_SIZE {
            return false;
        }
        let word = buffer[0];
        if buffer.iter().any(|&byte| byte != word) {
            return false;
        }
        self.state_word = word;
        true
    }

    fn read_battery_file(&mut self, path: &Path) -> bool {
        self.battery_reads.push(path.to_path_buf());
        match std::fs::read(path) {
            Ok(data) => {
                let len = data.len().min(self.save_memory.len());
                self.save_memory[..len].copy_from_slice(&data[..len]);
                true
            }
            Err(_) => false,
        }
    }

    fn write_battery_file(&mut self, path: &Path) -> bool {
        self.battery_writes.push(path.to_path_buf());
        if self.fail_battery_writes {
            return false;
        }
        std::fs::write(path, &self.save_memory[..512]).is_ok()
    }
}

/// Audio output that is never busy; submissions are only counted.
#[derive(Default)]
pub struct NullAudioOut {
    submissions: Arc<AtomicU64>,
}

impl NullAudioOut {
    /// Shared submission counter, usable after the output moved into the
    /// runtime.
    pub fn counter(&self) -> Arc<AtomicU64> {
        self.submissions.clone()
    }
}

impl AudioOut for NullAudioOut {
    fn slot_in_flight(&self, _slot: usize) -> bool {
        false
    }

    fn submit(&mut self, _slot: usize, _samples: &[i16]) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
    }
}
