//! Contract between the host runtime and the emulation core.
//!
//! The core is an external collaborator: it interprets instructions and
//! emulates the PPU/APU, while this crate only paces it in real time and
//! moves its output to the platform. Everything the host needs from a core
//! is captured by the [`Core`] trait.
use std::path::Path;

use anyhow::Result;

use crate::save::TitlePreferences;

/// Receives output emitted by the core from within [`Core::run_one_step`].
pub trait StepSink {
    /// A complete video frame in packed 15-bit color,
    /// [`crate::common::constants::FRAME_PITCH`] pixels per row.
    fn video_frame(&mut self, frame: &[u16]);

    /// One fixed-length chunk of interleaved stereo `i16` samples.
    fn audio_chunk(&mut self, samples: &[i16]);
}

/// The emulation core as seen by the host runtime.
///
/// `run_one_step` advances the core by one internal unit of work; a single
/// pacing iteration calls it repeatedly until at least one video frame and
/// one audio chunk have been emitted. All other methods are only called
/// while the emulation thread is held at an iteration boundary.
pub trait Core {
    fn load_rom(&mut self, path: &Path) -> Result<()>;

    fn reset(&mut self);

    /// The 4-character game code embedded in the ROM header.
    fn game_code(&self) -> [u8; 4];

    /// View of cartridge save memory, sized to the maximum supported
    /// geometry and erased to `0xFF` while untouched.
    fn save_memory(&self) -> &[u8];

    /// Configures save hardware, RTC and address mirroring for the loaded
    /// title. Called once per load, before the first step.
    fn apply_preferences(&mut self, prefs: &TitlePreferences);

    /// Latest joypad state as a 10-bit logical button mask.
    fn set_keys(&mut self, keys: u16);

    /// Latest ambient light reading for titles with a solar sensor.
    fn set_darkness(&mut self, darkness: u8);

    fn run_one_step(&mut self, sink: &mut dyn StepSink);

    /// Serializes the full core state into `buffer`, returning the number
    /// of bytes written, or `None` if the buffer is too small.
    fn write_full_state(&mut self, buffer: &mut [u8]) -> Option<usize>;

    /// Restores the full core state from `buffer`. Returns false when the
    /// core rejects the snapshot; the core state is unchanged in that case.
    fn read_full_state(&mut self, buffer: &[u8]) -> bool;

    /// Loads the battery image from `path` into save memory. Returns false
    /// when the file is missing or unreadable.
    fn read_battery_file(&mut self, path: &Path) -> bool;

    /// Persists the battery image to `path`.
    fn write_battery_file(&mut self, path: &Path) -> bool;
}
