//! Hardware constants of the emulated console and fixed host buffer sizes.
use std::time::Duration;

/// Visible display resolution.
pub const SCREEN_WIDTH: usize = 240;
pub const SCREEN_HEIGHT: usize = 160;

/// The core renders scanlines into a 256 pixel wide buffer; only the first
/// [`SCREEN_WIDTH`] columns of each row are visible.
pub const FRAME_PITCH: usize = 256;

/// Number of `u16` pixels in one transfer buffer.
pub const FRAME_PIXELS: usize = FRAME_PITCH * SCREEN_HEIGHT;

/// Exact native frame rate of the emulated hardware.
pub const NATIVE_FRAME_RATE: f64 = 59.826_098_288_080_8;

/// Wall-clock budget for one pacing iteration.
pub const FRAME_DURATION: Duration = Duration::from_nanos((1e9 / NATIVE_FRAME_RATE) as u64);

pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Stereo sample frames in one audio chunk emitted by the core.
pub const AUDIO_CHUNK_FRAMES: usize = AUDIO_SAMPLE_RATE as usize / 20;

/// Interleaved `i16` samples in one audio chunk.
pub const AUDIO_CHUNK_SAMPLES: usize = AUDIO_CHUNK_FRAMES * 2;

/// Number of slots in the audio output pool.
pub const AUDIO_SLOT_COUNT: usize = 6;

/// Supported cartridge save geometries, ascending.
pub const EEPROM_512_SIZE: usize = 512;
pub const EEPROM_8K_SIZE: usize = 0x2000;
pub const FLASH_64K_SIZE: usize = 0x10000;
pub const FLASH_128K_SIZE: usize = 0x20000;

/// The save image covers the largest flash plus the largest EEPROM geometry.
pub const SAVE_IMAGE_SIZE: usize = FLASH_128K_SIZE + EEPROM_8K_SIZE;

/// Scratch buffer size used to negotiate the serialized core state size.
pub const STATE_SCRATCH_SIZE: usize = 2_000_000;
