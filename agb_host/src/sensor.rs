//! Ambient light input for titles with a physical solar sensor.
//!
//! The core consumes a "darkness" byte: `0xE8` means complete darkness and
//! lower values mean brighter conditions. Readings are quantized through a
//! fixed step table rather than scaled linearly, matching the step response
//! of the real sensor hardware.

/// Darkness reported in complete darkness and whenever no sensor exists.
pub const MAX_DARKNESS: u8 = 0xE8;

/// Darkness for each brightness decile, darkest first. Quantizes the
/// `0x48..=0xE8` range the sensor titles expect into eleven steps.
const DARKNESS_STEPS: [u8; 11] = [
    0xE8, 0xD8, 0xC8, 0xB8, 0xA8, 0x98, 0x88, 0x78, 0x68, 0x58, 0x48,
];

/// Source of ambient light readings, usually backed by a platform sensor
/// service.
pub trait LightSensor {
    /// Current brightness as a percentage in `0..=100`, or `None` while
    /// the service is unavailable.
    fn brightness_percent(&self) -> Option<u8>;
}

/// Fallback for platforms without a light sensor: always dark.
pub struct NoSensor;

impl LightSensor for NoSensor {
    fn brightness_percent(&self) -> Option<u8> {
        None
    }
}

/// Maps a sensor reading to the darkness byte the core consumes. Service
/// unavailability degrades to maximum darkness, never an error.
pub fn darkness_byte(sensor: &dyn LightSensor) -> u8 {
    match sensor.brightness_percent() {
        Some(percent) => DARKNESS_STEPS[percent.min(100) as usize / 10],
        None => MAX_DARKNESS,
    }
}
