//! Battery image and save-state file I/O.
//!
//! Both artifacts live next to the ROM, named by swapping the file
//! extension. Battery files are owned by the core and loaded/saved through
//! it; save states are opaque blobs whose size is negotiated once per
//! session and enforced on every read and write afterwards.
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::ensure;
use anyhow::Context;
use anyhow::Result;
use log::info;
use log::warn;

use crate::common::constants::STATE_SCRATCH_SIZE;
use crate::core::Core;

pub fn battery_path(rom_path: &Path) -> PathBuf {
    rom_path.with_extension("sav")
}

pub fn state_path(rom_path: &Path) -> PathBuf {
    rom_path.with_extension("ram")
}

/// Fixes the serialized state size for the rest of the session by asking
/// the core to serialize into a scratch buffer and recording the result.
pub fn negotiate_state_size(core: &mut dyn Core) -> Result<usize> {
    let mut scratch = vec![0u8; STATE_SCRATCH_SIZE];
    match core.write_full_state(&mut scratch) {
        Some(size) => Ok(size),
        None => bail!("core failed to serialize into a {STATE_SCRATCH_SIZE} byte scratch buffer"),
    }
}

/// Serializes the core into a scratch buffer of the negotiated size and
/// writes it to disk as one whole file.
pub fn save_state(core: &mut dyn Core, path: &Path, state_size: usize) -> Result<()> {
    let mut buffer = vec![0u8; state_size];
    let written = core
        .write_full_state(&mut buffer)
        .context("core failed to serialize state")?;
    ensure!(
        written == state_size,
        "state size changed: expected {state_size} bytes, core wrote {written}"
    );
    fs::write(path, &buffer).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote save state {}", path.display());
    Ok(())
}

/// Reads a state file of exactly the negotiated size and hands it to the
/// core. A short file or a rejected snapshot leaves the core untouched.
pub fn load_state(core: &mut dyn Core, path: &Path, state_size: usize) -> Result<()> {
    let buffer = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    ensure!(
        buffer.len() == state_size,
        "save state {} is {} bytes, expected {state_size}",
        path.display(),
        buffer.len()
    );
    ensure!(
        core.read_full_state(&buffer),
        "core rejected save state {}",
        path.display()
    );
    info!("loaded save state {}", path.display());
    Ok(())
}

/// Loads the battery image for `rom_path`. A missing or unreadable file
/// means a fresh cartridge, not an error.
pub fn load_battery(core: &mut dyn Core, rom_path: &Path) -> bool {
    let path = battery_path(rom_path);
    let loaded = core.read_battery_file(&path);
    if loaded {
        info!("loaded battery image {}", path.display());
    }
    loaded
}

/// Persists the battery image for `rom_path`. Failures are reported but
/// never block the caller; unload and shutdown proceed regardless.
pub fn save_battery(core: &mut dyn Core, rom_path: &Path) -> bool {
    let path = battery_path(rom_path);
    let written = core.write_battery_file(&path);
    if written {
        info!("wrote battery image {}", path.display());
    } else {
        warn!("failed to write battery image {}", path.display());
    }
    written
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_path_derivation() {
        assert_eq!(
            battery_path(Path::new("/games/boktai.gba")),
            PathBuf::from("/games/boktai.sav")
        );
        assert_eq!(
            state_path(Path::new("/games/boktai.gba")),
            PathBuf::from("/games/boktai.ram")
        );
        // A ROM without an extension gains one.
        assert_eq!(
            state_path(Path::new("/games/boktai")),
            PathBuf::from("/games/boktai.ram")
        );
    }
}
