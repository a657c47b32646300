//! Cartridge save memory classification and per-title overrides.
//!
//! The heuristic inspects the battery image once per loaded title: the
//! erased-memory sentinel is `0xFF`, so the smallest candidate region that
//! contains data while everything past it is still erased names the save
//! geometry. Titles the heuristic cannot classify are looked up in a
//! database keyed by the game code in the ROM header.
use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::common::constants::EEPROM_512_SIZE;
use crate::common::constants::EEPROM_8K_SIZE;
use crate::common::constants::FLASH_128K_SIZE;
use crate::common::constants::FLASH_64K_SIZE;
use crate::common::constants::SAVE_IMAGE_SIZE;

/// Value of erased save memory.
pub const ERASED_BYTE: u8 = 0xFF;

/// Save geometry detected from the battery image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
pub enum SaveType {
    /// Nothing recognizable; callers keep the default flash geometry.
    #[default]
    #[strum(serialize = "none")]
    None,
    #[strum(serialize = "eeprom 512b")]
    Eeprom512,
    #[strum(serialize = "eeprom 8kb")]
    Eeprom8k,
    #[strum(serialize = "flash 64kb")]
    Flash64k,
    #[strum(serialize = "flash 128kb")]
    Flash128k,
}

impl SaveType {
    pub fn size(&self) -> Option<usize> {
        match self {
            SaveType::None => None,
            SaveType::Eeprom512 => Some(EEPROM_512_SIZE),
            SaveType::Eeprom8k => Some(EEPROM_8K_SIZE),
            SaveType::Flash64k => Some(FLASH_64K_SIZE),
            SaveType::Flash128k => Some(FLASH_128K_SIZE),
        }
    }
}

/// Candidate geometries in strictly ascending order. The predicate below
/// is exclusive between sizes, so the first match wins.
const CANDIDATES: [SaveType; 4] = [
    SaveType::Eeprom512,
    SaveType::Eeprom8k,
    SaveType::Flash64k,
    SaveType::Flash128k,
];

fn contains_data(region: &[u8]) -> bool {
    region.iter().any(|&byte| byte != ERASED_BYTE)
}

/// Classifies a battery image by its smallest populated region.
///
/// A candidate size R matches iff `[0, R)` contains at least one
/// non-erased byte and `[R, end)` is entirely erased.
pub fn classify_save_memory(image: &[u8]) -> SaveType {
    for candidate in CANDIDATES {
        let size = candidate.size().unwrap_or(0);
        if size > image.len() {
            break;
        }
        if contains_data(&image[..size]) && !contains_data(&image[size..]) {
            return candidate;
        }
    }
    SaveType::None
}

/// A fully erased battery image at the maximum supported geometry, for
/// core implementations to start from.
pub fn erased_save_image() -> Vec<u8> {
    vec![ERASED_BYTE; SAVE_IMAGE_SIZE]
}

/// Save hardware forced by a title override, in the core's own terms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
pub enum ForcedSaveType {
    /// Let the core pick based on the detected geometry.
    #[default]
    Auto,
    Eeprom,
    Sram,
    Flash,
    EepromWithSensor,
    NoSave,
}

/// Everything the core needs to configure save hardware and peripherals
/// for one title. Computed once at load time and immutable afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TitlePreferences {
    pub forced_save: ForcedSaveType,
    /// Heuristic result; [`SaveType::None`] when an override was applied
    /// or nothing matched.
    pub detected: SaveType,
    pub flash_size: usize,
    pub rtc: bool,
    pub mirroring: bool,
}

impl Default for TitlePreferences {
    fn default() -> Self {
        Self {
            forced_save: ForcedSaveType::Auto,
            detected: SaveType::None,
            flash_size: FLASH_64K_SIZE,
            rtc: false,
            mirroring: false,
        }
    }
}

impl TitlePreferences {
    /// Preferences derived from the save memory heuristic alone.
    pub fn from_detected(detected: SaveType) -> Self {
        let flash_size = match detected {
            SaveType::Flash64k | SaveType::Flash128k => detected.size().unwrap_or(FLASH_64K_SIZE),
            _ => FLASH_64K_SIZE,
        };
        Self {
            forced_save: ForcedSaveType::Auto,
            detected,
            flash_size,
            rtc: false,
            mirroring: false,
        }
    }
}

struct TitleOverride {
    code: &'static str,
    flash_size: usize,
    save: ForcedSaveType,
    rtc: bool,
    mirroring: bool,
}

const fn ov(
    code: &'static str,
    flash_size: usize,
    save: ForcedSaveType,
    rtc: bool,
    mirroring: bool,
) -> TitleOverride {
    TitleOverride {
        code,
        flash_size,
        save,
        rtc,
        mirroring,
    }
}

/// Titles whose save hardware cannot be derived from the battery image.
/// A flash size of 0 means "keep the default".
static TITLE_OVERRIDES: &[TitleOverride] = &[
    // 2 Games in 1 - Dragon Ball Z - The Legacy of Goku I & II (USA)
    ov("BLFE", 0, ForcedSaveType::Eeprom, false, false),
    // Boktai - The Sun Is in Your Hand (Europe)
    ov("U3IP", 0, ForcedSaveType::Auto, true, false),
    // Boktai - The Sun Is in Your Hand (USA)
    ov("U3IE", 0, ForcedSaveType::Auto, true, false),
    // Boktai 2 - Solar Boy Django (USA)
    ov("U32E", 0, ForcedSaveType::Auto, true, false),
    // Boktai 2 - Solar Boy Django (Europe)
    ov("U32P", 0, ForcedSaveType::Auto, true, false),
    // Bokura no Taiyou - Taiyou Action RPG (Japan)
    ov("U3IJ", 0, ForcedSaveType::Auto, true, false),
    // Card e-Reader+ (Japan)
    ov("PSAJ", FLASH_128K_SIZE, ForcedSaveType::Auto, false, false),
    // Classic NES Series - Bomberman (USA, Europe)
    ov("FBME", 0, ForcedSaveType::Eeprom, false, true),
    // Classic NES Series - Castlevania (USA, Europe)
    ov("FADE", 0, ForcedSaveType::Eeprom, false, true),
    // Classic NES Series - Legend of Zelda (USA, Europe)
    ov("FZLE", 0, ForcedSaveType::Eeprom, false, true),
    // Classic NES Series - Metroid (USA, Europe)
    ov("FMRE", 0, ForcedSaveType::Eeprom, false, true),
    // Classic NES Series - Super Mario Bros. (USA, Europe)
    ov("FSME", 0, ForcedSaveType::Eeprom, false, true),
    // Dragon Ball Z - The Legacy of Goku (USA)
    ov("ALGE", FLASH_128K_SIZE, ForcedSaveType::Eeprom, false, false),
    // e-Reader (USA)
    ov("PSAE", FLASH_128K_SIZE, ForcedSaveType::Auto, false, false),
    // Famicom Mini Vol. 01 - Super Mario Bros. (Japan)
    ov("FMBJ", 0, ForcedSaveType::Eeprom, false, true),
    // Game Boy Wars Advance 1+2 (Japan)
    ov("BGWJ", FLASH_128K_SIZE, ForcedSaveType::Auto, false, false),
    // Golden Sun - The Lost Age (USA)
    ov("AGFE", FLASH_64K_SIZE, ForcedSaveType::Auto, false, true),
    // Golden Sun (USA)
    ov("AGSE", FLASH_64K_SIZE, ForcedSaveType::Auto, false, true),
    // Iridion II (USA)
    ov("AI2E", 0, ForcedSaveType::NoSave, false, false),
    // Koro Koro Puzzle - Happy Panechu! (Japan)
    ov("KHPJ", 0, ForcedSaveType::EepromWithSensor, false, false),
    // Mario vs. Donkey Kong (Europe)
    ov("BM5P", 0, ForcedSaveType::Flash, false, false),
    // Pocket Monsters - Emerald (Japan)
    ov("BPEJ", FLASH_128K_SIZE, ForcedSaveType::Auto, true, false),
    // Pocket Monsters - Ruby (Japan)
    ov("AXVJ", FLASH_128K_SIZE, ForcedSaveType::Auto, true, false),
    // Pokemon - Emerald Version (USA, Europe)
    ov("BPEE", FLASH_128K_SIZE, ForcedSaveType::Auto, true, false),
    // Pokemon - Fire Red Version (USA, Europe)
    ov("BPRE", FLASH_128K_SIZE, ForcedSaveType::Auto, false, false),
    // Pokemon - Leaf Green Version (USA, Europe)
    ov("BPGE", FLASH_128K_SIZE, ForcedSaveType::Auto, false, false),
    // Pokemon - Ruby Version (USA, Europe)
    ov("AXVE", FLASH_128K_SIZE, ForcedSaveType::Auto, true, false),
    // Pokemon - Sapphire Version (USA, Europe)
    ov("AXPE", FLASH_128K_SIZE, ForcedSaveType::Auto, true, false),
    // Pokemon Mystery Dungeon - Red Rescue Team (USA, Australia)
    ov("B24E", FLASH_128K_SIZE, ForcedSaveType::Auto, false, false),
    // Rockman EXE 4.5 - Real Operation (Japan)
    ov("BR4J", 0, ForcedSaveType::Auto, true, false),
    // Shin Bokura no Taiyou - Gyakushuu no Sabata (Japan)
    ov("U33J", 0, ForcedSaveType::Eeprom, true, false),
    // Super Mario Advance 4 - Super Mario Bros 3 v1.1 (USA)
    ov("AX4E", FLASH_128K_SIZE, ForcedSaveType::Auto, false, false),
    // Top Gun - Combat Zones (USA)
    ov("A2YE", 0, ForcedSaveType::NoSave, false, false),
    // Yoshi's Universal Gravitation (Europe)
    ov("KYGP", 0, ForcedSaveType::EepromWithSensor, false, false),
    // Yoshi - Topsy-Turvy (USA)
    ov("KYGE", 0, ForcedSaveType::Eeprom, false, false),
    // Yu-Gi-Oh! GX - Duel Academy (USA)
    ov("BYGE", 0, ForcedSaveType::Sram, false, false),
    // Zoku Bokura no Taiyou - Taiyou Shounen Django (Japan)
    ov("U32J", 0, ForcedSaveType::Auto, true, false),
];

lazy_static! {
    static ref OVERRIDES_BY_CODE: HashMap<&'static str, &'static TitleOverride> = TITLE_OVERRIDES
        .iter()
        .map(|entry| (entry.code, entry))
        .collect();
}

/// Looks up the override for a game code. When present, the returned
/// preferences fully replace the heuristic result.
pub fn title_override(game_code: [u8; 4]) -> Option<TitlePreferences> {
    let code = std::str::from_utf8(&game_code).ok()?;
    OVERRIDES_BY_CODE.get(code).map(|entry| TitlePreferences {
        forced_save: entry.save,
        detected: SaveType::None,
        flash_size: if entry.flash_size != 0 {
            entry.flash_size
        } else {
            FLASH_64K_SIZE
        },
        rtc: entry.rtc,
        mirroring: entry.mirroring,
    })
}
