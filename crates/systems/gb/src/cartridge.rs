//! Cartridge images
//!
//! Only the header is interpreted. The first 32KB of the image is copied into
//! the address space starting at $0100 (see [`crate::bus`]); there is no bank
//! switching, so anything past that is never visible to the CPU.
//!
//! # Header fields (image offsets)
//!
//! ```text
//! $0134-$0141  Title (NUL padded)
//! $0143        CGB flag ($80 = CGB enhanced)
//! $0144-$0145  New licensee code
//! $0146        SGB flag ($03 = SGB functions)
//! $0147        Cartridge type
//! ```

use crate::DmgError;
use dmg_core::logging::{log, LogCategory, LogLevel};
use serde::Serialize;

/// Smallest accepted image (two 16KB banks)
pub const MIN_ROM_SIZE: usize = 0x8000;
/// Largest accepted image (2MB)
pub const MAX_ROM_SIZE: usize = 0x200000;
/// Bytes mapped into the address space
pub const MAPPED_ROM_SIZE: usize = 0x8000;

const TITLE: std::ops::Range<usize> = 0x0134..0x0142;
const CGB_FLAG: usize = 0x0143;
const LICENSEE: usize = 0x0144;
const SGB_FLAG: usize = 0x0146;
const CART_TYPE: usize = 0x0147;

#[derive(Debug, Clone)]
pub struct Cartridge {
    rom: Vec<u8>,
}

/// Decoded header, for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartridgeHeader {
    pub title: String,
    pub cgb: bool,
    pub sgb: bool,
    pub licensee: String,
    pub cartridge_type: u8,
    pub rom_size: usize,
}

impl Cartridge {
    pub fn from_bytes(rom: Vec<u8>) -> Result<Self, DmgError> {
        if rom.len() < MIN_ROM_SIZE {
            return Err(DmgError::RomTooSmall(rom.len()));
        }
        if rom.len() > MAX_ROM_SIZE {
            return Err(DmgError::RomTooLarge(rom.len()));
        }
        if rom.len() > MAPPED_ROM_SIZE {
            log(LogCategory::Loader, LogLevel::Warn, || {
                format!(
                    "cartridge is {} bytes; only the first {} are mapped",
                    rom.len(),
                    MAPPED_ROM_SIZE
                )
            });
        }
        Ok(Self { rom })
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    /// The part of the image the CPU can see
    pub fn mapped(&self) -> &[u8] {
        &self.rom[..MAPPED_ROM_SIZE]
    }

    pub fn title(&self) -> String {
        let raw = &self.rom[TITLE];
        let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }

    pub fn is_cgb(&self) -> bool {
        self.rom[CGB_FLAG] == 0x80
    }

    pub fn licensee_code(&self) -> [u8; 2] {
        [self.rom[LICENSEE], self.rom[LICENSEE + 1]]
    }

    pub fn is_sgb(&self) -> bool {
        self.rom[SGB_FLAG] == 0x03
    }

    pub fn cartridge_type(&self) -> u8 {
        self.rom[CART_TYPE]
    }

    pub fn header(&self) -> CartridgeHeader {
        CartridgeHeader {
            title: self.title(),
            cgb: self.is_cgb(),
            sgb: self.is_sgb(),
            licensee: String::from_utf8_lossy(&self.licensee_code()).into_owned(),
            cartridge_type: self.cartridge_type(),
            rom_size: self.rom.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_header() -> Vec<u8> {
        let mut rom = vec![0; MIN_ROM_SIZE];
        rom[0x0134..0x0134 + 6].copy_from_slice(b"TETRIS");
        rom[CGB_FLAG] = 0x80;
        rom[LICENSEE] = b'0';
        rom[LICENSEE + 1] = b'1';
        rom[SGB_FLAG] = 0x03;
        rom[CART_TYPE] = 0x01;
        rom
    }

    #[test]
    fn test_header_fields() {
        let cart = Cartridge::from_bytes(rom_with_header()).unwrap();
        assert_eq!(cart.title(), "TETRIS");
        assert!(cart.is_cgb());
        assert!(cart.is_sgb());
        assert_eq!(cart.licensee_code(), [b'0', b'1']);
        assert_eq!(cart.cartridge_type(), 0x01);

        let header = cart.header();
        assert_eq!(header.licensee, "01");
        assert_eq!(header.rom_size, MIN_ROM_SIZE);
    }

    #[test]
    fn test_plain_header() {
        let cart = Cartridge::from_bytes(vec![0; MIN_ROM_SIZE]).unwrap();
        assert_eq!(cart.title(), "");
        assert!(!cart.is_cgb());
        assert!(!cart.is_sgb());
    }

    #[test]
    fn test_full_width_title() {
        let mut rom = vec![0; MIN_ROM_SIZE];
        rom[TITLE].copy_from_slice(b"ABCDEFGHIJKLMN");
        let cart = Cartridge::from_bytes(rom).unwrap();
        assert_eq!(cart.title(), "ABCDEFGHIJKLMN");
    }

    #[test]
    fn test_size_limits() {
        assert!(matches!(
            Cartridge::from_bytes(vec![0; MIN_ROM_SIZE - 1]),
            Err(DmgError::RomTooSmall(0x7FFF))
        ));
        assert!(matches!(
            Cartridge::from_bytes(vec![0; MAX_ROM_SIZE + 1]),
            Err(DmgError::RomTooLarge(_))
        ));
        assert!(Cartridge::from_bytes(vec![0; MAX_ROM_SIZE]).is_ok());
    }

    #[test]
    fn test_only_first_32k_mapped() {
        let mut rom = vec![0; 0x10000];
        rom[0x8000] = 0xAA;
        let cart = Cartridge::from_bytes(rom).unwrap();
        assert_eq!(cart.mapped().len(), MAPPED_ROM_SIZE);
        assert_eq!(cart.rom().len(), 0x10000);
    }
}
