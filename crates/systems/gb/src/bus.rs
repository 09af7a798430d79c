//! DMG memory bus
//!
//! A flat 64KB address space with two pieces of cartridge behaviour on top:
//!
//! ```text
//! $0000-$00FF  Boot ROM while mapped, zero RAM afterwards
//! $0100-$80FF  Cartridge image bytes 0..$7FFF (read-only once mapped, no banking)
//! $8100-$FFFF  Plain RAM (WRAM, OAM, I/O, HRAM, IE)
//! $FF50        Boot ROM disable (any non-zero write)
//! ```
//!
//! The cartridge image is placed with its first byte at the $0100 entry
//! point, so a program assembled from image offset 0 starts executing there.
//! I/O registers have no side effects beyond $FF50; IE and IF are plain bytes
//! the engine reads to decide when to leave low-power mode.

use crate::bootrom::{Bootrom, BOOTROM_SIZE};
use crate::cartridge::Cartridge;
use dmg_core::logging::{log, LogCategory, LogLevel};
use dmg_core::memory::{AddressSpace, Memory};
use std::ops::RangeInclusive;

/// Boot ROM disable register
pub const BOOT_OFF_ADDR: u16 = 0xFF50;
/// Address the first cartridge byte is copied to
pub const CARTRIDGE_BASE: u16 = 0x0100;

pub struct DmgBus {
    space: AddressSpace,
    /// Bytes hidden under the boot ROM
    shadowed: Option<[u8; BOOTROM_SIZE]>,
    /// Addresses holding cartridge bytes, when writes to them are dropped
    rom_protected: Option<RangeInclusive<u16>>,
}

impl Default for DmgBus {
    fn default() -> Self {
        Self::new()
    }
}

impl DmgBus {
    pub fn new() -> Self {
        Self {
            space: AddressSpace::new(),
            shadowed: None,
            rom_protected: None,
        }
    }

    /// Zero all memory and forget any mapping
    pub fn clear(&mut self) {
        self.space.clear();
        self.shadowed = None;
        self.rom_protected = None;
    }

    /// Copy the first 32KB of the cartridge to $0100, truncated at $FFFF
    pub fn map_cartridge(&mut self, cart: &Cartridge, read_only: bool) {
        let copied = self.space.load(CARTRIDGE_BASE, cart.mapped());
        self.rom_protected = if read_only && copied > 0 {
            Some(CARTRIDGE_BASE..=CARTRIDGE_BASE + (copied - 1) as u16)
        } else {
            None
        };
        log(LogCategory::Memory, LogLevel::Debug, || {
            format!(
                "cartridge mapped at {:04X}-{:04X}",
                CARTRIDGE_BASE,
                CARTRIDGE_BASE as usize + copied.saturating_sub(1)
            )
        });
    }

    /// Overlay the boot ROM at $0000, keeping what was there for $FF50
    pub fn map_bootrom(&mut self, bootrom: &Bootrom) {
        let mut under = [0u8; BOOTROM_SIZE];
        under.copy_from_slice(self.space.slice(0x0000, BOOTROM_SIZE));
        self.shadowed = Some(under);
        self.space.load(0x0000, bootrom.bytes());
    }

    pub fn bootrom_mapped(&self) -> bool {
        self.shadowed.is_some()
    }

    /// Whether a write to `addr` would be dropped
    pub fn is_protected(&self, addr: u16) -> bool {
        self.rom_protected
            .as_ref()
            .map_or(false, |range| range.contains(&addr))
    }

    pub fn space(&self) -> &AddressSpace {
        &self.space
    }

    pub fn space_mut(&mut self) -> &mut AddressSpace {
        &mut self.space
    }

    fn unmap_bootrom(&mut self) {
        if let Some(under) = self.shadowed.take() {
            self.space.load(0x0000, &under);
            log(LogCategory::Memory, LogLevel::Debug, || {
                "boot ROM unmapped".to_string()
            });
        }
    }
}

impl Memory for DmgBus {
    fn read(&self, addr: u16) -> u8 {
        self.space.read(addr)
    }

    fn write(&mut self, addr: u16, val: u8) {
        if self.is_protected(addr) {
            log(LogCategory::Memory, LogLevel::Trace, || {
                format!("dropped ROM write {:02X} -> {:04X}", val, addr)
            });
            return;
        }
        if addr == BOOT_OFF_ADDR && val != 0 {
            self.unmap_bootrom();
        }
        self.space.write(addr, val);
    }
}
