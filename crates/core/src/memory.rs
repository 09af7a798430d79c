//! Address space for the LR35902 core.
//!
//! The CPU sees a flat 16-bit address space. [`AddressSpace`] is the base
//! layer: 64KiB of plain bytes where every address is readable and writable.
//! Anything that needs to intercept ranges (cartridge mappers, I/O registers,
//! a bootrom overlay) implements [`Memory`] itself and forwards the rest to an
//! `AddressSpace`.

/// Memory interface seen by the CPU core
pub trait Memory {
    /// Read a byte from memory
    fn read(&self, addr: u16) -> u8;

    /// Write a byte to memory
    fn write(&mut self, addr: u16, val: u8);

    /// Read a little-endian word (low byte at `addr`)
    fn read_word(&self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Write a little-endian word (low byte at `addr`)
    fn write_word(&mut self, addr: u16, val: u16) {
        self.write(addr, val as u8);
        self.write(addr.wrapping_add(1), (val >> 8) as u8);
    }
}

/// Size of the CPU address space in bytes
pub const ADDRESS_SPACE_SIZE: usize = 0x10000;

/// Flat 64KiB memory with unconditional read/write
#[derive(Clone)]
pub struct AddressSpace {
    bytes: Box<[u8]>,
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSpace")
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl AddressSpace {
    /// Create a zero-filled address space
    pub fn new() -> Self {
        Self {
            bytes: vec![0; ADDRESS_SPACE_SIZE].into_boxed_slice(),
        }
    }

    /// Copy `data` into memory starting at `offset`.
    ///
    /// Bytes that would land past 0xFFFF are dropped. Returns the number of
    /// bytes actually copied.
    pub fn load(&mut self, offset: u16, data: &[u8]) -> usize {
        let start = offset as usize;
        let len = data.len().min(ADDRESS_SPACE_SIZE - start);
        self.bytes[start..start + len].copy_from_slice(&data[..len]);
        len
    }

    /// Borrow a range of memory, clamped to the end of the address space
    pub fn slice(&self, offset: u16, len: usize) -> &[u8] {
        let start = offset as usize;
        let end = (start + len).min(ADDRESS_SPACE_SIZE);
        &self.bytes[start..end]
    }

    /// Zero every byte
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }
}

impl Memory for AddressSpace {
    #[inline]
    fn read(&self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }

    #[inline]
    fn write(&mut self, addr: u16, val: u8) {
        self.bytes[addr as usize] = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_address_is_writable() {
        let mut mem = AddressSpace::new();
        mem.write(0x0000, 0x11);
        mem.write(0xFFFF, 0x22);
        assert_eq!(mem.read(0x0000), 0x11);
        assert_eq!(mem.read(0xFFFF), 0x22);
    }

    #[test]
    fn test_word_access_is_little_endian() {
        let mut mem = AddressSpace::new();
        mem.write_word(0xC000, 0x1234);
        assert_eq!(mem.read(0xC000), 0x34);
        assert_eq!(mem.read(0xC001), 0x12);
        assert_eq!(mem.read_word(0xC000), 0x1234);
    }

    #[test]
    fn test_word_access_wraps_at_top() {
        let mut mem = AddressSpace::new();
        mem.write_word(0xFFFF, 0xABCD);
        assert_eq!(mem.read(0xFFFF), 0xCD);
        assert_eq!(mem.read(0x0000), 0xAB);
    }

    #[test]
    fn test_load_truncates_at_end() {
        let mut mem = AddressSpace::new();
        let copied = mem.load(0xFFFE, &[1, 2, 3, 4]);
        assert_eq!(copied, 2);
        assert_eq!(mem.slice(0xFFFE, 2), &[1, 2]);
        assert_eq!(mem.read(0x0000), 0);
    }
}
