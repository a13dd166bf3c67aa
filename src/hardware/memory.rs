// License below.
//! Provides the physical memory map, the RAM banks with their per-word
//! flag sidecar, and the address cache that short-circuits MMU walks.
#![warn(missing_docs)]

use std::collections::HashMap;
use byteorder::{ByteOrder, LittleEndian};


/// Address of the first byte of the boot ROM.
pub const BOOT_ROM_FIRST: u32 = 0x00000000;

/// Address of the last byte of the boot ROM.
pub const BOOT_ROM_LAST: u32 = 0x0007FFFF;

/// Length of the boot ROM in bytes.
pub const BOOT_ROM_LEN: u32 = (BOOT_ROM_LAST + 1) - BOOT_ROM_FIRST;

/// Address of the first byte of the raw NAND window (classic hardware).
pub const NAND_RAW_FIRST: u32 = 0x08000000;

/// Address of the last byte of the raw NAND window.
pub const NAND_RAW_LAST: u32 = 0x080FFFFF;

/// Address of the first byte of SDRAM.
pub const SDRAM_FIRST: u32 = 0x10000000;

/// Largest supported SDRAM size (the manuf-data encoding caps at 64 MiB).
pub const SDRAM_MAX_LEN: u32 = 0x04000000;

/// Address of the first byte of the NAND controller window.
pub const NAND_CTL_FIRST: u32 = 0x81000000;

/// Address of the last byte of the NAND controller window.
pub const NAND_CTL_LAST: u32 = 0x81FFFFFF;

/// Address of the first byte of on-chip SRAM.
pub const SRAM_FIRST: u32 = 0xA4000000;

/// Address of the last byte of on-chip SRAM.
pub const SRAM_LAST: u32 = 0xA401FFFF;

/// Length of the on-chip SRAM in bytes.
pub const SRAM_LEN: u32 = (SRAM_LAST + 1) - SRAM_FIRST;

/// Address of the first byte of the interrupt controller.
pub const INTC_FIRST: u32 = 0xDC000000;

/// Address of the last byte of the interrupt controller.
pub const INTC_LAST: u32 = 0xDC000FFF;


/// Execution breakpoint set on this word.
pub const RF_EXEC_BREAKPOINT: u32 = 1 << 0;

/// The debugger wants control back when this word is reached.
pub const RF_EXEC_DEBUG_NEXT: u32 = 1 << 1;

/// A translated block starts at this word (translation backend only).
pub const RF_CODE_TRANSLATED: u32 = 1 << 2;

/// This word must never be translated (translation backend only).
pub const RF_CODE_NO_TRANSLATE: u32 = 1 << 3;

/// The firmware loader wants a callback when this word executes.
pub const RF_ARMLOADER_CB: u32 = 1 << 4;

/// An execution hack is patched over this word.
pub const RF_EXEC_HACK: u32 = 1 << 5;


/// Maps global physical addresses to bank-local addresses.
pub enum PhysicalAddress {
    /// Boot ROM, read-only.
    BootRom(u32),
    /// Raw NAND window; the full address is kept as its layout matters.
    NandRaw(u32),
    /// SDRAM.
    Sdram(u32),
    /// NAND controller window; offset keeps the decode-relevant bits.
    NandCtl(u32),
    /// On-chip SRAM.
    Sram(u32),
    /// Interrupt controller registers.
    Intc(u32),
    /// Not part of the memory map.
    Invalid(u32),
}

impl PhysicalAddress {
    /// Converts a global physical address to a bank-local address.
    pub fn from_u32(p: u32) -> PhysicalAddress {
        match p {
            BOOT_ROM_FIRST..=BOOT_ROM_LAST => PhysicalAddress::BootRom(p - BOOT_ROM_FIRST),
            NAND_RAW_FIRST..=NAND_RAW_LAST => PhysicalAddress::NandRaw(p),
            SDRAM_FIRST..=0x13FFFFFF       => PhysicalAddress::Sdram(p - SDRAM_FIRST),
            NAND_CTL_FIRST..=NAND_CTL_LAST => PhysicalAddress::NandCtl(p - NAND_CTL_FIRST),
            SRAM_FIRST..=SRAM_LAST         => PhysicalAddress::Sram(p - SRAM_FIRST),
            INTC_FIRST..=INTC_LAST         => PhysicalAddress::Intc(p - INTC_FIRST),
            _ => PhysicalAddress::Invalid(p),
        }
    }
}


/// The RAM-backed part of the machine: boot ROM, SDRAM, and SRAM.
///
/// Each bank carries a parallel array of flag words, one per instruction
/// word, used for breakpoints and for the contracts of the (external)
/// translation backend. The flags are not architectural state.
pub struct MemoryBanks {
    rom: Vec<u8>,
    rom_flags: Vec<u32>,
    sdram: Vec<u8>,
    sdram_flags: Vec<u32>,
    sram: Vec<u8>,
    sram_flags: Vec<u32>,
}

impl MemoryBanks {
    /// Allocates zeroed banks with the given SDRAM size.
    pub fn new(sdram_len: u32) -> MemoryBanks {
        let sdram_len = sdram_len.min(SDRAM_MAX_LEN) as usize;
        MemoryBanks {
            rom: vec![0; BOOT_ROM_LEN as usize],
            rom_flags: vec![0; BOOT_ROM_LEN as usize / 4],
            sdram: vec![0; sdram_len],
            sdram_flags: vec![0; sdram_len / 4],
            sram: vec![0; SRAM_LEN as usize],
            sram_flags: vec![0; SRAM_LEN as usize / 4],
        }
    }

    /// Copies a boot ROM image into the ROM bank.
    pub fn load_boot_rom(&mut self, image: &[u8]) {
        let n = image.len().min(self.rom.len());
        self.rom[..n].copy_from_slice(&image[..n]);
    }

    fn locate(&self, p: u32) -> Option<(&[u8], usize)> {
        match PhysicalAddress::from_u32(p) {
            PhysicalAddress::BootRom(off) => Some((&self.rom[..], off as usize)),
            PhysicalAddress::Sdram(off) if (off as usize) < self.sdram.len() =>
                Some((&self.sdram[..], off as usize)),
            PhysicalAddress::Sram(off) => Some((&self.sram[..], off as usize)),
            _ => None,
        }
    }

    fn locate_mut(&mut self, p: u32) -> Option<(&mut [u8], usize)> {
        match PhysicalAddress::from_u32(p) {
            // Stores into the boot ROM are dropped by the bus before
            // getting here; the bank itself is only written by the loader.
            PhysicalAddress::BootRom(off) => Some((&mut self.rom[..], off as usize)),
            PhysicalAddress::Sdram(off) if (off as usize) < self.sdram.len() =>
                Some((&mut self.sdram[..], off as usize)),
            PhysicalAddress::Sram(off) => Some((&mut self.sram[..], off as usize)),
            _ => None,
        }
    }

    fn locate_flags(&self, p: u32) -> Option<(&[u32], usize)> {
        match PhysicalAddress::from_u32(p) {
            PhysicalAddress::BootRom(off) => Some((&self.rom_flags[..], off as usize / 4)),
            PhysicalAddress::Sdram(off) if (off as usize) < self.sdram.len() =>
                Some((&self.sdram_flags[..], off as usize / 4)),
            PhysicalAddress::Sram(off) => Some((&self.sram_flags[..], off as usize / 4)),
            _ => None,
        }
    }

    /// Whether the given physical range is entirely RAM-backed.
    pub fn is_ram(&self, p: u32, len: u32) -> bool {
        match self.locate(p) {
            Some((bank, off)) => off + len as usize <= bank.len(),
            None => false,
        }
    }

    /// A mutable view of RAM for device DMA.
    pub fn ram_slice_mut(&mut self, p: u32, len: u32) -> Option<&mut [u8]> {
        let (bank, off) = self.locate_mut(p)?;
        bank.get_mut(off..off + len as usize)
    }

    /// Reads a word; the address is rounded down to alignment.
    pub fn read_word(&self, p: u32) -> Option<u32> {
        let (bank, off) = self.locate(p & !3)?;
        if off + 4 > bank.len() { return None; }
        Some(LittleEndian::read_u32(&bank[off..]))
    }

    /// Reads a halfword; the address is rounded down to alignment.
    pub fn read_half(&self, p: u32) -> Option<u16> {
        let (bank, off) = self.locate(p & !1)?;
        if off + 2 > bank.len() { return None; }
        Some(LittleEndian::read_u16(&bank[off..]))
    }

    /// Reads a byte.
    pub fn read_byte(&self, p: u32) -> Option<u8> {
        let (bank, off) = self.locate(p)?;
        bank.get(off).copied()
    }

    /// Writes a word; the address is rounded down to alignment.
    pub fn write_word(&mut self, p: u32, data: u32) -> bool {
        match self.locate_mut(p & !3) {
            Some((bank, off)) if off + 4 <= bank.len() => {
                LittleEndian::write_u32(&mut bank[off..], data);
                true
            }
            _ => false,
        }
    }

    /// Writes a halfword; the address is rounded down to alignment.
    pub fn write_half(&mut self, p: u32, data: u16) -> bool {
        match self.locate_mut(p & !1) {
            Some((bank, off)) if off + 2 <= bank.len() => {
                LittleEndian::write_u16(&mut bank[off..], data);
                true
            }
            _ => false,
        }
    }

    /// Writes a byte.
    pub fn write_byte(&mut self, p: u32, data: u8) -> bool {
        match self.locate_mut(p) {
            Some((bank, off)) if off < bank.len() => { bank[off] = data; true }
            _ => false,
        }
    }

    /// The RAM flags of the word containing the given physical address.
    pub fn flags(&self, p: u32) -> u32 {
        match self.locate_flags(p) {
            Some((flags, idx)) => flags.get(idx).copied().unwrap_or(0),
            None => 0,
        }
    }

    /// Sets RAM-flag bits on the word containing the given address.
    pub fn set_flags(&mut self, p: u32, bits: u32) {
        match PhysicalAddress::from_u32(p) {
            PhysicalAddress::BootRom(off) => {
                if let Some(f) = self.rom_flags.get_mut(off as usize / 4) { *f |= bits; }
            }
            PhysicalAddress::Sdram(off) => {
                if let Some(f) = self.sdram_flags.get_mut(off as usize / 4) { *f |= bits; }
            }
            PhysicalAddress::Sram(off) => {
                if let Some(f) = self.sram_flags.get_mut(off as usize / 4) { *f |= bits; }
            }
            _ => {}
        }
    }

    /// Clears RAM-flag bits on the word containing the given address.
    pub fn clear_flags(&mut self, p: u32, bits: u32) {
        match PhysicalAddress::from_u32(p) {
            PhysicalAddress::BootRom(off) => {
                if let Some(f) = self.rom_flags.get_mut(off as usize / 4) { *f &= !bits; }
            }
            PhysicalAddress::Sdram(off) => {
                if let Some(f) = self.sdram_flags.get_mut(off as usize / 4) { *f &= !bits; }
            }
            PhysicalAddress::Sram(off) => {
                if let Some(f) = self.sram_flags.get_mut(off as usize / 4) { *f &= !bits; }
            }
            _ => {}
        }
    }

    /// Fetches an instruction word together with its RAM flags.
    ///
    /// Returns `None` if the address is not RAM-backed, which the loops
    /// treat as a bad PC.
    pub fn fetch(&self, p: u32) -> Option<(u32, u32)> {
        let word = self.read_word(p)?;
        Some((word, self.flags(p)))
    }
}


/// How an address will be accessed; distinct cache entries per kind.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AccessKind {
    /// Instruction fetch or data load.
    Read = 0,
    /// Data store.
    Write = 1,
}

/// Granularity of the address cache: 1 KiB chunks.
const CACHE_PAGE_SHIFT: u32 = 10;

/// Caches virtual-to-physical translations of RAM-backed chunks.
///
/// Conceptually a direct-mapped table keyed by (virtual page, access
/// kind) with a miss sentinel; represented as a sparse map, which the
/// contract explicitly allows. Only correctness after invalidation is
/// observable: any CP15 or mode change that may affect translations or
/// permissions flushes the whole cache.
pub struct AddressCache {
    map: HashMap<(u32, AccessKind), u32>,
}

impl AddressCache {
    /// Creates an empty cache.
    pub fn new() -> AddressCache {
        AddressCache { map: HashMap::new() }
    }

    /// Looks up the physical address for `va`, if cached.
    pub fn lookup(&self, va: u32, kind: AccessKind) -> Option<u32> {
        let base = self.map.get(&(va >> CACHE_PAGE_SHIFT, kind))?;
        Some(base | (va & ((1 << CACHE_PAGE_SHIFT) - 1)))
    }

    /// Records a translation for the chunk containing `va`.
    ///
    /// Only RAM-backed translations may be inserted; device addresses
    /// must take the slow path every time, as their reads have side
    /// effects.
    pub fn insert(&mut self, va: u32, kind: AccessKind, pa: u32) {
        let mask = (1u32 << CACHE_PAGE_SHIFT) - 1;
        self.map.insert((va >> CACHE_PAGE_SHIFT, kind), pa & !mask);
    }

    /// Drops every cached translation.
    pub fn flush(&mut self) {
        self.map.clear();
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banks_read_back_writes() {
        let mut mem = MemoryBanks::new(0x100000);
        assert!(mem.write_word(SDRAM_FIRST + 0x40, 0xDEADBEEF));
        assert_eq!(mem.read_word(SDRAM_FIRST + 0x40), Some(0xDEADBEEF));
        assert_eq!(mem.read_half(SDRAM_FIRST + 0x42), Some(0xDEAD));
        assert_eq!(mem.read_byte(SDRAM_FIRST + 0x43), Some(0xDE));
        assert!(mem.write_byte(SRAM_FIRST + 1, 0x5A));
        assert_eq!(mem.read_byte(SRAM_FIRST + 1), Some(0x5A));
    }

    #[test]
    fn out_of_map_addresses_are_rejected() {
        let mut mem = MemoryBanks::new(0x100000);
        assert_eq!(mem.read_word(0x20000000), None);
        assert!(!mem.write_word(0x14000000, 0));
        assert!(!mem.is_ram(SDRAM_FIRST + 0xFFFFC, 8));
    }

    #[test]
    fn flags_are_per_word() {
        let mut mem = MemoryBanks::new(0x100000);
        mem.set_flags(SDRAM_FIRST + 0x101, RF_EXEC_BREAKPOINT);
        assert_eq!(mem.flags(SDRAM_FIRST + 0x100), RF_EXEC_BREAKPOINT);
        assert_eq!(mem.flags(SDRAM_FIRST + 0x104), 0);
        mem.clear_flags(SDRAM_FIRST + 0x103, RF_EXEC_BREAKPOINT);
        assert_eq!(mem.flags(SDRAM_FIRST + 0x100), 0);
    }

    #[test]
    fn cache_hits_only_after_insert_and_not_after_flush() {
        let mut cache = AddressCache::new();
        assert_eq!(cache.lookup(0x9400, AccessKind::Read), None);
        cache.insert(0x9400, AccessKind::Read, SDRAM_FIRST + 0x9400);
        assert_eq!(cache.lookup(0x95FC, AccessKind::Read), Some(SDRAM_FIRST + 0x95FC));
        assert_eq!(cache.lookup(0x9400, AccessKind::Write), None);
        cache.flush();
        assert_eq!(cache.lookup(0x9400, AccessKind::Read), None);
    }
}


/*
Licensed to the Apache Software Foundation (ASF) under one
or more contributor license agreements.  See the NOTICE file
distributed with this work for additional information
regarding copyright ownership.  The ASF licenses this file
to you under the Apache License, Version 2.0 (the
"License"); you may not use this file except in compliance
with the License.  You may obtain a copy of the License at

  http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing,
software distributed under the License is distributed on an
"AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
KIND, either express or implied.  See the License for the
specific language governing permissions and limitations
under the License.
*/
