// License below.
//! Implements the physical side of the memory system: dispatching
//! physical addresses to the RAM banks and the memory-mapped devices.
//!
//! Virtual addresses never reach this module; the CPU's accessors
//! translate first and call down here with physical addresses only.
//! Accesses outside the map are logged and read as zero, matching the
//! modelled hardware's tolerant bus.
#![warn(missing_docs)]

use std::rc::Rc;
use super::error::PhxError;
use super::events::EventWord;
use super::flash::NandFlash;
use super::interrupt::InterruptController;
use super::memory::{MemoryBanks, PhysicalAddress};
use super::nandctl::{self, CxNandCtl, PhxNandCtl};


/// The RAM banks and every memory-mapped device.
pub struct Bus {
    /// RAM banks and RAM flags.
    pub mem: MemoryBanks,
    /// The NAND chip.
    pub nand: NandFlash,
    /// The staged-operation controller (classic hardware).
    pub phx: PhxNandCtl,
    /// The interrupt controller.
    pub intc: InterruptController,
    cx: bool,
}

impl Bus {
    /// Wires up the bus for the given hardware generation.
    pub fn new(mem: MemoryBanks, nand: NandFlash, cx: bool, events: Rc<EventWord>) -> Bus {
        Bus {
            mem,
            nand,
            phx: PhxNandCtl::new(),
            intc: InterruptController::new(events),
            cx,
        }
    }

    /// Whether this is the newer (CX) hardware generation.
    pub fn is_cx(&self) -> bool { self.cx }

    /// Reads a byte from physical memory or a device.
    pub fn read_phys_byte(&mut self, pa: u32) -> Result<u8, PhxError> {
        match PhysicalAddress::from_u32(pa) {
            PhysicalAddress::BootRom(_) |
            PhysicalAddress::Sdram(_) |
            PhysicalAddress::Sram(_) => Ok(self.ram_read_byte(pa)),
            PhysicalAddress::NandRaw(addr) if !self.cx =>
                Ok(nandctl::raw_read_byte(&mut self.nand, addr)),
            PhysicalAddress::NandCtl(off) if self.cx =>
                Ok(CxNandCtl::read_byte(&mut self.nand, off)),
            _ => Ok(self.bad_read(pa, 8) as u8),
        }
    }

    /// Reads a halfword from physical memory or a device.
    pub fn read_phys_half(&mut self, pa: u32) -> Result<u16, PhxError> {
        match PhysicalAddress::from_u32(pa) {
            PhysicalAddress::BootRom(_) |
            PhysicalAddress::Sdram(_) |
            PhysicalAddress::Sram(_) => Ok(self.ram_read_half(pa)),
            _ => Ok(self.bad_read(pa, 16) as u16),
        }
    }

    /// Reads a word from physical memory or a device.
    pub fn read_phys_word(&mut self, pa: u32) -> Result<u32, PhxError> {
        match PhysicalAddress::from_u32(pa) {
            PhysicalAddress::BootRom(_) |
            PhysicalAddress::Sdram(_) |
            PhysicalAddress::Sram(_) => Ok(self.ram_read_word(pa)),
            PhysicalAddress::NandCtl(off) => {
                if self.cx {
                    Ok(CxNandCtl::read_word(&mut self.nand, off))
                } else {
                    Ok(self.phx.read_word(off))
                }
            }
            PhysicalAddress::Intc(off) => Ok(self.intc.read_word(off & !3)),
            _ => Ok(self.bad_read(pa, 32)),
        }
    }

    /// Writes a byte to physical memory or a device.
    pub fn write_phys_byte(&mut self, pa: u32, data: u8) -> Result<(), PhxError> {
        match PhysicalAddress::from_u32(pa) {
            PhysicalAddress::BootRom(_) => self.bad_write(pa, data as u32),
            PhysicalAddress::Sdram(_) |
            PhysicalAddress::Sram(_) => {
                if !self.mem.write_byte(pa, data) { self.bad_write(pa, data as u32); }
            }
            PhysicalAddress::NandRaw(addr) if !self.cx =>
                nandctl::raw_write_byte(&mut self.nand, addr, data)?,
            PhysicalAddress::NandCtl(off) if self.cx =>
                CxNandCtl::write_byte(&mut self.nand, off, data)?,
            _ => self.bad_write(pa, data as u32),
        }
        Ok(())
    }

    /// Writes a halfword to physical memory or a device.
    pub fn write_phys_half(&mut self, pa: u32, data: u16) -> Result<(), PhxError> {
        match PhysicalAddress::from_u32(pa) {
            PhysicalAddress::BootRom(_) => self.bad_write(pa, data as u32),
            PhysicalAddress::Sdram(_) |
            PhysicalAddress::Sram(_) => {
                if !self.mem.write_half(pa, data) { self.bad_write(pa, data as u32); }
            }
            _ => self.bad_write(pa, data as u32),
        }
        Ok(())
    }

    /// Writes a word to physical memory or a device.
    pub fn write_phys_word(&mut self, pa: u32, data: u32) -> Result<(), PhxError> {
        match PhysicalAddress::from_u32(pa) {
            PhysicalAddress::BootRom(_) => self.bad_write(pa, data),
            PhysicalAddress::Sdram(_) |
            PhysicalAddress::Sram(_) => {
                if !self.mem.write_word(pa, data) { self.bad_write(pa, data); }
            }
            PhysicalAddress::NandCtl(off) => {
                if self.cx {
                    CxNandCtl::write_word(&mut self.nand, off, data)?;
                } else {
                    let Bus { ref mut phx, ref mut nand, ref mut mem, .. } = *self;
                    phx.write_word(off, data, nand, mem)?;
                }
            }
            PhysicalAddress::Intc(off) => self.intc.write_word(off & !3, data),
            _ => self.bad_write(pa, data),
        }
        Ok(())
    }

    fn ram_read_byte(&self, pa: u32) -> u8 {
        match self.mem.read_byte(pa) {
            Some(b) => b,
            None => self.bad_read(pa, 8) as u8,
        }
    }

    fn ram_read_half(&self, pa: u32) -> u16 {
        match self.mem.read_half(pa) {
            Some(h) => h,
            None => self.bad_read(pa, 16) as u16,
        }
    }

    fn ram_read_word(&self, pa: u32) -> u32 {
        match self.mem.read_word(pa) {
            Some(w) => w,
            None => self.bad_read(pa, 32),
        }
    }

    fn bad_read(&self, pa: u32, bits: u32) -> u32 {
        warn!("Bad read of {} bits at {:#010X}", bits, pa);
        0
    }

    fn bad_write(&self, pa: u32, data: u32) {
        warn!("Bad write at {:#010X} (value {:#010X})", pa, data);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::super::memory::{INTC_FIRST, NAND_CTL_FIRST, SDRAM_FIRST};

    fn bus(cx: bool) -> Bus {
        let events = Rc::new(EventWord::new());
        Bus::new(MemoryBanks::new(0x100000), NandFlash::new(cx), cx, events)
    }

    #[test]
    fn ram_round_trips_through_the_bus() {
        let mut bus = bus(false);
        bus.write_phys_word(SDRAM_FIRST + 8, 0x01020304).unwrap();
        assert_eq!(bus.read_phys_word(SDRAM_FIRST + 8), Ok(0x01020304));
        assert_eq!(bus.read_phys_byte(SDRAM_FIRST + 9), Ok(0x03));
    }

    #[test]
    fn rom_writes_are_dropped() {
        let mut bus = bus(false);
        bus.write_phys_word(0x00000010, 0xFFFFFFFF).unwrap();
        assert_eq!(bus.read_phys_word(0x00000010), Ok(0));
    }

    #[test]
    fn unmapped_reads_return_zero() {
        let mut bus = bus(false);
        assert_eq!(bus.read_phys_word(0x70000000), Ok(0));
    }

    #[test]
    fn generation_selects_the_nand_controller() {
        // The classic controller has a readable status register...
        let mut classic = bus(false);
        assert_eq!(classic.read_phys_word(NAND_CTL_FIRST + 0x34), Ok(0x40));
        // ...which on CX is a data access in command/address space.
        let mut cx = bus(true);
        assert_eq!(cx.read_phys_word(NAND_CTL_FIRST + 0x34), Ok(0));
    }

    #[test]
    fn interrupt_controller_is_word_addressable() {
        let mut bus = bus(true);
        bus.write_phys_word(INTC_FIRST + 0x200, 0xFFFFFFFF).unwrap();
        assert_eq!(bus.read_phys_word(INTC_FIRST + 0x200), Ok(0xFFFFFFFF));
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
