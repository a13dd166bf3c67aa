// License below.
//! Implements the two memory-mapped NAND controller generations.
//!
//! Both are thin façades that translate register accesses into sequences
//! of command/address/data bytes for the chip in `flash.rs`:
//!
//! - The legacy ("phx") controller stages a whole operation in registers
//!   (operation word, address bytes, size, DMA address) and fires it when
//!   1 is written to the begin register. The operation word encodes the
//!   primary command in its low byte, the address-byte count in bits
//!   10..8, the data direction in bit 11, data presence in bit 23, and an
//!   optional confirm command (bit 20, command taken from bits 19..12).
//! - The CX controller encodes the operation in the *address* within its
//!   16 MiB window: bit 19 selects data vs command+address, bits 23..21
//!   give the address-byte count, bits 10..3 the command byte, and bit 20
//!   appends a confirm command from bits 18..11.
//!
//! Classic hardware additionally exposes the chip directly through a raw
//! window, which the boot diagnostics use.
#![warn(missing_docs)]

use byteorder::{ByteOrder, LittleEndian};
use super::error::PhxError;
use super::flash::{ecc_calculate, NandFlash};
use super::memory::MemoryBanks;


/// The legacy staged-operation controller.
pub struct PhxNandCtl {
    operation: u32,
    address: [u8; 7],
    op_size: u32,
    ram_address: u32,
    ecc: u32,
}

impl PhxNandCtl {
    /// Creates a controller with cleared registers.
    pub fn new() -> PhxNandCtl {
        PhxNandCtl {
            operation: 0,
            address: [0; 7],
            op_size: 0,
            ram_address: 0,
            ecc: 0,
        }
    }

    /// Resets the registers and lifts write protection.
    pub fn reset(&mut self, nand: &mut NandFlash) {
        *self = PhxNandCtl::new();
        nand.set_writable(true);
    }

    /// Reads a controller register.
    pub fn read_word(&self, offset: u32) -> u32 {
        match offset & 0x3FFFFFF {
            0x00 => 0,
            0x08 => 0,    // "Operation in progress"
            0x34 => 0x40, // Status: bit 0 = error, bit 6 = ready, bit 7 = writeprot
            0x40 => 1,
            0x44 => self.ecc,
            off => {
                warn!("Bad NAND controller read at offset {:#X}", off);
                0
            }
        }
    }

    /// Writes a controller register, possibly firing the staged operation.
    pub fn write_word(&mut self, offset: u32, value: u32,
                      nand: &mut NandFlash, mem: &mut MemoryBanks)
                      -> Result<(), PhxError> {
        match offset & 0x3FFFFFF {
            0x00 => {}
            0x04 => nand.set_writable(value != 0),
            0x08 => {
                if value != 1 {
                    return Err(PhxError::NandBadBeginValue(value));
                }
                self.begin_operation(nand, mem)?;
            }
            0x0C => self.operation = value,
            0x10 => self.address[0] = value as u8,
            0x14 => self.address[1] = value as u8,
            0x18 => self.address[2] = value as u8,
            0x1C => self.address[3] = value as u8,
            0x20 => {}
            0x24 => self.op_size = value,
            0x28 => self.ram_address = value,
            0x2C => {} // AHB speed divider
            0x30 => {} // APB speed divider
            0x40 | 0x44 | 0x48 | 0x4C | 0x50 | 0x54 => {}
            off => warn!("Bad NAND controller write at offset {:#X} (value {:#010X})", off, value),
        }
        Ok(())
    }

    fn begin_operation(&mut self, nand: &mut NandFlash, mem: &mut MemoryBanks)
                       -> Result<(), PhxError> {
        debug!("NAND controller: op={:#08X} addr={:#010X} size={:#X} raddr={:#010X}",
               self.operation, LittleEndian::read_u32(&self.address[0..4]),
               self.op_size, self.ram_address);

        nand.write_command_byte(self.operation as u8)?;

        for i in 0..(self.operation >> 8 & 7) as usize {
            nand.write_address_byte(self.address[i]);
        }

        if self.operation & 0x400800 != 0 {
            let buf = mem.ram_slice_mut(self.ram_address, self.op_size)
                .ok_or(PhxError::NandDmaOutsideRam(self.ram_address))?;

            if self.operation & 0x000800 != 0 {
                for byte in buf.iter() {
                    nand.write_data_byte(*byte);
                }
            } else {
                for byte in buf.iter_mut() {
                    *byte = nand.read_data_byte();
                }
            }

            if self.op_size >= 0x200 {
                // Latch the page ECC. Images created by an old emulator
                // version carry blank ECC bytes; they get 0xFFFFFF.
                if nand.data()[0x206..0x209] == [0xFF, 0xFF, 0xFF] {
                    self.ecc = 0xFFFFFF;
                } else {
                    self.ecc = ecc_calculate(buf);
                }
            }
        }

        if self.operation & 0x100000 != 0 {
            nand.write_command_byte((self.operation >> 12) as u8)?;
        }
        Ok(())
    }
}


/// Reads the raw classic NAND window.
pub fn raw_read_byte(nand: &mut NandFlash, addr: u32) -> u8 {
    if addr == 0x08000000 {
        return nand.read_data_byte();
    }
    warn!("Bad raw NAND read at {:#010X}", addr);
    0
}

/// Writes the raw classic NAND window.
pub fn raw_write_byte(nand: &mut NandFlash, addr: u32, value: u8) -> Result<(), PhxError> {
    match addr {
        0x08000000 => nand.write_data_byte(value),
        0x08040000 => nand.write_command_byte(value)?,
        0x08080000 => nand.write_address_byte(value),
        _ => warn!("Bad raw NAND write at {:#010X} (value {:#04X})", addr, value),
    }
    Ok(())
}


/// The CX address-decoded controller.
///
/// Offsets below are relative to the start of the 16 MiB window; the
/// decode-relevant bits are unchanged by the rebasing.
pub struct CxNandCtl;

impl CxNandCtl {
    /// Reads one data byte through the window.
    pub fn read_byte(nand: &mut NandFlash, offset: u32) -> u8 {
        if offset & 0x180000 == 0x080000 {
            return nand.read_data_byte();
        }
        warn!("Bad CX NAND read at offset {:#X}", offset);
        0
    }

    /// Reads one data word through the window.
    pub fn read_word(nand: &mut NandFlash, offset: u32) -> u32 {
        if offset & 0x180000 == 0x080000 {
            return nand.read_data_word();
        }
        warn!("Bad CX NAND read at offset {:#X}", offset);
        0
    }

    /// Writes one data byte through the window.
    pub fn write_byte(nand: &mut NandFlash, offset: u32, value: u8) -> Result<(), PhxError> {
        if offset & 0x080000 != 0 {
            nand.write_data_byte(value);
            if offset & 0x100000 != 0 {
                nand.write_command_byte((offset >> 11) as u8)?;
            }
            return Ok(());
        }
        warn!("Bad CX NAND write at offset {:#X} (value {:#04X})", offset, value);
        Ok(())
    }

    /// Writes one word through the window: either data, or a command with
    /// up to four little-endian address bytes.
    pub fn write_word(nand: &mut NandFlash, offset: u32, value: u32) -> Result<(), PhxError> {
        if offset & 0x080000 != 0 {
            nand.write_data_word(value);
        } else {
            let addr_bytes = offset >> 21 & 7;
            if addr_bytes > 4 {
                return Err(PhxError::NandAddressBytes(addr_bytes));
            }
            nand.write_command_byte((offset >> 3) as u8)?;
            let mut value = value;
            for _ in 0..addr_bytes {
                nand.write_address_byte(value as u8);
                value >>= 8;
            }
        }

        if offset & 0x100000 != 0 {
            nand.write_command_byte((offset >> 11) as u8)?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::super::memory::SDRAM_FIRST;

    #[test]
    fn phx_staged_page_read_dmas_into_ram_and_latches_ecc() {
        let mut nand = NandFlash::new(false);
        let mut mem = MemoryBanks::new(0x100000);
        let mut ctl = PhxNandCtl::new();
        ctl.reset(&mut nand);

        // Give page 0 recognizable content with non-blank ECC bytes.
        nand.write_command_byte(0x80).unwrap();
        for _ in 0..3 { nand.write_address_byte(0); }
        for i in 0..0x210 { nand.write_data_byte((i % 251) as u8); }
        nand.write_command_byte(0x10).unwrap();

        let ram = SDRAM_FIRST + 0x1000;
        ctl.write_word(0x0C, 0x400000 | 3 << 8 | 0x00, &mut nand, &mut mem).unwrap();
        ctl.write_word(0x24, 0x210, &mut nand, &mut mem).unwrap();
        ctl.write_word(0x28, ram, &mut nand, &mut mem).unwrap();
        ctl.write_word(0x08, 1, &mut nand, &mut mem).unwrap();

        for i in 0..0x210 {
            assert_eq!(mem.read_byte(ram + i), Some((i % 251) as u8));
        }
        let expected = ecc_calculate(&nand.data()[..512]);
        assert_eq!(ctl.read_word(0x44), expected);
    }

    #[test]
    fn phx_staged_program_with_confirm() {
        let mut nand = NandFlash::new(false);
        let mut mem = MemoryBanks::new(0x100000);
        let mut ctl = PhxNandCtl::new();
        ctl.reset(&mut nand);

        let ram = SDRAM_FIRST + 0x2000;
        for i in 0..0x200 {
            mem.write_byte(ram + i, !(i as u8));
        }
        // Program setup + 3 address bytes + host-to-NAND data + confirm 0x10.
        let op = 0x80 | 3 << 8 | 0x800 | 0x100000 | 0x10 << 12;
        ctl.write_word(0x0C, op, &mut nand, &mut mem).unwrap();
        ctl.write_word(0x24, 0x200, &mut nand, &mut mem).unwrap();
        ctl.write_word(0x28, ram, &mut nand, &mut mem).unwrap();
        ctl.write_word(0x08, 1, &mut nand, &mut mem).unwrap();

        for i in 0..0x200usize {
            assert_eq!(nand.data()[i], !(i as u8));
        }
        assert!(nand.is_block_modified(0));
    }

    #[test]
    fn phx_dma_outside_ram_is_fatal() {
        let mut nand = NandFlash::new(false);
        let mut mem = MemoryBanks::new(0x100000);
        let mut ctl = PhxNandCtl::new();
        ctl.write_word(0x0C, 0x400000 | 0x00, &mut nand, &mut mem).unwrap();
        ctl.write_word(0x24, 0x200, &mut nand, &mut mem).unwrap();
        ctl.write_word(0x28, 0x20000000, &mut nand, &mut mem).unwrap();
        assert!(ctl.write_word(0x08, 1, &mut nand, &mut mem).is_err());
    }

    #[test]
    fn cx_command_address_and_data_writes() {
        let mut nand = NandFlash::new(true);
        nand.data_mut()[0x840 + 4..0x840 + 8].copy_from_slice(&[0x11, 0x22, 0x33, 0x44]);

        // Command 0x00 with four address bytes: column 4, row 1.
        let offset = 4 << 21 | 0x00 << 3;
        CxNandCtl::write_word(&mut nand, offset, 0x0001_0004).unwrap();
        // Read confirm (0x30) rides on a zero-byte command write.
        let confirm = 0x100000 | 0x30 << 11;
        CxNandCtl::write_word(&mut nand, confirm, 0).unwrap();

        assert_eq!(CxNandCtl::read_word(&mut nand, 0x080000), 0x44332211);
        assert_eq!(nand.column(), 8);
    }

    #[test]
    fn cx_too_many_address_bytes_is_fatal() {
        let mut nand = NandFlash::new(true);
        assert!(CxNandCtl::write_word(&mut nand, 5 << 21, 0).is_err());
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
