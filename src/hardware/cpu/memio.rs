// License below.
//! Implements the virtual-address memory accessors the interpreter and
//! the debugger consume.
//!
//! Every access translates through the address cache first; on a miss
//! the MMU walker runs and RAM-backed results are cached. Device
//! addresses are never cached since their reads have side effects. A
//! failed translation propagates as a data abort and the instruction
//! completes with no further side effects.
#![warn(missing_docs)]

use super::super::error::PhxError;
use super::super::memory::AccessKind;
use super::super::mmu;
use super::{Arm926, Trap};

impl Arm926 {
    /// Translates a virtual address, consulting the address cache.
    pub(super) fn translate_addr(&mut self, va: u32, kind: AccessKind)
                                 -> Result<u32, mmu::MemFault> {
        if let Some(pa) = self.addr_cache.lookup(va, kind) {
            return Ok(pa);
        }
        let privileged = self.is_privileged();
        let bus = self.bus.borrow();
        let pa = mmu::translate(&self.cp15, &bus.mem, va, kind, privileged)?;
        // Only RAM may enter the fast path; the whole 1 KiB chunk has to
        // be backed so the cached base stays valid across the chunk.
        let cacheable = bus.mem.is_ram(pa & !0x3FF, 0x400);
        drop(bus);
        if cacheable {
            self.addr_cache.insert(va, kind, pa);
        }
        Ok(pa)
    }

    /// Fetches the ARM instruction at PC, truncating a misaligned PC.
    ///
    /// # Returns
    /// The instruction word and its RAM flags. A PC outside RAM-backed
    /// memory is fatal; an unmapped PC propagates as a prefetch abort.
    pub(super) fn fetch_arm(&mut self) -> Result<(u32, u32), Trap> {
        let pc = self.reg[15] & !3;
        self.reg[15] = pc;
        let pa = self.translate_addr(pc, AccessKind::Read)?;
        match self.bus.borrow().mem.fetch(pa) {
            Some(pair) => Ok(pair),
            None => Err(Trap::Fatal(PhxError::BadPc(pc))),
        }
    }

    /// Fetches the THUMB instruction at PC, truncating a misaligned PC.
    pub(super) fn fetch_thumb(&mut self) -> Result<(u16, u32), Trap> {
        let pc = self.reg[15] & !1;
        self.reg[15] = pc;
        let pa = self.translate_addr(pc, AccessKind::Read)?;
        let bus = self.bus.borrow();
        match bus.mem.read_half(pa) {
            Some(insn) => Ok((insn, bus.mem.flags(pa & !3))),
            None => Err(Trap::Fatal(PhxError::BadPc(pc))),
        }
    }

    /// Loads a byte, zero-extended.
    pub fn read_byte(&mut self, addr: u32) -> Result<u32, Trap> {
        let pa = self.translate_addr(addr, AccessKind::Read)?;
        Ok(self.bus.borrow_mut().read_phys_byte(pa)? as u32)
    }

    /// Loads a halfword, zero-extended; the address is aligned down.
    pub fn read_half(&mut self, addr: u32) -> Result<u32, Trap> {
        let pa = self.translate_addr(addr & !1, AccessKind::Read)?;
        Ok(self.bus.borrow_mut().read_phys_half(pa)? as u32)
    }

    /// Loads an aligned word; the address is aligned down.
    pub fn read_word(&mut self, addr: u32) -> Result<u32, Trap> {
        let pa = self.translate_addr(addr & !3, AccessKind::Read)?;
        Ok(self.bus.borrow_mut().read_phys_word(pa)?)
    }

    /// Loads a word with the LDR misalignment rule: the aligned word is
    /// loaded and rotated right by the byte offset.
    pub fn read_word_ldr(&mut self, addr: u32) -> Result<u32, Trap> {
        let word = self.read_word(addr & !3)?;
        Ok(word.rotate_right(8 * (addr & 3)))
    }

    /// Stores a byte.
    pub fn write_byte(&mut self, addr: u32, data: u32) -> Result<(), Trap> {
        let pa = self.translate_addr(addr, AccessKind::Write)?;
        self.bus.borrow_mut().write_phys_byte(pa, data as u8)?;
        Ok(())
    }

    /// Stores a halfword; the address is aligned down.
    pub fn write_half(&mut self, addr: u32, data: u32) -> Result<(), Trap> {
        let pa = self.translate_addr(addr & !1, AccessKind::Write)?;
        self.bus.borrow_mut().write_phys_half(pa, data as u16)?;
        Ok(())
    }

    /// Stores a word; the address is aligned down.
    pub fn write_word(&mut self, addr: u32, data: u32) -> Result<(), Trap> {
        let pa = self.translate_addr(addr & !3, AccessKind::Write)?;
        self.bus.borrow_mut().write_phys_word(pa, data)?;
        Ok(())
    }

    /// Toggles the execution breakpoint on the word at a virtual address
    /// (debugger interface).
    ///
    /// # Returns
    /// - `Some(true)`: a breakpoint is now set.
    /// - `Some(false)`: the breakpoint was removed.
    /// - `None`: the address does not translate to RAM.
    pub fn toggle_breakpoint(&mut self, va: u32) -> Option<bool> {
        use super::super::memory::RF_EXEC_BREAKPOINT;

        let pa = self.translate_addr(va, AccessKind::Read).ok()?;
        let mut bus = self.bus.borrow_mut();
        if !bus.mem.is_ram(pa & !3, 4) {
            return None;
        }
        if bus.mem.flags(pa) & RF_EXEC_BREAKPOINT != 0 {
            bus.mem.clear_flags(pa, RF_EXEC_BREAKPOINT);
            Some(false)
        } else {
            bus.mem.set_flags(pa, RF_EXEC_BREAKPOINT);
            Some(true)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::super::test_cpu;
    use super::super::super::memory::SDRAM_FIRST;

    #[test]
    fn flat_accesses_with_mmu_off() {
        let mut cpu = test_cpu();
        cpu.write_word(SDRAM_FIRST + 0x100, 0xCAFEBABE).unwrap();
        assert_eq!(cpu.read_word(SDRAM_FIRST + 0x100).unwrap(), 0xCAFEBABE);
        assert_eq!(cpu.read_byte(SDRAM_FIRST + 0x102).unwrap(), 0xFE);
        assert_eq!(cpu.read_half(SDRAM_FIRST + 0x102).unwrap(), 0xCAFE);
    }

    #[test]
    fn unaligned_ldr_rotates_the_word() {
        let mut cpu = test_cpu();
        cpu.write_word(SDRAM_FIRST + 0x10, 0x11223344).unwrap();
        assert_eq!(cpu.read_word_ldr(SDRAM_FIRST + 0x10).unwrap(), 0x11223344);
        assert_eq!(cpu.read_word_ldr(SDRAM_FIRST + 0x12).unwrap(), 0x33441122);
    }

    #[test]
    fn unmapped_virtual_access_aborts() {
        let mut cpu = test_cpu();
        cpu.cp15.control |= 1;
        cpu.cp15.translation_table_base = SDRAM_FIRST;
        cpu.cp15.domain_access_control = 3;
        match cpu.read_word(0x40000000) {
            Err(Trap::Abort(fault)) => assert_eq!(fault.mva, 0x40000000),
            other => panic!("expected a data abort, got {:?}", other),
        }
    }

    #[test]
    fn stale_translations_die_with_the_cache_flush() {
        let mut cpu = test_cpu();
        let table = SDRAM_FIRST;
        cpu.write_word(table + (SDRAM_FIRST >> 20) * 4,
                       (SDRAM_FIRST & 0xFFF00000) | 3 << 10 | 2).unwrap();
        cpu.cp15.translation_table_base = table;
        cpu.cp15.domain_access_control = 1;
        cpu.cp15.control |= 1;

        cpu.write_word(SDRAM_FIRST + 0x2000, 0x1111).unwrap();
        assert_eq!(cpu.read_word(SDRAM_FIRST + 0x2000).unwrap(), 0x1111);

        // Retarget the section one megabyte up; the stale entry answers
        // until the cache is invalidated.
        cpu.bus().borrow_mut().mem
            .write_word(table + (SDRAM_FIRST >> 20) * 4,
                        ((SDRAM_FIRST + 0x100000) & 0xFFF00000) | 3 << 10 | 2);
        assert_eq!(cpu.read_word(SDRAM_FIRST + 0x2000).unwrap(), 0x1111);
        cpu.flush_address_cache();
        assert_eq!(cpu.read_word(SDRAM_FIRST + 0x2000).unwrap(), 0);
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
