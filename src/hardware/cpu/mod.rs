// License below.
//! Implements emulation utilities for the machine's CPU, an ARM926EJ-S.
//!
//! The processor state keeps the four condition flags unpacked next to
//! the low 28 CPSR bits, the FIQ and USR views of r8..r12, one r13/r14
//! pair per mode group, and one SPSR per exception mode. The active
//! register file always holds the current mode's view; mode changes swap
//! banks in place.
#![warn(missing_docs)]

use std::cell::RefCell;
use std::rc::Rc;

use super::bus::Bus;
use super::error::PhxError;
use super::events::EventWord;
use super::memory::AddressCache;
use super::mmu::MemFault;

pub use self::cp15::Cp15;
pub use self::psr::*;

pub mod cp15;
pub mod psr;

mod alu;
mod execarm;
mod execthumb;
mod memio;

/// Why an interpreter aborted the current instruction.
///
/// A data abort is guest-visible: the loop delivers the corresponding
/// exception and keeps running. A fatal error ends emulation.
#[derive(Debug)]
pub enum Trap {
    /// Deliver a data abort to the guest.
    Abort(MemFault),
    /// Hand control to the debugger (BKPT).
    Debug(DebugEntry),
    /// Stop the emulator with a diagnostic.
    Fatal(PhxError),
}

impl From<MemFault> for Trap {
    fn from(f: MemFault) -> Trap { Trap::Abort(f) }
}

impl From<PhxError> for Trap {
    fn from(e: PhxError) -> Trap { Trap::Fatal(e) }
}

/// CPU exceptions; discriminants are the vector slots.
#[derive(Debug, PartialEq, Clone, Copy)]
#[repr(u8)]
pub enum Exception {
    #[doc = "Exception taken on CPU reset."]                      Reset = 0,
    #[doc = "Exception due to executing undefined instructions."] UndefinedInstruction = 1,
    #[doc = "Exception due to executing SWI."]                    SoftwareInterrupt = 2,
    #[doc = "Instruction fetch aborted."]                         PrefetchAbort = 3,
    #[doc = "Data access aborted."]                               DataAbort = 4,
    #[doc = "Normal hardware interrupt."]                         NormalInterrupt = 6,
    #[doc = "Fast hardware interrupt."]                           FastInterrupt = 7,
}

impl Exception {
    /// Mode and interrupt-disable bits applied on entry.
    fn entry_flags(self) -> u32 {
        match self {
            Exception::Reset                => MODE_SVC | 0xC0,
            Exception::UndefinedInstruction => MODE_UND | 0x80,
            Exception::SoftwareInterrupt    => MODE_SVC | 0x80,
            Exception::PrefetchAbort        => MODE_ABT | 0x80,
            Exception::DataAbort            => MODE_ABT | 0x80,
            Exception::NormalInterrupt      => MODE_IRQ | 0x80,
            Exception::FastInterrupt        => MODE_FIQ | 0xC0,
        }
    }
}

/// Why the debugger should be entered.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum DebugEntry {
    /// An execution breakpoint or debug-step request was hit.
    ExecBreakpoint,
    /// A BKPT instruction with its comment field.
    SoftwareBreakpoint(u32),
    /// A fatal guest state was observed and execution paused.
    Fault,
}

/// Why an inner execution loop returned to the driver.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum CpuStop {
    /// The cycle budget of the quantum is used up.
    Quantum,
    /// The event word is nonzero; the driver must dispatch.
    Event,
    /// The T bit changed; re-enter through the other loop.
    StateChange,
    /// Enter the debugger.
    Debug(DebugEntry),
}


/// The ARM926EJ-S processor state.
pub struct Arm926 {
    reg: [u32; 16],

    cpsr_n: bool,
    cpsr_z: bool,
    cpsr_c: bool,
    cpsr_v: bool,
    cpsr_low28: u32,

    // Register backups for mode changes.
    r8_usr: [u32; 5],
    r8_fiq: [u32; 5],
    r13_banks: [[u32; 2]; 6],
    spsr: [u32; 6],

    /// System control coprocessor registers.
    pub cp15: Cp15,
    addr_cache: AddressCache,

    /// Cycle budget of the current quantum, counting up towards zero.
    pub cycle_count_delta: i32,

    debug_resume: bool,

    bus: Rc<RefCell<Bus>>,
    events: Rc<EventWord>,
}

impl Arm926 {
    /// Register index of the stack pointer.
    pub const SP: usize = 13;

    /// Register index of the link register.
    pub const LR: usize = 14;

    /// Register index of the program counter.
    pub const PC: usize = 15;

    /// Creates a CPU in its reset state.
    pub fn new(bus: Rc<RefCell<Bus>>, events: Rc<EventWord>) -> Arm926 {
        let mut cpu = Arm926 {
            reg: [0; 16],
            cpsr_n: false,
            cpsr_z: false,
            cpsr_c: false,
            cpsr_v: false,
            cpsr_low28: MODE_SVC | 0xC0,
            r8_usr: [0; 5],
            r8_fiq: [0; 5],
            r13_banks: [[0; 2]; 6],
            spsr: [0; 6],
            cp15: Cp15::new(),
            addr_cache: AddressCache::new(),
            cycle_count_delta: 0,
            debug_resume: false,
            bus,
            events,
        };
        cpu.events.set_cpsr_disable(cpu.cpsr_low28);
        cpu
    }

    /// Resets the CPU: clears the register file and re-enters the reset
    /// exception state.
    pub fn reset(&mut self) -> Result<(), PhxError> {
        self.reg = [0; 16];
        self.r8_usr = [0; 5];
        self.r8_fiq = [0; 5];
        self.r13_banks = [[0; 2]; 6];
        self.spsr = [0; 6];
        self.cpsr_n = false;
        self.cpsr_z = false;
        self.cpsr_c = false;
        self.cpsr_v = false;
        self.cpsr_low28 = MODE_SVC | 0xC0;
        self.cp15 = Cp15::new();
        self.addr_cache.flush();
        self.cycle_count_delta = 0;
        self.events.set_cpsr_disable(self.cpsr_low28);
        Ok(())
    }

    /// The bus this CPU is attached to.
    pub fn bus(&self) -> &Rc<RefCell<Bus>> { &self.bus }

    /// The event word this CPU observes between instructions.
    pub fn events(&self) -> &EventWord { &self.events }

    /// A copy of the general register file.
    pub fn registers(&self) -> [u32; 16] { self.reg }

    /// Overwrites one general register (debugger interface).
    pub fn set_register(&mut self, rn: usize, value: u32) { self.reg[rn] = value; }

    /// Whether the T bit selects THUMB decoding.
    pub fn is_thumb(&self) -> bool { self.cpsr_low28 & T_BIT != 0 }

    /// Whether the CPU is in a privileged mode.
    pub fn is_privileged(&self) -> bool { self.cpsr_low28 & MODE_MASK != MODE_USR }

    /// Packs the flag bits and the low 28 bits into one CPSR word.
    pub fn get_cpsr(&self) -> u32 {
        (self.cpsr_n as u32) << 31
            | (self.cpsr_z as u32) << 30
            | (self.cpsr_c as u32) << 29
            | (self.cpsr_v as u32) << 28
            | self.cpsr_low28
    }

    /// Replaces the whole CPSR, swapping register banks on mode changes.
    pub fn set_cpsr_full(&mut self, cpsr: u32) -> Result<(), PhxError> {
        if (cpsr ^ self.cpsr_low28) & MODE_MASK != 0 {
            // Switching to a different processor mode. Swap out the
            // registers of the old mode.
            let old_mode = self.cpsr_low28 & MODE_MASK;
            if old_mode == MODE_FIQ {
                self.r8_fiq.copy_from_slice(&self.reg[8..13]);
            } else {
                self.r8_usr.copy_from_slice(&self.reg[8..13]);
            }
            let oi = bank_index(old_mode).ok_or(PhxError::InvalidProcessorMode(old_mode))?;
            self.r13_banks[oi][0] = self.reg[13];
            self.r13_banks[oi][1] = self.reg[14];

            // Swap in the registers of the new mode.
            let new_mode = cpsr & MODE_MASK;
            if new_mode == MODE_FIQ {
                self.reg[8..13].copy_from_slice(&self.r8_fiq);
            } else {
                self.reg[8..13].copy_from_slice(&self.r8_usr);
            }
            let ni = bank_index(new_mode).ok_or(PhxError::InvalidProcessorMode(new_mode))?;
            self.reg[13] = self.r13_banks[ni][0];
            self.reg[14] = self.r13_banks[ni][1];

            // Going to or from user mode changes access permissions.
            if self.cpsr_low28 & 3 == 0 || cpsr & 3 == 0 {
                self.addr_cache.flush();
            }
        }

        if cpsr & 0x01000000 != 0 {
            return Err(PhxError::JStateUnsupported);
        }

        self.cpsr_n = cpsr >> 31 & 1 != 0;
        self.cpsr_z = cpsr >> 30 & 1 != 0;
        self.cpsr_c = cpsr >> 29 & 1 != 0;
        self.cpsr_v = cpsr >> 28 & 1 != 0;
        self.cpsr_low28 = cpsr & 0x090000FF; // Mask off reserved bits
        self.events.set_cpsr_disable(self.cpsr_low28);
        Ok(())
    }

    /// Updates the CPSR under a field mask (the MSR instruction).
    pub fn set_cpsr(&mut self, cpsr: u32, mask: u32) -> Result<(), PhxError> {
        let mut mask = mask;
        if self.cpsr_low28 & 0x0F == 0 {
            // User mode. Don't change privileged or execution state bits.
            mask &= !0x010000FF;
        }
        let cpsr = (cpsr & mask) | (self.get_cpsr() & !mask);
        if cpsr & T_BIT != 0 {
            return Err(PhxError::MsrSetsThumb);
        }
        self.set_cpsr_full(cpsr)
    }

    fn spsr_index(&self) -> Result<usize, PhxError> {
        let mode = self.cpsr_low28 & MODE_MASK;
        if !has_spsr(mode) {
            return Err(PhxError::SpsrInUserMode);
        }
        Ok(bank_index(mode).unwrap_or(0))
    }

    /// The current mode's SPSR.
    pub fn get_spsr(&self) -> Result<u32, PhxError> {
        Ok(self.spsr[self.spsr_index()?])
    }

    /// Replaces the current mode's SPSR.
    pub fn set_spsr_full(&mut self, spsr: u32) -> Result<(), PhxError> {
        let i = self.spsr_index()?;
        self.spsr[i] = spsr;
        Ok(())
    }

    /// Updates the current mode's SPSR under a field mask.
    pub fn set_spsr(&mut self, spsr: u32, mask: u32) -> Result<(), PhxError> {
        let i = self.spsr_index()?;
        self.spsr[i] ^= (self.spsr[i] ^ spsr) & mask;
        Ok(())
    }

    /// Enters an exception: banks the CPSR, switches mode, disables
    /// interrupts per kind, and branch-and-links to the vector.
    ///
    /// The interpreter has already advanced the PC past the current
    /// instruction; the abort helpers compensate where the architecture
    /// wants a different return address.
    pub fn exception(&mut self, ex: Exception) -> Result<(), PhxError> {
        let old_cpsr = self.get_cpsr();
        self.set_cpsr_full((old_cpsr & !0x3F) | ex.entry_flags())?;
        self.set_spsr_full(old_cpsr)?;

        self.reg[14] = self.reg[15];
        self.reg[15] = (ex as u32) << 2;
        if self.cp15.control & 0x2000 != 0 {
            // High vectors
            self.reg[15] = self.reg[15].wrapping_add(0xFFFF_0000);
        }
        Ok(())
    }

    /// Delivers a prefetch abort for a failed instruction fetch.
    pub fn prefetch_abort(&mut self, fault: MemFault) -> Result<(), PhxError> {
        debug!("Prefetch abort at {:#010X} (status {:#04X})", fault.mva, fault.status);
        self.cp15.instruction_fault_status = fault.status as u32;
        // Fetch happens before the PC advances; LR must be the faulting
        // instruction + 4.
        self.reg[15] = self.reg[15].wrapping_add(4);
        self.exception(Exception::PrefetchAbort)
    }

    /// Delivers a data abort for a failed load or store.
    pub fn data_abort(&mut self, fault: MemFault) -> Result<(), PhxError> {
        debug!("Data abort at {:#010X} (status {:#04X})", fault.mva, fault.status);
        self.cp15.data_fault_status = fault.status as u32;
        self.cp15.fault_address = fault.mva;
        // The PC is already past the instruction; LR must be the faulting
        // instruction + 8.
        self.reg[15] = self.reg[15].wrapping_add(4);
        self.exception(Exception::DataAbort)
    }

    /// Drops every cached address translation.
    pub fn flush_address_cache(&mut self) {
        self.addr_cache.flush();
    }

    /// Makes the next loop iteration skip its event and breakpoint
    /// checks, so execution moves past a breakpoint after the debugger
    /// resumes.
    pub fn set_debug_resume(&mut self) {
        self.debug_resume = true;
    }

    // Register accessors. Reading R15 sees the effects of the pipeline:
    // the next instruction plus 4 (plus 8 when stored).

    fn reg_pc(&self, rn: usize) -> u32 {
        self.reg[rn].wrapping_add(if rn == 15 { 4 } else { 0 })
    }

    fn reg_pc_store(&self, rn: usize) -> u32 {
        self.reg[rn].wrapping_add(if rn == 15 { 8 } else { 0 })
    }

    fn reg_pc_thumb(&self, rn: usize) -> u32 {
        self.reg[rn].wrapping_add(if rn == 15 { 2 } else { 0 })
    }

    fn set_reg_pc(&mut self, rn: usize, value: u32) {
        self.reg[rn] = value;
    }

    fn set_reg_pc_bx(&mut self, rn: usize, value: u32) {
        if rn == 15 && value & 1 != 0 {
            self.reg[15] = value - 1;
            self.cpsr_low28 |= T_BIT; // Enter THUMB state
            return;
        }
        self.reg[rn] = value;
    }

    fn get_reg(&self, rn: usize) -> Result<u32, PhxError> {
        if rn == 15 {
            return Err(PhxError::InvalidUseOfR15);
        }
        Ok(self.reg[rn])
    }

    fn set_reg(&mut self, rn: usize, value: u32) -> Result<(), PhxError> {
        if rn == 15 {
            return Err(PhxError::InvalidUseOfR15);
        }
        self.reg[rn] = value;
        Ok(())
    }
}


#[cfg(test)]
pub fn test_cpu() -> Arm926 {
    use super::flash::NandFlash;
    use super::memory::MemoryBanks;

    let events = Rc::new(EventWord::new());
    let bus = Bus::new(MemoryBanks::new(0x400000), NandFlash::new(false), false, events.clone());
    Arm926::new(Rc::new(RefCell::new(bus)), events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpsr_round_trips_through_pack_and_unpack() {
        let mut cpu = test_cpu();
        for &x in &[0xF00000D3u32, 0x600000DF, 0x90000090u32, 0x080000D1, 0x000000D2] {
            cpu.set_cpsr_full(x).unwrap();
            let packed = cpu.get_cpsr();
            assert_eq!(packed & 0xF90000FF, x & 0xF90000FF);
            // A second write of the packed value must not change anything.
            cpu.set_cpsr_full(packed).unwrap();
            assert_eq!(cpu.get_cpsr(), packed);
        }
    }

    #[test]
    fn cpsr_flag_bit_layout() {
        let mut cpu = test_cpu();
        cpu.set_cpsr_full(0xA00000D3).unwrap();
        assert!(cpu.cpsr_n && !cpu.cpsr_z && cpu.cpsr_c && !cpu.cpsr_v);
        assert_eq!(cpu.get_cpsr() >> 28, 0xA);
        assert_eq!(cpu.get_cpsr() & T_BIT, 0);
    }

    #[test]
    fn banked_registers_round_trip_through_every_mode() {
        let mut cpu = test_cpu();
        cpu.set_cpsr_full(0xD3).unwrap(); // SVC
        for i in 0..16 { cpu.reg[i] = 0x1000 + i as u32; }
        let before = cpu.reg;

        for &mode in &[MODE_USR, MODE_FIQ, MODE_IRQ, MODE_ABT, MODE_UND, MODE_SYS] {
            cpu.set_cpsr_full(0xC0 | mode).unwrap();
            cpu.reg[13] = 0xBAD0 + mode;
            cpu.reg[14] = 0xBAD1 + mode;
            if mode == MODE_FIQ {
                for i in 8..13 { cpu.reg[i] = 0xF100 + i as u32; }
            }
            cpu.set_cpsr_full(0xC0 | MODE_SVC).unwrap();
            assert_eq!(cpu.reg, before, "state clobbered via mode {:#X}", mode);
        }
    }

    #[test]
    fn user_and_system_share_r13_r14() {
        let mut cpu = test_cpu();
        cpu.set_cpsr_full(0xC0 | MODE_SYS).unwrap();
        cpu.reg[13] = 0x1234;
        cpu.set_cpsr_full(0xC0 | MODE_SVC).unwrap();
        cpu.set_cpsr_full(0xC0 | MODE_USR).unwrap();
        assert_eq!(cpu.reg[13], 0x1234);
    }

    #[test]
    fn mode_switch_swaps_stack_pointers() {
        let mut cpu = test_cpu();
        cpu.set_cpsr_full(0xC0 | MODE_SVC).unwrap();
        cpu.reg[13] = 0x1000;
        cpu.set_cpsr(0x10, 0xFF).unwrap(); // to USR, like MSR cpsr_c
        assert_eq!(cpu.reg[13], 0);
        cpu.reg[13] = 0x2000;
        // Back to SVC. User mode cannot switch back by itself, which is
        // why the mask strips the mode bits; force it for the test.
        cpu.set_cpsr_full(0xC0 | MODE_SVC).unwrap();
        assert_eq!(cpu.reg[13], 0x1000);
        cpu.set_cpsr_full(0xC0 | MODE_USR).unwrap();
        assert_eq!(cpu.reg[13], 0x2000);
    }

    #[test]
    fn msr_from_user_mode_cannot_leave_user_mode() {
        let mut cpu = test_cpu();
        cpu.set_cpsr_full(0xC0 | MODE_USR).unwrap();
        cpu.set_cpsr(MODE_SVC, 0xFF).unwrap();
        assert_eq!(cpu.get_cpsr() & MODE_MASK, MODE_USR);
    }

    #[test]
    fn spsr_is_rejected_in_user_and_system_mode() {
        let mut cpu = test_cpu();
        cpu.set_cpsr_full(0xC0 | MODE_USR).unwrap();
        assert!(cpu.get_spsr().is_err());
        cpu.set_cpsr_full(0xC0 | MODE_SYS).unwrap();
        assert!(cpu.set_spsr_full(0).is_err());
        cpu.set_cpsr_full(0xC0 | MODE_IRQ).unwrap();
        assert!(cpu.set_spsr_full(0x1F).is_ok());
    }

    #[test]
    fn exception_entry_banks_cpsr_and_links() {
        let mut cpu = test_cpu();
        cpu.set_cpsr_full(MODE_USR).unwrap();
        cpu.reg[15] = 0x8004; // already advanced past the SWI at 0x8000
        cpu.exception(Exception::SoftwareInterrupt).unwrap();

        assert_eq!(cpu.get_cpsr() & MODE_MASK, MODE_SVC);
        assert_ne!(cpu.get_cpsr() & I_BIT, 0);
        assert_eq!(cpu.get_cpsr() & F_BIT, 0);
        assert_eq!(cpu.reg[14], 0x8004);
        assert_eq!(cpu.reg[15], 0x8);
        assert_eq!(cpu.get_spsr().unwrap(), MODE_USR);
    }

    #[test]
    fn high_vectors_move_the_exception_base() {
        let mut cpu = test_cpu();
        cpu.cp15.control |= 0x2000;
        cpu.reg[15] = 0x8004;
        cpu.exception(Exception::SoftwareInterrupt).unwrap();
        assert_eq!(cpu.reg[15], 0xFFFF0008);
    }

    #[test]
    fn fiq_entry_disables_both_interrupts() {
        let mut cpu = test_cpu();
        cpu.set_cpsr_full(MODE_SVC).unwrap();
        cpu.exception(Exception::FastInterrupt).unwrap();
        assert_eq!(cpu.get_cpsr() & (I_BIT | F_BIT), I_BIT | F_BIT);
        assert_eq!(cpu.get_cpsr() & MODE_MASK, MODE_FIQ);
    }

    #[test]
    fn setting_the_j_bit_is_fatal() {
        let mut cpu = test_cpu();
        assert!(cpu.set_cpsr_full(0x01000000 | MODE_SVC).is_err());
    }

    #[test]
    fn msr_setting_t_is_fatal() {
        let mut cpu = test_cpu();
        cpu.set_cpsr_full(0xC0 | MODE_SVC).unwrap();
        assert!(cpu.set_cpsr(T_BIT, 0xFF).is_err());
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
