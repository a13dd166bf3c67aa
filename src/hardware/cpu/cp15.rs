// License below.
//! Implements the system control coprocessor (CP15).
//!
//! The registers that matter to the model are the control register, the
//! translation-table base, the domain access control, the two fault
//! status registers, and the fault address. Cache maintenance is a
//! no-op (caches are not modelled as storage); TLB maintenance
//! invalidates the address cache, which is the only translation cache
//! the model has.
#![warn(missing_docs)]

use super::super::error::PhxError;
use super::super::events::EVENT_WAITING;
use super::{Arm926, Trap};


/// The CP15 register file.
pub struct Cp15 {
    /// c1: control register.
    pub control: u32,
    /// c2: translation table base (low 14 bits always clear).
    pub translation_table_base: u32,
    /// c3: domain access control.
    pub domain_access_control: u32,
    /// c5, opcode2 0: data fault status.
    pub data_fault_status: u32,
    /// c5, opcode2 1: instruction fault status.
    pub instruction_fault_status: u32,
    /// c6: fault address.
    pub fault_address: u32,
}

impl Cp15 {
    /// Creates the register file in its reset state.
    pub fn new() -> Cp15 {
        Cp15 {
            control: 0x00050078,
            translation_table_base: 0,
            domain_access_control: 0,
            data_fault_status: 0,
            instruction_fault_status: 0,
            fault_address: 0,
        }
    }
}

impl Arm926 {
    /// Executes an `MCR p15` write.
    pub(super) fn exec_mcr(&mut self, insn: u32) -> Result<(), Trap> {
        let value = self.get_reg(insn as usize >> 12 & 15)?;
        let op1 = insn >> 21 & 7;
        let crn = insn >> 16 & 15;
        let crm = insn & 15;
        let op2 = insn >> 5 & 7;

        match (op1, crn, crm, op2) {
            (0, 1, 0, 0) => {
                // Control register; only one configuration is modelled.
                let change = value ^ self.cp15.control;
                if value & 0xFFFF8CF8 != 0x00050078 {
                    return Err(PhxError::InvalidControlValue(value).into());
                }
                self.cp15.control = value;
                if change & 1 != 0 {
                    // The MMU is being turned on or off.
                    self.flush_address_cache();
                }
            }
            (0, 2, 0, 0) => {
                self.cp15.translation_table_base = value & !0x3FFF;
                self.flush_address_cache();
            }
            (0, 3, 0, 0) => {
                self.cp15.domain_access_control = value;
                self.flush_address_cache();
            }
            (0, 5, 0, 0) => self.cp15.data_fault_status = value,
            (0, 5, 0, 1) => self.cp15.instruction_fault_status = value,
            (0, 6, 0, 0) => self.cp15.fault_address = value,
            (0, 7, 0, 4) => {
                // Wait for interrupt: end the quantum; if nothing is
                // pending, repark the PC on this instruction and idle.
                self.cycle_count_delta = 0;
                if self.events.int_lines() == 0 {
                    self.reg[15] = self.reg[15].wrapping_sub(4);
                    self.events.set(EVENT_WAITING);
                }
            }
            (0, 8, _, _) => {
                // TLB maintenance.
                self.flush_address_cache();
            }
            (0, 7, 5, _) | (0, 7, 7, _) | (0, 7, 10, _) => {
                // Cache maintenance, including drain/clean: no-op.
            }
            (0, 15, 0, 0) => {
                // Debug override register.
            }
            _ => warn!("Unknown coprocessor instruction MCR {:#010X}", insn),
        }
        Ok(())
    }

    /// Executes an `MRC p15` read.
    pub(super) fn exec_mrc(&mut self, insn: u32) -> Result<(), Trap> {
        let op1 = insn >> 21 & 7;
        let crn = insn >> 16 & 15;
        let crm = insn & 15;
        let op2 = insn >> 5 & 7;

        let value = match (op1, crn, crm, op2) {
            (0, 0, 0, 0) => 0x41069264, // ID: ARM926EJ-S revision 4
            (0, 0, 0, 1) => 0x1D112152, // Cache type
            (0, 0, 0, 2) => 0,          // TCM status
            (0, 1, 0, 0) => self.cp15.control,
            (0, 2, 0, 0) => self.cp15.translation_table_base,
            (0, 3, 0, 0) => self.cp15.domain_access_control,
            (0, 5, 0, 0) => self.cp15.data_fault_status,
            (0, 5, 0, 1) => self.cp15.instruction_fault_status,
            (0, 6, 0, 0) => self.cp15.fault_address,
            (0, 7, 10, 3) | (0, 7, 14, 3) => 1 << 30, // test-and-clean: done
            (0, 15, 0, 0) => 0,
            _ => {
                warn!("Unknown coprocessor instruction MRC {:#010X}", insn);
                0
            }
        };

        if insn >> 12 & 15 == 15 {
            self.cpsr_n = value >> 31 & 1 != 0;
            self.cpsr_z = value >> 30 & 1 != 0;
            self.cpsr_c = value >> 29 & 1 != 0;
            self.cpsr_v = value >> 28 & 1 != 0;
        } else {
            self.reg[insn as usize >> 12 & 15] = value;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::super::test_cpu;
    use super::super::super::events::EVENT_WAITING;

    const MCR_TTB: u32 = 0xEE020F10;     // mcr p15, 0, r0, c2, c0, 0
    const MCR_CONTROL: u32 = 0xEE010F10; // mcr p15, 0, r0, c1, c0, 0
    const MCR_WFI: u32 = 0xEE070F90;     // mcr p15, 0, r0, c7, c0, 4
    const MRC_ID: u32 = 0xEE100F10;      // mrc p15, 0, r0, c0, c0, 0
    const MRC_CLEAN: u32 = 0xEE17FF7A;   // mrc p15, 0, r15, c7, c10, 3

    #[test]
    fn ttb_writes_are_page_aligned() {
        let mut cpu = test_cpu();
        cpu.set_register(0, 0x10003FFF);
        cpu.exec_mcr(MCR_TTB).unwrap();
        assert_eq!(cpu.cp15.translation_table_base, 0x10000000);
    }

    #[test]
    fn unsupported_control_values_are_fatal() {
        let mut cpu = test_cpu();
        cpu.set_register(0, 0x00052078); // high vectors: accepted
        cpu.exec_mcr(MCR_CONTROL).unwrap();
        assert_eq!(cpu.cp15.control, 0x00052078);
        cpu.set_register(0, 0x12345678);
        assert!(cpu.exec_mcr(MCR_CONTROL).is_err());
    }

    #[test]
    fn wait_for_interrupt_reparks_the_pc() {
        let mut cpu = test_cpu();
        cpu.cycle_count_delta = -100;
        cpu.reg[15] = 0x1004; // already advanced past the MCR at 0x1000
        cpu.exec_mcr(MCR_WFI).unwrap();
        assert_eq!(cpu.reg[15], 0x1000);
        assert_eq!(cpu.cycle_count_delta, 0);
        assert_ne!(cpu.events.get() & EVENT_WAITING, 0);
    }

    #[test]
    fn mrc_returns_the_cpu_id() {
        let mut cpu = test_cpu();
        cpu.exec_mrc(MRC_ID).unwrap();
        assert_eq!(cpu.registers()[0], 0x41069264);
    }

    #[test]
    fn mrc_to_r15_lands_in_the_flags() {
        let mut cpu = test_cpu();
        let pc = cpu.reg[15];
        cpu.exec_mrc(MRC_CLEAN).unwrap();
        // 0x40000000: only the Z position is set.
        assert!(!cpu.cpsr_n && cpu.cpsr_z && !cpu.cpsr_c && !cpu.cpsr_v);
        assert_eq!(cpu.reg[15], pc);
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
