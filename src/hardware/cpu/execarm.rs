// License below.
//! Implements the interpreter for 32-bit ARM state instructions and the
//! ARM-state inner execution loop.
//!
//! The decoder partitions the instruction space the way the ARMv5TE
//! manual does:
//!
//! ```text
//!     .... ....  .... ....  .... ....  .... ....
//!     COND 000x  xxxx ....  .... ....  1..1 .... | multiplies, SWP, LDRH/STRH/LDRD/STRD
//!     COND 0001  0xx0 ....  .... ....  .... .... | misc: BX/BLX, MRS/MSR, QADD..QDSUB,
//!                                                |       SMUL<x><y>.., CLZ, BKPT
//!     COND 00Ix  xxxS RegN  RegD shft  shft shft | data processing
//!     COND 01I+  -BWL RegN  RegD offs  offs offs | LDR/STR
//!     COND 100+  -RWL RegN  regs regs  regs regs | LDM/STM
//!     COND 101F  imm_ imm_  imm_ imm_  imm_ imm_ | B/BL
//!     COND 1110  yyyL CprN  RegD 1111  xxx1 CprM | MRC/MCR p15
//!     COND 1111  imm_ imm_  imm_ imm_  imm_ imm_ | SWI
//!     1111 ....  .... ....  .... ....  .... .... | unconditional space: PLD, BLX
//! ```
//!
//! Condition code failure skips the instruction. The decode order
//! matters: the miscellaneous block and the multiply block are carved
//! out of what would otherwise look like data-processing encodings.
#![warn(missing_docs)]

use super::super::error::PhxError;
use super::super::events::EVENT_DEBUG_STEP;
use super::super::memory::{RF_EXEC_BREAKPOINT, RF_EXEC_DEBUG_NEXT};
use super::alu::{add_overflow, sub_overflow};
use super::{Arm926, CpuStop, DebugEntry, Exception, Trap, MODE_FIQ, MODE_SYS, MODE_USR, Q_BIT, T_BIT};

impl Arm926 {
    /// Runs ARM-state instructions until the quantum ends, an event is
    /// posted, the debugger is wanted, or the T bit gets set.
    pub fn run_arm(&mut self) -> Result<CpuStop, PhxError> {
        while !self.events.exiting() && self.cycle_count_delta < 0 {
            if self.is_thumb() {
                return Ok(CpuStop::StateChange);
            }

            let (insn, flags) = match self.fetch_arm() {
                Ok(pair) => pair,
                Err(Trap::Abort(fault)) => {
                    self.prefetch_abort(fault)?;
                    continue;
                }
                Err(Trap::Debug(entry)) => return Ok(CpuStop::Debug(entry)),
                Err(Trap::Fatal(e)) => return Err(e),
            };

            if !std::mem::take(&mut self.debug_resume) {
                let events = self.events.get();
                if events != 0 {
                    if events & !EVENT_DEBUG_STEP != 0 {
                        return Ok(CpuStop::Event);
                    }
                    return Ok(CpuStop::Debug(DebugEntry::ExecBreakpoint));
                }

                if flags & (RF_EXEC_BREAKPOINT | RF_EXEC_DEBUG_NEXT) != 0 {
                    if flags & RF_EXEC_BREAKPOINT != 0 {
                        info!("Hit breakpoint at {:#010X}. Entering debugger.", self.reg[15]);
                    }
                    return Ok(CpuStop::Debug(DebugEntry::ExecBreakpoint));
                }
            }

            self.reg[15] = self.reg[15].wrapping_add(4);
            self.cycle_count_delta += 1;
            match self.interpret_arm(insn) {
                Ok(()) => {}
                Err(Trap::Abort(fault)) => self.data_abort(fault)?,
                Err(Trap::Debug(entry)) => return Ok(CpuStop::Debug(entry)),
                Err(Trap::Fatal(e)) => return Err(e),
            }
        }
        Ok(if self.is_thumb() { CpuStop::StateChange } else { CpuStop::Quantum })
    }

    /// Immediately executes a single ARM state instruction.
    ///
    /// The PC has already been advanced past the instruction.
    pub(super) fn interpret_arm(&mut self, insn: u32) -> Result<(), Trap> {
        let exec = match insn >> 29 {
            0 => self.cpsr_z,                                  // EQ/NE
            1 => self.cpsr_c,                                  // CS/CC
            2 => self.cpsr_n,                                  // MI/PL
            3 => self.cpsr_v,                                  // VS/VC
            4 => !self.cpsr_z && self.cpsr_c,                  // HI/LS
            5 => self.cpsr_n == self.cpsr_v,                   // GE/LT
            6 => !self.cpsr_z && self.cpsr_n == self.cpsr_v,   // GT/LE
            _ => {
                // AL, or the unconditional space.
                if insn & 1 << 28 != 0 {
                    if insn & 0xFD70F000 == 0xF550F000 {
                        // PLD: preload to cache, modelled as a no-op.
                    } else if insn & 0xFE000000 == 0xFA000000 {
                        // BLX: branch, link, and exchange the T bit.
                        self.reg[14] = self.reg[15];
                        self.reg[15] = self.reg[15]
                            .wrapping_add(4)
                            .wrapping_add(((insn << 8) as i32 >> 6) as u32)
                            .wrapping_add(insn >> 23 & 2);
                        self.cpsr_low28 |= T_BIT;
                    } else {
                        return Err(PhxError::InvalidConditionCode(insn).into());
                    }
                    return Ok(());
                }
                true
            }
        };
        if exec == (insn >> 28 & 1 != 0) {
            return Ok(());
        }

        if insn & 0x0E000090 == 0x00000090 {
            self.arm_multiply_or_extra_transfer(insn)
        } else if insn & 0x0D900000 == 0x01000000 {
            self.arm_miscellaneous(insn)
        } else if insn & 0x0C000000 == 0 {
            self.arm_data_processing(insn)
        } else if insn & 0x0C000000 == 0x04000000 {
            self.arm_single_transfer(insn)
        } else if insn & 0x0E000000 == 0x08000000 {
            self.arm_block_transfer(insn)
        } else if insn & 0x0E000000 == 0x0A000000 {
            // B, BL: branch, branch-and-link.
            if insn & 1 << 24 != 0 {
                self.reg[14] = self.reg[15];
            }
            self.reg[15] = self.reg[15]
                .wrapping_add(4)
                .wrapping_add(((insn << 8) as i32 >> 6) as u32);
            Ok(())
        } else if insn & 0x0F100F10 == 0x0E000F10 {
            self.exec_mcr(insn)
        } else if insn & 0x0F100F10 == 0x0E100F10 {
            self.exec_mrc(insn)
        } else if insn & 0x0F000000 == 0x0E000000 || insn & 0x0E000000 == 0x0C000000 {
            // Coprocessor space for anything but CP15 registers raises
            // the undefined instruction exception; CP15 CDP/LDC/STC is
            // not a thing the model knows.
            if insn >> 8 & 15 != 15 {
                self.exception(Exception::UndefinedInstruction)?;
                Ok(())
            } else {
                Err(PhxError::InvalidArmInstruction(insn).into())
            }
        } else if insn & 0x0F000000 == 0x0F000000 {
            // SWI: software interrupt.
            self.exception(Exception::SoftwareInterrupt)?;
            Ok(())
        } else {
            Err(PhxError::InvalidArmInstruction(insn).into())
        }
    }

    /// Multiplies, SWP, and the halfword/signed/doubleword transfers.
    fn arm_multiply_or_extra_transfer(&mut self, insn: u32) -> Result<(), Trap> {
        let transfer_type = insn >> 5 & 3;
        if transfer_type == 0 {
            if insn & 0x0FC000F0 == 0x00000090 {
                // MUL, MLA: 32x32 to 32 multiplications.
                let mut res = self.get_reg(insn as usize & 15)?
                    .wrapping_mul(self.get_reg(insn as usize >> 8 & 15)?);
                if insn & 0x0200000 != 0 {
                    res = res.wrapping_add(self.get_reg(insn as usize >> 12 & 15)?);
                }
                self.set_reg(insn as usize >> 16 & 15, res)?;
                if insn & 0x0100000 != 0 {
                    self.set_nz_flags(res);
                }
            } else if insn & 0x0F8000F0 == 0x00800090 {
                // UMULL, UMLAL, SMULL, SMLAL: 32x32 to 64 multiplications.
                let left = self.get_reg(insn as usize & 15)?;
                let right = self.get_reg(insn as usize >> 8 & 15)?;
                let reg_lo = insn as usize >> 12 & 15;
                let reg_hi = insn as usize >> 16 & 15;
                if reg_lo == reg_hi {
                    return Err(PhxError::LongMultiplyRegisterReuse(insn).into());
                }

                let mut res = if insn & 0x0400000 != 0 {
                    (left as i32 as i64).wrapping_mul(right as i32 as i64) as u64
                } else {
                    (left as u64).wrapping_mul(right as u64)
                };
                if insn & 0x0200000 != 0 {
                    // Accumulate.
                    let acc = (self.get_reg(reg_hi)? as u64) << 32 | self.get_reg(reg_lo)? as u64;
                    res = res.wrapping_add(acc);
                }

                self.set_reg(reg_lo, res as u32)?;
                self.set_reg(reg_hi, (res >> 32) as u32)?;
                if insn & 0x0100000 != 0 {
                    self.set_nz_flags_64(res);
                }
            } else if insn & 0x0FB00FF0 == 0x01000090 {
                // SWP, SWPB.
                let base_reg = insn as usize >> 16 & 15;
                let data_reg = insn as usize >> 12 & 15;
                let src_reg = insn as usize & 15;
                if base_reg == data_reg || base_reg == src_reg {
                    return Err(PhxError::SwpRegisterAliasing(insn).into());
                }
                let addr = self.get_reg(base_reg)?;
                let store = self.get_reg(src_reg)?;
                let load = if insn & 0x0400000 != 0 {
                    let b = self.read_byte(addr)?;
                    self.write_byte(addr, store)?;
                    b
                } else {
                    let w = self.read_word_ldr(addr)?;
                    self.write_word(addr, store)?;
                    w
                };
                self.set_reg(data_reg, load)?;
            } else {
                return Err(PhxError::InvalidArmInstruction(insn).into());
            }
            return Ok(());
        }

        // Load/store halfword, signed byte/halfword, or doubleword.
        let base_reg = insn as usize >> 16 & 15;
        let data_reg = insn as usize >> 12 & 15;
        let mut offset = if insn & 1 << 22 != 0 {
            (insn & 0x0F) | (insn >> 4 & 0xF0)
        } else {
            self.get_reg(insn as usize & 15)?
        };
        let mut addr = self.reg_pc(base_reg);

        if insn & 1 << 23 == 0 {
            // Subtracted offset
            offset = offset.wrapping_neg();
        }

        let writeback;
        if insn & 1 << 24 != 0 {
            // Offset or pre-indexed addressing
            addr = addr.wrapping_add(offset);
            offset = 0;
            writeback = insn & 1 << 21 != 0;
        } else {
            if insn & 1 << 21 != 0 {
                return Err(PhxError::TTypeAccess(insn).into());
            }
            writeback = true;
        }

        if insn & 1 << 20 != 0 {
            if base_reg == data_reg && writeback {
                return Err(PhxError::BaseWritebackConflict(insn).into());
            }
            let data = match transfer_type {
                1 => self.read_half(addr)?,                      // LDRH
                2 => self.read_byte(addr)? as i8 as i32 as u32,  // LDRSB
                _ => self.read_half(addr)? as i16 as i32 as u32, // LDRSH
            };
            self.set_reg(data_reg, data)?;
        } else if transfer_type == 1 {
            // STRH
            let data = self.get_reg(data_reg)?;
            self.write_half(addr, data)?;
        } else {
            if data_reg & 1 != 0 {
                return Err(PhxError::OddDoublewordRegister(insn).into());
            }
            if transfer_type == 2 {
                // LDRD
                if base_reg & !1 == data_reg && writeback {
                    return Err(PhxError::BaseWritebackConflict(insn).into());
                }
                let low = self.read_word(addr)?;
                let high = self.read_word(addr.wrapping_add(4))?;
                self.set_reg(data_reg, low)?;
                self.set_reg(data_reg + 1, high)?;
            } else {
                // STRD
                let low = self.get_reg(data_reg)?;
                let high = self.get_reg(data_reg + 1)?;
                self.write_word(addr, low)?;
                self.write_word(addr.wrapping_add(4), high)?;
            }
        }
        if writeback {
            self.set_reg(base_reg, addr.wrapping_add(offset))?;
        }
        Ok(())
    }

    /// The miscellaneous block: BX/BLX, MRS/MSR, the signed multiplies,
    /// saturated arithmetic, CLZ, and BKPT.
    fn arm_miscellaneous(&mut self, insn: u32) -> Result<(), Trap> {
        if insn & 0x0FFFFFD0 == 0x012FFF10 {
            // B(L)X: branch(, link,) and exchange the T bit.
            let target = self.reg_pc(insn as usize & 15);
            if insn & 0x20 != 0 {
                self.reg[14] = self.reg[15];
            }
            self.set_reg_pc_bx(15, target);
        } else if insn & 0x0FBF0FFF == 0x010F0000 {
            // MRS: move reg <- status.
            let psr = if insn & 0x0400000 != 0 { self.get_spsr()? } else { self.get_cpsr() };
            self.set_reg(insn as usize >> 12 & 15, psr)?;
        } else if insn & 0x0FB0FFF0 == 0x0120F000 || insn & 0x0FB0F000 == 0x0320F000 {
            // MSR: move status <- reg/imm.
            let value = if insn & 0x2000000 != 0 {
                self.shifted_immed(insn, false)
            } else {
                self.get_reg(insn as usize & 15)?
            };
            let mut mask = 0;
            if insn & 0x0080000 != 0 { mask |= 0xFF000000; }
            if insn & 0x0040000 != 0 { mask |= 0x00FF0000; }
            if insn & 0x0020000 != 0 { mask |= 0x0000FF00; }
            if insn & 0x0010000 != 0 { mask |= 0x000000FF; }
            if insn & 0x0400000 != 0 {
                self.set_spsr(value, mask)?;
            } else {
                self.set_cpsr(value, mask)?;
            }
        } else if insn & 0x0F900090 == 0x01000080 {
            self.arm_signed_multiply(insn)?;
        } else if insn & 0x0F900FF0 == 0x01000050 {
            // QADD, QSUB, QDADD, QDSUB: saturated arithmetic.
            let left = self.get_reg(insn as usize & 15)?;
            let mut right = self.get_reg(insn as usize >> 16 & 15)?;
            if insn & 0x400000 != 0 {
                // Doubled right operand.
                let doubled = right.wrapping_shl(1);
                right = if add_overflow(right, right, doubled) {
                    self.cpsr_low28 |= Q_BIT;
                    if (doubled as i32) < 0 { 0x7FFFFFFF } else { 0x80000000 }
                } else {
                    doubled
                };
            }
            let (res, overflow) = if insn & 0x200000 == 0 {
                let r = left.wrapping_add(right);
                (r, add_overflow(left, right, r))
            } else {
                let r = left.wrapping_sub(right);
                (r, sub_overflow(left, right, r))
            };
            let res = if overflow {
                self.cpsr_low28 |= Q_BIT;
                if (res as i32) < 0 { 0x7FFFFFFF } else { 0x80000000 }
            } else {
                res
            };
            self.set_reg(insn as usize >> 12 & 15, res)?;
        } else if insn & 0x0FFF0FF0 == 0x016F0F10 {
            // CLZ: count leading zeros.
            let zeros = self.get_reg(insn as usize & 15)?.leading_zeros();
            self.set_reg(insn as usize >> 12 & 15, zeros)?;
        } else if insn & 0xFFF000F0 == 0xE1200070 {
            // BKPT.
            let comment = (insn >> 4 & 0xFFF0) | (insn & 0xF);
            info!("Software breakpoint at {:#010X} ({:#06X})", self.reg[15], comment);
            return Err(Trap::Debug(DebugEntry::SoftwareBreakpoint(comment)));
        } else {
            return Err(PhxError::InvalidArmInstruction(insn).into());
        }
        Ok(())
    }

    /// SMUL<x><y>, SMULW<y>, SMLA<x><y>, SMLAW<y>, SMLAL<x><y>.
    fn arm_signed_multiply(&mut self, insn: u32) -> Result<(), Trap> {
        let left = self.get_reg(insn as usize & 15)? as i32;
        let right_shift = if insn & 0x40 != 0 { 16 } else { 0 };
        let right = (self.get_reg(insn as usize >> 8 & 15)? >> right_shift) as i16;
        let mul_type = insn >> 21 & 3;

        let product: i32;
        let mut accumulate_32 = mul_type == 0;
        if mul_type == 1 {
            // SMULW<y>, SMLAW<y>: 32x16 to 48, keeping the top 32 bits.
            product = ((left as i64 * right as i64) >> 16) as i32;
            accumulate_32 = insn & 0x20 == 0;
        } else {
            // SMUL<x><y>, SMLA<x><y>, SMLAL<x><y>: 16x16 to 32.
            let half_left = (left >> if insn & 0x20 != 0 { 16 } else { 0 }) as i16;
            product = half_left as i32 * right as i32;
        }

        if mul_type == 2 {
            // SMLAL<x><y>: 64-bit accumulate.
            let reg_lo = insn as usize >> 12 & 15;
            let reg_hi = insn as usize >> 16 & 15;
            if reg_lo == reg_hi {
                return Err(PhxError::LongMultiplyRegisterReuse(insn).into());
            }
            let acc = (self.get_reg(reg_hi)? as u64) << 32 | self.get_reg(reg_lo)? as u64;
            let sum = (product as i64).wrapping_add(acc as i64);
            self.set_reg(reg_lo, sum as u32)?;
            self.set_reg(reg_hi, (sum >> 32) as u32)?;
        } else if accumulate_32 {
            // SMLA<x><y>, SMLAW<y>: 32-bit accumulate, Q on overflow.
            let acc = self.get_reg(insn as usize >> 12 & 15)? as i32;
            let sum = product.wrapping_add(acc);
            if add_overflow(product as u32, acc as u32, sum as u32) {
                self.cpsr_low28 |= Q_BIT;
            }
            self.set_reg(insn as usize >> 16 & 15, sum as u32)?;
        } else {
            // SMUL<x><y>, SMULW<y>: no accumulate.
            self.set_reg(insn as usize >> 16 & 15, product as u32)?;
        }
        Ok(())
    }

    /// The sixteen data-processing operations.
    fn arm_data_processing(&mut self, insn: u32) -> Result<(), Trap> {
        let setcc = insn >> 20 & 1 != 0;
        let opcode = insn >> 21 & 15;
        let dest_reg = insn as usize >> 12 & 15;

        // The shifter may overwrite C; ADC/SBC/RSC want the old value.
        let c = self.cpsr_c as u32;

        let left = self.reg_pc(insn as usize >> 16 & 15);
        let right = if insn & 1 << 25 != 0 {
            self.shifted_immed(insn, setcc)
        } else {
            self.shifted_reg(insn, setcc)?
        };

        let res = match opcode {
            0 => left & right,                          // AND
            1 => left ^ right,                          // EOR
            2 => self.add(left, !right, 1, setcc),      // SUB
            3 => self.add(!left, right, 1, setcc),      // RSB
            4 => self.add(left, right, 0, setcc),       // ADD
            5 => self.add(left, right, c, setcc),       // ADC
            6 => self.add(left, !right, c, setcc),      // SBC
            7 => self.add(!left, right, c, setcc),      // RSC
            8 => left & right,                          // TST
            9 => left ^ right,                          // TEQ
            10 => self.add(left, !right, 1, setcc),     // CMP
            11 => self.add(left, right, 0, setcc),      // CMN
            12 => left | right,                         // ORR
            13 => right,                                // MOV
            14 => left & !right,                        // BIC
            _ => !right,                                // MVN
        };

        if opcode & 12 == 8 {
            if dest_reg != 0 {
                return Err(PhxError::NonzeroCompareDestination(insn).into());
            }
        } else {
            self.set_reg_pc(dest_reg, res);
        }

        if setcc {
            self.set_nz_flags(res);
            if dest_reg == 15 {
                let spsr = self.get_spsr()?;
                self.set_cpsr_full(spsr)?;
            }
        }
        Ok(())
    }

    /// LDR(B), STR(B): byte/word memory access.
    fn arm_single_transfer(&mut self, insn: u32) -> Result<(), Trap> {
        let base_reg = insn as usize >> 16 & 15;
        let data_reg = insn as usize >> 12 & 15;

        let mut offset = if insn & 1 << 25 != 0 {
            if insn & 1 << 4 != 0 {
                return Err(PhxError::InvalidShiftEncoding(insn).into());
            }
            self.shifted_reg(insn, false)?
        } else {
            insn & 0xFFF
        };

        let mut addr = self.reg_pc(base_reg);

        if insn & 1 << 23 == 0 {
            // Subtracted offset
            offset = offset.wrapping_neg();
        }

        let writeback;
        if insn & 1 << 24 != 0 {
            // Offset or pre-indexed addressing
            addr = addr.wrapping_add(offset);
            offset = 0;
            writeback = insn & 1 << 21 != 0;
        } else {
            if insn & 1 << 21 != 0 {
                return Err(PhxError::TTypeAccess(insn).into());
            }
            writeback = true;
        }

        if insn & 1 << 20 != 0 {
            if data_reg == base_reg && writeback {
                return Err(PhxError::BaseWritebackConflict(insn).into());
            }
            let data = if insn & 1 << 22 != 0 {
                self.read_byte(addr)?
            } else {
                self.read_word_ldr(addr)?
            };
            self.set_reg_pc_bx(data_reg, data);
        } else {
            let data = self.reg_pc_store(data_reg);
            if insn & 1 << 22 != 0 {
                self.write_byte(addr, data)?;
            } else {
                self.write_word(addr, data)?;
            }
        }
        if writeback {
            self.set_reg(base_reg, addr.wrapping_add(offset))?;
        }
        Ok(())
    }

    /// LDM, STM: load/store multiple, with the S-bit user-bank override.
    fn arm_block_transfer(&mut self, insn: u32) -> Result<(), Trap> {
        enum Slot {
            Reg(usize),
            Usr13(usize),
            Usr8(usize),
            NewBase,
        }

        let base_reg = insn as usize >> 16 & 15;
        let mut addr = self.get_reg(base_reg)?;
        let mut new_base = addr;
        let count = (insn & 0xFFFF).count_ones();
        let load = insn & 1 << 20 != 0;

        if insn & 1 << 23 != 0 {
            // Increasing
            if insn & 1 << 21 != 0 {
                new_base = new_base.wrapping_add(count * 4); // Writeback
            }
            if insn & 1 << 24 != 0 {
                addr = addr.wrapping_add(4); // Preincrement
            }
        } else {
            // Decreasing
            addr = addr.wrapping_sub(count * 4);
            if insn & 1 << 21 != 0 {
                new_base = addr; // Writeback
            }
            if insn & 1 << 24 == 0 {
                addr = addr.wrapping_add(4); // Postdecrement
            }
        }

        // With the S bit, and unless this is a load including R15,
        // r8..r14 go to the user bank regardless of the current mode.
        let user_bank = insn & 1 << 22 != 0 && !insn & (1 << 20 | 1 << 15) != 0;
        let mode = self.cpsr_low28 & 0x1F;

        for i in 0..15 {
            if insn >> i & 1 == 0 {
                continue;
            }
            let mut slot = Slot::Reg(i);
            if user_bank {
                if i >= 13 {
                    if mode != MODE_USR && mode != MODE_SYS {
                        slot = Slot::Usr13(i - 13);
                    }
                } else if i >= 8 && mode == MODE_FIQ {
                    slot = Slot::Usr8(i - 8);
                }
            }
            if load {
                if let Slot::Reg(r) = slot {
                    if r == base_reg {
                        if insn & 1 << 21 != 0 {
                            return Err(PhxError::BaseWritebackConflict(insn).into());
                        }
                        slot = Slot::NewBase;
                    }
                }
                let value = self.read_word(addr)?;
                match slot {
                    Slot::Reg(r) => self.reg[r] = value,
                    Slot::Usr13(k) => self.r13_banks[0][k] = value,
                    Slot::Usr8(k) => self.r8_usr[k] = value,
                    Slot::NewBase => new_base = value,
                }
            } else {
                let value = match slot {
                    Slot::Reg(r) => self.reg[r],
                    Slot::Usr13(k) => self.r13_banks[0][k],
                    Slot::Usr8(k) => self.r8_usr[k],
                    Slot::NewBase => unreachable!(),
                };
                self.write_word(addr, value)?;
            }
            addr = addr.wrapping_add(4);
        }

        if insn & 1 << 15 != 0 {
            if load {
                let value = self.read_word(addr)?;
                self.set_reg_pc_bx(15, value);
            } else {
                let value = self.reg_pc_store(15);
                self.write_word(addr, value)?;
            }
        }
        self.reg[base_reg] = new_base;

        if !insn & (1 << 22 | 1 << 20 | 1 << 15) == 0 {
            // LDM with S and R15: also return from exception.
            let spsr = self.get_spsr()?;
            self.set_cpsr_full(spsr)?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::super::test_cpu;
    use super::super::{MODE_ABT, MODE_SVC};
    use super::super::super::memory::SDRAM_FIRST;

    fn run_program(words: &[u32], budget: i32) -> Arm926 {
        let mut cpu = test_cpu();
        let base = SDRAM_FIRST + 0x8000;
        for (i, w) in words.iter().enumerate() {
            cpu.write_word(base + 4 * i as u32, *w).unwrap();
        }
        cpu.reg[15] = base;
        cpu.cycle_count_delta = -budget;
        cpu.run_arm().unwrap();
        cpu
    }

    #[test]
    fn adds_sets_overflow_into_the_sign_bit() {
        let mut cpu = test_cpu();
        cpu.reg[0] = 0x7FFFFFFF;
        cpu.interpret_arm(0xE2901001).unwrap(); // adds r1, r0, #1
        assert_eq!(cpu.reg[1], 0x80000000);
        assert!(cpu.cpsr_n);
        assert!(!cpu.cpsr_z);
        assert!(!cpu.cpsr_c);
        assert!(cpu.cpsr_v);
    }

    #[test]
    fn false_conditions_only_advance_the_pc() {
        let mut cpu = test_cpu();
        cpu.cpsr_n = true;
        cpu.cpsr_z = false;
        cpu.cpsr_c = true;
        cpu.cpsr_v = false;
        let truth = [
            false, true,          // EQ, NE
            true, false,          // CS, CC
            true, false,          // MI, PL
            false, true,          // VS, VC
            true, false,          // HI, LS
            false, true,          // GE, LT
            false, true,          // GT, LE
            true,                 // AL
        ];
        for (cond, &should_exec) in truth.iter().enumerate() {
            let mut cpu2 = test_cpu();
            cpu2.cpsr_n = cpu.cpsr_n;
            cpu2.cpsr_z = cpu.cpsr_z;
            cpu2.cpsr_c = cpu.cpsr_c;
            cpu2.cpsr_v = cpu.cpsr_v;
            let before = cpu2.registers();
            cpu2.interpret_arm((cond as u32) << 28 | 0x03A01001).unwrap(); // mov r1, #1
            assert_eq!(cpu2.reg[1] == 1, should_exec, "condition {:#X}", cond);
            if !should_exec {
                assert_eq!(cpu2.registers(), before);
            }
        }
    }

    #[test]
    fn bx_enters_thumb_state_on_odd_targets() {
        let mut cpu = test_cpu();
        cpu.reg[0] = 0x9001;
        cpu.interpret_arm(0xE12FFF10).unwrap(); // bx r0
        assert_eq!(cpu.reg[15], 0x9000);
        assert!(cpu.is_thumb());

        let mut cpu = test_cpu();
        cpu.reg[0] = 0x9000;
        cpu.interpret_arm(0xE12FFF10).unwrap();
        assert_eq!(cpu.reg[15], 0x9000);
        assert!(!cpu.is_thumb());
    }

    #[test]
    fn msr_switches_to_user_and_locks_itself_out() {
        let mut cpu = test_cpu();
        cpu.set_cpsr_full(0xC0 | MODE_SVC).unwrap();
        cpu.reg[13] = 0x1000;

        cpu.interpret_arm(0xE321F010).unwrap(); // msr cpsr_c, #0x10
        assert_eq!(cpu.get_cpsr() & 0x1F, MODE_USR);
        assert_eq!(cpu.reg[13], 0);

        cpu.reg[13] = 0x2000;
        // MSR from user mode must not touch the privileged bits.
        cpu.interpret_arm(0xE321F013).unwrap(); // msr cpsr_c, #0x13
        assert_eq!(cpu.get_cpsr() & 0x1F, MODE_USR);

        cpu.set_cpsr_full(0xC0 | MODE_SVC).unwrap();
        assert_eq!(cpu.reg[13], 0x1000);
    }

    #[test]
    fn swi_vectors_high_when_configured() {
        let mut cpu = test_cpu();
        cpu.cp15.control |= 0x2000;
        cpu.set_cpsr_full(0x1F).unwrap(); // SYS, interrupts enabled
        cpu.reg[15] = 0x8004; // advanced past the SWI at 0x8000
        cpu.interpret_arm(0xEF000000).unwrap(); // swi 0
        assert_eq!(cpu.reg[14], 0x8004);
        assert_eq!(cpu.get_cpsr() & 0x1F, MODE_SVC);
        assert_ne!(cpu.get_cpsr() & 0x80, 0);
        assert_eq!(cpu.reg[15], 0xFFFF0008);
    }

    #[test]
    fn long_multiply_accumulates_64_bits() {
        let mut cpu = test_cpu();
        cpu.reg[1] = 0xFFFFFFFF;
        cpu.reg[2] = 0x10;
        cpu.reg[3] = 1; // RdLo seed
        cpu.reg[4] = 2; // RdHi seed
        cpu.interpret_arm(0xE0A43192).unwrap(); // umlal r3, r4, r2, r1
        let res = 0xFFFFFFFFu64 * 0x10 + (2u64 << 32 | 1);
        assert_eq!(cpu.reg[3], res as u32);
        assert_eq!(cpu.reg[4], (res >> 32) as u32);
    }

    #[test]
    fn long_multiply_register_reuse_is_fatal() {
        let mut cpu = test_cpu();
        assert!(cpu.interpret_arm(0xE0833192).is_err()); // umull r3, r3, ...
    }

    #[test]
    fn qdadd_saturates_and_sets_q() {
        let mut cpu = test_cpu();
        cpu.reg[0] = 0x40000000;
        cpu.reg[1] = 0x60000000;
        // Doubling r1 saturates to 0x7FFFFFFF; the sum saturates again.
        cpu.interpret_arm(0xE1412050).unwrap(); // qdadd r2, r0, r1
        assert_eq!(cpu.reg[2], 0x7FFFFFFF);
        assert_ne!(cpu.get_cpsr() & Q_BIT, 0);
    }

    #[test]
    fn clz_counts_leading_zeros() {
        let mut cpu = test_cpu();
        cpu.reg[3] = 0x00010000;
        cpu.interpret_arm(0xE16F2F13).unwrap(); // clz r2, r3
        assert_eq!(cpu.reg[2], 15);
        cpu.reg[3] = 0;
        cpu.interpret_arm(0xE16F2F13).unwrap();
        assert_eq!(cpu.reg[2], 32);
    }

    #[test]
    fn compare_with_destination_bits_is_fatal() {
        let mut cpu = test_cpu();
        // cmp r1, r3 with a nonzero destination field.
        assert!(cpu.interpret_arm(0xE1512003).is_err());
    }

    #[test]
    fn ldr_str_with_writeback() {
        let mut cpu = test_cpu();
        let base = SDRAM_FIRST + 0x100;
        cpu.reg[1] = base;
        cpu.reg[2] = 0xDEAD;
        cpu.interpret_arm(0xE4812004).unwrap(); // str r2, [r1], #4
        assert_eq!(cpu.reg[1], base + 4);
        assert_eq!(cpu.read_word(base).unwrap(), 0xDEAD);

        cpu.interpret_arm(0xE5313004).unwrap(); // ldr r3, [r1, #-4]!
        assert_eq!(cpu.reg[1], base);
        assert_eq!(cpu.reg[3], 0xDEAD);
    }

    #[test]
    fn store_of_r15_sees_pc_plus_8() {
        let mut cpu = test_cpu();
        cpu.reg[1] = SDRAM_FIRST + 0x40;
        cpu.reg[15] = 0x1234; // already advanced past the instruction
        cpu.interpret_arm(0xE581F000).unwrap(); // str r15, [r1]
        assert_eq!(cpu.read_word(SDRAM_FIRST + 0x40).unwrap(), 0x1234 + 8);
    }

    #[test]
    fn block_transfer_round_trip_descending_stack() {
        let mut cpu = test_cpu();
        cpu.reg[13] = SDRAM_FIRST + 0x1000;
        cpu.reg[0] = 0x10;
        cpu.reg[1] = 0x11;
        cpu.reg[2] = 0x12;
        cpu.interpret_arm(0xE92D0007).unwrap(); // stmdb sp!, {r0-r2}
        assert_eq!(cpu.reg[13], SDRAM_FIRST + 0x1000 - 12);
        cpu.reg[0] = 0;
        cpu.reg[1] = 0;
        cpu.reg[2] = 0;
        cpu.interpret_arm(0xE8BD0007).unwrap(); // ldmia sp!, {r0-r2}
        assert_eq!((cpu.reg[0], cpu.reg[1], cpu.reg[2]), (0x10, 0x11, 0x12));
        assert_eq!(cpu.reg[13], SDRAM_FIRST + 0x1000);
    }

    #[test]
    fn stm_with_s_bit_stores_the_user_bank() {
        let mut cpu = test_cpu();
        cpu.set_cpsr_full(0xC0 | MODE_USR).unwrap();
        cpu.reg[13] = 0x777;
        cpu.set_cpsr_full(0xC0 | MODE_SVC).unwrap();
        cpu.reg[13] = 0x111;
        cpu.reg[0] = SDRAM_FIRST + 0x200;
        cpu.interpret_arm(0xE8C02000).unwrap(); // stmia r0, {r13}^
        assert_eq!(cpu.read_word(SDRAM_FIRST + 0x200).unwrap(), 0x777);
        assert_eq!(cpu.reg[13], 0x111);
    }

    #[test]
    fn ldm_with_base_in_list_keeps_the_loaded_value() {
        let mut cpu = test_cpu();
        let base = SDRAM_FIRST + 0x300;
        cpu.write_word(base, 0xAAAA).unwrap();
        cpu.write_word(base + 4, 0xBBBB).unwrap();
        cpu.reg[1] = base;
        cpu.interpret_arm(0xE8910006).unwrap(); // ldmia r1, {r1, r2}
        assert_eq!(cpu.reg[1], 0xAAAA);
        assert_eq!(cpu.reg[2], 0xBBBB);
    }

    #[test]
    fn movs_pc_returns_via_spsr() {
        let mut cpu = test_cpu();
        cpu.set_cpsr_full(0xC0 | MODE_SVC).unwrap();
        cpu.set_spsr_full(0x60000010).unwrap(); // USR, Z and C set
        cpu.reg[14] = 0x4000;
        cpu.interpret_arm(0xE1B0F00E).unwrap(); // movs pc, lr
        assert_eq!(cpu.reg[15], 0x4000);
        assert_eq!(cpu.get_cpsr() & 0x1F, MODE_USR);
        assert!(cpu.cpsr_z && cpu.cpsr_c);
    }

    #[test]
    fn branch_with_link_records_the_return_address() {
        let cpu = run_program(&[
            0xEB000001, // bl +8 (to the mov below)
            0xE3A00001, // mov r0, #1 (skipped)
            0xE3A00002, // mov r0, #2
        ], 2);
        assert_eq!(cpu.reg[0], 2);
        assert_eq!(cpu.reg[14], SDRAM_FIRST + 0x8004);
    }

    #[test]
    fn inner_loop_runs_until_the_quantum_expires() {
        let mut cpu = test_cpu();
        let base = SDRAM_FIRST + 0x8000;
        cpu.write_word(base, 0xE2800001).unwrap();     // add r0, r0, #1
        cpu.write_word(base + 4, 0xEAFFFFFD).unwrap(); // b .-4
        cpu.reg[15] = base;
        cpu.cycle_count_delta = -10;
        assert_eq!(cpu.run_arm().unwrap(), CpuStop::Quantum);
        assert_eq!(cpu.cycle_count_delta, 0);
        assert_eq!(cpu.reg[0], 5);
    }

    #[test]
    fn breakpoint_flags_stop_the_loop() {
        use super::super::super::memory::RF_EXEC_BREAKPOINT;
        let mut cpu = test_cpu();
        let base = SDRAM_FIRST + 0x8000;
        cpu.write_word(base, 0xE3A00007).unwrap(); // mov r0, #7
        cpu.bus().borrow_mut().mem.set_flags(base, RF_EXEC_BREAKPOINT);
        cpu.reg[15] = base;
        cpu.cycle_count_delta = -10;
        assert_eq!(cpu.run_arm().unwrap(), CpuStop::Debug(DebugEntry::ExecBreakpoint));
        assert_eq!(cpu.reg[0], 0, "breakpoint must fire before execution");

        // After the debugger resumes, the instruction executes once.
        cpu.set_debug_resume();
        assert_eq!(cpu.run_arm().unwrap(), CpuStop::Quantum);
        assert_eq!(cpu.reg[0], 7);
    }

    #[test]
    fn data_abort_enters_the_abort_handler() {
        let mut cpu = test_cpu();
        let base = SDRAM_FIRST + 0x8000;
        let table = SDRAM_FIRST;
        // Identity-map the code section, leave everything else unmapped.
        cpu.write_word(table + (base >> 20) * 4,
                       (base & 0xFFF00000) | 3 << 10 | 2).unwrap();
        cpu.write_word(base, 0xE5910000).unwrap(); // ldr r0, [r1]
        cpu.cp15.translation_table_base = table;
        cpu.cp15.domain_access_control = 1;
        cpu.cp15.control |= 1;
        cpu.flush_address_cache();

        cpu.reg[1] = 0x50000000;
        cpu.reg[15] = base;
        cpu.cycle_count_delta = -1;
        cpu.run_arm().unwrap();
        assert_eq!(cpu.get_cpsr() & 0x1F, MODE_ABT);
        assert_eq!(cpu.cp15.fault_address, 0x50000000);
        // LR points at the faulting instruction + 8.
        assert_eq!(cpu.registers()[14], base + 8);
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
