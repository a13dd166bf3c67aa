// License below.
//! Implements the mode encoding and helpers for the program status
//! registers.
//!
//! The CPSR itself is kept unpacked in the CPU (the four flag bits
//! separately from the low 28 bits) since the flags are written so much
//! more often than the rest; this module only knows about the packed
//! layout.
#![warn(missing_docs)]

/// Bit pattern for user mode.
pub const MODE_USR: u32 = 0x10;

/// Bit pattern for FIQ mode.
pub const MODE_FIQ: u32 = 0x11;

/// Bit pattern for IRQ mode.
pub const MODE_IRQ: u32 = 0x12;

/// Bit pattern for supervisor mode.
pub const MODE_SVC: u32 = 0x13;

/// Bit pattern for abort mode.
pub const MODE_ABT: u32 = 0x17;

/// Bit pattern for undefined mode.
pub const MODE_UND: u32 = 0x1B;

/// Bit pattern for system mode.
pub const MODE_SYS: u32 = 0x1F;

/// Mask of the mode bits.
pub const MODE_MASK: u32 = 0x1F;

/// THUMB state bit.
pub const T_BIT: u32 = 0x20;

/// FIQ disable bit.
pub const F_BIT: u32 = 0x40;

/// IRQ disable bit.
pub const I_BIT: u32 = 0x80;

/// Sticky saturation flag.
pub const Q_BIT: u32 = 1 << 27;


/// The banked-register slot of a mode.
///
/// USR and SYS share a bank; FIQ, IRQ, SVC, ABT, and UND each get their
/// own. `None` for bit patterns that are no valid mode.
pub fn bank_index(mode: u32) -> Option<usize> {
    match mode & MODE_MASK {
        MODE_USR | MODE_SYS => Some(0),
        MODE_FIQ => Some(1),
        MODE_IRQ => Some(2),
        MODE_SVC => Some(3),
        MODE_ABT => Some(4),
        MODE_UND => Some(5),
        _ => None,
    }
}

/// Whether the mode has its own SPSR.
pub fn has_spsr(mode: u32) -> bool {
    matches!(mode & MODE_MASK, MODE_FIQ | MODE_IRQ | MODE_SVC | MODE_ABT | MODE_UND)
}

/// Short name of a mode for diagnostics.
pub fn mode_name(mode: u32) -> &'static str {
    match mode & MODE_MASK {
        MODE_USR => "USR",
        MODE_FIQ => "FIQ",
        MODE_IRQ => "IRQ",
        MODE_SVC => "SVC",
        MODE_ABT => "ABT",
        MODE_UND => "UND",
        MODE_SYS => "SYS",
        _ => "???",
    }
}

/// Formats a packed CPSR as `[NZCV IF T MODE]` with lowercase letters
/// for clear bits.
pub fn format_psr(psr: u32) -> String {
    format!("[{}{}{}{} {}{} {} {}]",
        if psr >> 31 & 1 != 0 { 'N' } else { 'n' },
        if psr >> 30 & 1 != 0 { 'Z' } else { 'z' },
        if psr >> 29 & 1 != 0 { 'C' } else { 'c' },
        if psr >> 28 & 1 != 0 { 'V' } else { 'v' },
        if psr & I_BIT != 0 { 'I' } else { 'i' },
        if psr & F_BIT != 0 { 'F' } else { 'f' },
        if psr & T_BIT != 0 { "THUMB" } else { "-ARM-" },
        mode_name(psr),
    )
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mode_has_a_bank() {
        for mode in [MODE_USR, MODE_FIQ, MODE_IRQ, MODE_SVC, MODE_ABT, MODE_UND, MODE_SYS] {
            assert!(bank_index(mode).is_some());
        }
        assert_eq!(bank_index(MODE_USR), bank_index(MODE_SYS));
        assert_eq!(bank_index(0x00), None);
    }

    #[test]
    fn psr_formatting() {
        assert_eq!(format_psr(0xF00000D3), "[NZCV IF -ARM- SVC]");
        assert_eq!(format_psr(0x00000030), "[nzcv if THUMB USR]");
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
