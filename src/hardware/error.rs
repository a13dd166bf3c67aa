// License below.
//! Implements the crate-wide error type of the emulator.
//!
//! Only *fatal* conditions live here, i.e. situations where the emulated
//! machine cannot meaningfully continue and the emulator stops with a
//! diagnostic. Guest-visible faults (prefetch/data aborts, undefined
//! instructions) are delivered as ARM exceptions instead and never show
//! up as `PhxError`.
#![warn(missing_docs)]

use std::error;
use std::fmt;
use std::io;


/// An unrecoverable emulator error.
#[derive(Debug)]
pub enum PhxError {
    /// Undecodable instruction in ARM state.
    InvalidArmInstruction(u32),
    /// Undecodable instruction in THUMB state.
    InvalidThumbInstruction(u16),
    /// Unconditional-space encoding that is neither PLD nor BLX.
    InvalidConditionCode(u32),
    /// An instruction tried to set the Jazelle state bit.
    JStateUnsupported,
    /// MSR tried to set the THUMB bit.
    MsrSetsThumb,
    /// The CPSR mode bits hold no valid processor mode.
    InvalidProcessorMode(u32),
    /// SPSR access from user or system mode.
    SpsrInUserMode,
    /// R15 used where the instruction set forbids it.
    InvalidUseOfR15,
    /// A malformed shift field (bit 7 set on a register-specified count,
    /// or a register-shifted memory offset).
    InvalidShiftEncoding(u32),
    /// A compare instruction with a nonzero destination field.
    NonzeroCompareDestination(u32),
    /// LDRD/STRD with an odd-numbered data register.
    OddDoublewordRegister(u32),
    /// 64-bit multiply or accumulate with RdLo == RdHi.
    LongMultiplyRegisterReuse(u32),
    /// SWP whose load and store would target the same register.
    SwpRegisterAliasing(u32),
    /// A load that would modify its base register twice.
    BaseWritebackConflict(u32),
    /// Post-indexed access with the W bit (translation override).
    TTypeAccess(u32),
    /// A value written to the CP15 control register that the model
    /// does not implement.
    InvalidControlValue(u32),
    /// NAND program or erase attempted with write protection on.
    NandWriteProtected(u8),
    /// NAND controller DMA address that is not backed by RAM.
    NandDmaOutsideRam(u32),
    /// NAND controller "begin" register written with anything but 1.
    NandBadBeginValue(u32),
    /// CX NAND controller operation with more than 4 address bytes.
    NandAddressBytes(u32),
    /// The program counter points at unmapped or device memory.
    BadPc(u32),
    /// A file is not a flash image (neither 33 MiB nor 132 MiB).
    BadFlashImageSize(u64),
    /// The SDRAM size encoded in the flash image is out of range.
    BadSdramConfig(u32),
    /// An I/O error talking to the flash image or preload files.
    Io(io::Error),
}

impl fmt::Display for PhxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PhxError::InvalidArmInstruction(x)     => write!(f, "Unrecognized ARM instruction {:#010X}", x),
            PhxError::InvalidThumbInstruction(x)   => write!(f, "Unrecognized THUMB instruction {:#06X}", x),
            PhxError::InvalidConditionCode(x)      => write!(f, "Invalid condition code in instruction {:#010X}", x),
            PhxError::JStateUnsupported            => write!(f, "Jazelle state is not implemented"),
            PhxError::MsrSetsThumb                 => write!(f, "Cannot set T bit with MSR instruction"),
            PhxError::InvalidProcessorMode(x)      => write!(f, "Invalid processor mode {:#04X}", x),
            PhxError::SpsrInUserMode               => write!(f, "Attempted to access SPSR from user or system mode"),
            PhxError::InvalidUseOfR15              => write!(f, "Invalid use of R15"),
            PhxError::InvalidShiftEncoding(x)      => write!(f, "Invalid shift encoding in instruction {:#010X}", x),
            PhxError::NonzeroCompareDestination(x) => write!(f, "Compare instruction {:#010X} has nonzero destination reg", x),
            PhxError::OddDoublewordRegister(x)     => write!(f, "LDRD/STRD with odd-numbered data register in {:#010X}", x),
            PhxError::LongMultiplyRegisterReuse(x) => write!(f, "RdLo and RdHi cannot be same for 64-bit multiply in {:#010X}", x),
            PhxError::SwpRegisterAliasing(x)       => write!(f, "SWP reuses its base register in {:#010X}", x),
            PhxError::BaseWritebackConflict(x)     => write!(f, "Load instruction {:#010X} modifies base register twice", x),
            PhxError::TTypeAccess(x)               => write!(f, "T-type memory access not implemented ({:#010X})", x),
            PhxError::InvalidControlValue(x)       => write!(f, "Bad or unimplemented control register value {:#010X}", x),
            PhxError::NandWriteProtected(c)        => write!(f, "NAND command {:#04X} with write protect on", c),
            PhxError::NandDmaOutsideRam(a)         => write!(f, "NAND controller: address {:#010X} is not in RAM", a),
            PhxError::NandBadBeginValue(v)         => write!(f, "NAND controller: wrote {:#X} instead of 1 to begin register", v),
            PhxError::NandAddressBytes(n)          => write!(f, "NAND controller: {} address bytes not implemented", n),
            PhxError::BadPc(pc)                    => write!(f, "Bad PC: {:#010X}", pc),
            PhxError::BadFlashImageSize(n)         => write!(f, "Not a flash image: {} bytes is neither 33 MiB nor 132 MiB", n),
            PhxError::BadSdramConfig(x)            => write!(f, "Invalid SDRAM size in flash ({:#010X})", x),
            PhxError::Io(ref e)                    => write!(f, "I/O error: {}", e),
        }
    }
}

impl error::Error for PhxError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            PhxError::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PhxError {
    fn from(e: io::Error) -> PhxError { PhxError::Io(e) }
}

impl PartialEq for PhxError {
    fn eq(&self, other: &PhxError) -> bool {
        match (self, other) {
            (PhxError::Io(a), PhxError::Io(b)) => a.kind() == b.kind(),
            (a, b) => format!("{:?}", a) == format!("{:?}", b) && !matches!(a, PhxError::Io(_)),
        }
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
