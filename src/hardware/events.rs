// License below.
//! Implements the event word shared between the execution loops and the
//! device models.
//!
//! The emulation thread owns all processor and device state; everything
//! else communicates with it by setting bits in the event word, which the
//! loops test between instructions and which only the loops clear. The
//! pending-interrupt lines and a mirror of the CPSR I/F disable bits live
//! next to it so either side of the comparison can trigger a recheck.
#![warn(missing_docs)]

use std::cell::Cell;

/// A normal interrupt is pending and enabled.
pub const EVENT_IRQ: u32 = 1;

/// A fast interrupt is pending and enabled.
pub const EVENT_FIQ: u32 = 2;

/// The machine should go through a reset.
pub const EVENT_RESET: u32 = 4;

/// The debugger wants control back after one instruction.
pub const EVENT_DEBUG_STEP: u32 = 8;

/// The CPU executed a wait-for-interrupt and is idling.
pub const EVENT_WAITING: u32 = 16;

/// Bit of the pending-interrupt word driven by the IRQ line.
pub const INT_LINE_IRQ: u32 = 0x80;

/// Bit of the pending-interrupt word driven by the FIQ line.
pub const INT_LINE_FIQ: u32 = 0x40;


/// The event word plus the interrupt-line state feeding it.
///
/// Shared as `Rc<EventWord>` between the machine driver, the CPU, and the
/// interrupt controller. All access goes through `Cell`s; the model is
/// single-threaded and cooperative, so there is no locking.
pub struct EventWord {
    events: Cell<u32>,
    lines: Cell<u32>,
    cpsr_disable: Cell<u32>,
    exiting: Cell<bool>,
}

impl EventWord {
    /// Creates a cleared event word.
    pub fn new() -> EventWord {
        EventWord {
            events: Cell::new(0),
            lines: Cell::new(0),
            cpsr_disable: Cell::new(0),
            exiting: Cell::new(false),
        }
    }

    /// Current event bits.
    pub fn get(&self) -> u32 { self.events.get() }

    /// Sets the given event bits.
    pub fn set(&self, bits: u32) { self.events.set(self.events.get() | bits); }

    /// Clears the given event bits.
    pub fn clear(&self, bits: u32) { self.events.set(self.events.get() & !bits); }

    /// Current pending-interrupt word (bits 7 and 6 are IRQ and FIQ).
    pub fn int_lines(&self) -> u32 { self.lines.get() }

    /// Replaces the pending-interrupt word and rechecks the event bits.
    pub fn set_int_lines(&self, lines: u32) {
        self.lines.set(lines);
        self.int_check();
    }

    /// Mirrors the I/F disable bits of the current CPSR and rechecks.
    ///
    /// Called by the CPU on every CPSR change so that masking interrupts
    /// takes effect before the next instruction.
    pub fn set_cpsr_disable(&self, low28: u32) {
        self.cpsr_disable.set(low28 & (INT_LINE_IRQ | INT_LINE_FIQ));
        self.int_check();
    }

    /// Re-derives `EVENT_IRQ`/`EVENT_FIQ` from the lines and the mask.
    pub fn int_check(&self) {
        let pending = self.lines.get() & !self.cpsr_disable.get();
        if pending & INT_LINE_IRQ != 0 { self.set(EVENT_IRQ); } else { self.clear(EVENT_IRQ); }
        if pending & INT_LINE_FIQ != 0 { self.set(EVENT_FIQ); } else { self.clear(EVENT_FIQ); }
    }

    /// Whether the emulator has been asked to shut down.
    pub fn exiting(&self) -> bool { self.exiting.get() }

    /// Requests a shutdown at the next instruction boundary.
    pub fn set_exiting(&self) { self.exiting.set(true); }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irq_line_masked_by_cpsr() {
        let ev = EventWord::new();
        ev.set_cpsr_disable(0xC0);
        ev.set_int_lines(INT_LINE_IRQ | INT_LINE_FIQ);
        assert_eq!(ev.get() & (EVENT_IRQ | EVENT_FIQ), 0);
        ev.set_cpsr_disable(0x40);
        assert_eq!(ev.get() & (EVENT_IRQ | EVENT_FIQ), EVENT_IRQ);
        ev.set_cpsr_disable(0x00);
        assert_eq!(ev.get() & (EVENT_IRQ | EVENT_FIQ), EVENT_IRQ | EVENT_FIQ);
        ev.set_int_lines(0);
        assert_eq!(ev.get() & (EVENT_IRQ | EVENT_FIQ), 0);
    }

    #[test]
    fn unrelated_bits_survive_rechecks() {
        let ev = EventWord::new();
        ev.set(EVENT_RESET | EVENT_DEBUG_STEP);
        ev.set_int_lines(INT_LINE_IRQ);
        ev.set_int_lines(0);
        assert_eq!(ev.get(), EVENT_RESET | EVENT_DEBUG_STEP);
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
