// License below.
//! Implements the prioritized interrupt controller.
//!
//! Thirty-two input lines are aggregated onto the CPU's two interrupt
//! inputs. Each line can be inverted, can be latched ("sticky"), carries
//! a 3-bit priority (0 = highest, 7 = lowest), and is enabled per CPU
//! line through a mask pair. The derivation chain on every register
//! write is:
//!
//! ```text
//! raw_status    = active ^ ~noninverted
//! sticky_status |= rising edges of raw_status
//! status        = raw_status under ~sticky, sticky_status under sticky
//! ```
//!
//! A line contributes to IRQ (FIQ) if it is set in `status`, enabled in
//! the IRQ (FIQ) mask, and its priority is below the corresponding
//! priority limit. Reading the acknowledge register snapshots the limit
//! and raises it to the priority of the taken line, masking lower
//! priorities until the handler restores the saved limit.
//!
//! Register map: per-CPU banks at +0x000 (IRQ) and +0x100 (FIQ), the
//! inversion/sticky configuration at +0x200/+0x204, and the per-line
//! priorities at +0x300.
#![warn(missing_docs)]

use std::rc::Rc;
use super::events::{EventWord, INT_LINE_FIQ, INT_LINE_IRQ};


/// Priority limit that masks nothing (all 3-bit priorities pass).
const PRI_LIMIT_NONE: u8 = 8;

/// The interrupt controller state.
pub struct InterruptController {
    active: u32,
    raw_status: u32,
    sticky_status: u32,
    status: u32,
    mask: [u32; 2],
    prev_pri_limit: [u8; 2],
    priority_limit: [u8; 2],
    noninverted: u32,
    sticky: u32,
    priority: [u8; 32],

    events: Rc<EventWord>,
}

impl InterruptController {
    /// Creates a controller in its reset state.
    pub fn new(events: Rc<EventWord>) -> InterruptController {
        let mut intc = InterruptController {
            active: 0,
            raw_status: 0,
            sticky_status: 0,
            status: 0,
            mask: [0; 2],
            prev_pri_limit: [PRI_LIMIT_NONE; 2],
            priority_limit: [PRI_LIMIT_NONE; 2],
            noninverted: 0,
            sticky: 0,
            priority: [0; 32],
            events,
        };
        // Seed the edge detector with the steady state so nothing latches
        // before the first real transition.
        intc.raw_status = intc.active ^ !intc.noninverted;
        intc.update();
        intc
    }

    /// Resets everything except the raised input lines.
    pub fn reset(&mut self) {
        self.sticky_status = 0;
        self.status = 0;
        self.mask = [0; 2];
        self.prev_pri_limit = [PRI_LIMIT_NONE; 2];
        self.priority_limit = [PRI_LIMIT_NONE; 2];
        self.noninverted = 0;
        self.sticky = 0;
        self.priority = [0; 32];
        self.raw_status = self.active ^ !self.noninverted;
        self.update();
    }

    /// Drives one input line.
    pub fn set_line(&mut self, line: u32, on: bool) {
        if on {
            self.active |= 1 << line;
        } else {
            self.active &= !(1 << line);
        }
        self.update();
    }

    /// Reads a controller register.
    pub fn read_word(&mut self, offset: u32) -> u32 {
        match offset {
            0x000..=0x1FF => {
                let cpu = (offset >> 8 & 1) as usize;
                match offset & 0xFF {
                    0x00 => self.status & self.mask[cpu],
                    0x04 => self.status,
                    0x08 => self.mask[cpu],
                    0x24 => self.acknowledge(cpu),
                    0x28 => self.prev_pri_limit[cpu] as u32,
                    0x2C => self.priority_limit[cpu] as u32,
                    off => {
                        warn!("Bad interrupt controller read at offset {:#X}", off);
                        0
                    }
                }
            }
            0x200 => self.noninverted,
            0x204 => self.sticky,
            0x300..=0x37C => self.priority[(offset as usize - 0x300) / 4] as u32,
            off => {
                warn!("Bad interrupt controller read at offset {:#X}", off);
                0
            }
        }
    }

    /// Writes a controller register.
    pub fn write_word(&mut self, offset: u32, value: u32) {
        match offset {
            0x000..=0x1FF => {
                let cpu = (offset >> 8 & 1) as usize;
                match offset & 0xFF {
                    0x04 => self.sticky_status &= !value, // acknowledge latched lines
                    0x08 => self.mask[cpu] = value,
                    0x28 => self.priority_limit[cpu] = self.prev_pri_limit[cpu],
                    0x2C => self.priority_limit[cpu] = (value & 0xF) as u8,
                    off => warn!("Bad interrupt controller write at offset {:#X} (value {:#010X})", off, value),
                }
            }
            0x200 => self.noninverted = value,
            0x204 => self.sticky = value,
            0x300..=0x37C => self.priority[(offset as usize - 0x300) / 4] = (value & 7) as u8,
            off => warn!("Bad interrupt controller write at offset {:#X} (value {:#010X})", off, value),
        }
        self.update();
    }

    /// Takes the highest-priority pending line for the given CPU input,
    /// raising the priority limit until the handler restores it.
    fn acknowledge(&mut self, cpu: usize) -> u32 {
        let mut best: Option<u32> = None;
        let pending = self.status & self.mask[cpu];
        for line in 0..32 {
            if pending >> line & 1 == 0 || self.priority[line as usize] >= self.priority_limit[cpu] {
                continue;
            }
            if best.map_or(true, |b| self.priority[line as usize] < self.priority[b as usize]) {
                best = Some(line);
            }
        }
        match best {
            Some(line) => {
                self.prev_pri_limit[cpu] = self.priority_limit[cpu];
                self.priority_limit[cpu] = self.priority[line as usize];
                self.update();
                line
            }
            None => 0,
        }
    }

    /// Re-derives the status chain and posts the IRQ/FIQ lines.
    fn update(&mut self) {
        let raw = self.active ^ !self.noninverted;
        self.sticky_status |= raw & !self.raw_status;
        self.raw_status = raw;
        self.status = (raw & !self.sticky) | (self.sticky_status & self.sticky);

        let mut lines = 0;
        for cpu in 0..2 {
            let pending = self.status & self.mask[cpu];
            let limit = self.priority_limit[cpu];
            let taken = (0..32).any(|i| pending >> i & 1 != 0 && self.priority[i] < limit);
            if taken {
                lines |= if cpu == 0 { INT_LINE_IRQ } else { INT_LINE_FIQ };
            }
        }
        self.events.set_int_lines(lines);
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
