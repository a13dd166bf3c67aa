// License below.
//! Wires the CPU and the device models into one machine and drives the
//! execution loops.
//!
//! The model is single-threaded and cooperative: one thread owns all
//! processor and device state, and the inner loops suspend back to the
//! driver here on events, quantum expiry, state changes, and debugger
//! entries. Anything outside the emulation thread communicates only
//! through the event word.
#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

pub use self::cpu::{Arm926, CpuStop, DebugEntry};
pub use self::error::PhxError;
pub use self::events::EventWord;
pub use self::flash::NandFlash;

pub mod bus;
pub mod cpu;
pub mod error;
pub mod events;
pub mod flash;
pub mod interrupt;
pub mod memory;
pub mod mmu;
pub mod nandctl;

use self::bus::Bus;
use self::cpu::Exception;
use self::events::{EVENT_DEBUG_STEP, EVENT_FIQ, EVENT_IRQ, EVENT_RESET, EVENT_WAITING};
use self::memory::MemoryBanks;

/// Instructions per scheduling quantum.
///
/// The loops observe the event word between instructions, so the value
/// only bounds how long a quantum may run without the driver seeing
/// control, not interrupt latency.
const QUANTUM: i32 = 100_000;

/// The whole machine.
pub struct Phoenix {
    cpu: Arm926,
    bus: Rc<RefCell<Bus>>,
    events: Rc<EventWord>,
    product: u32,
}

impl Phoenix {
    /// Builds a machine around an opened or freshly created NAND chip.
    ///
    /// The product code and SDRAM size come out of the image's manuf
    /// data and select the hardware generation.
    pub fn new(nand: NandFlash) -> Result<Phoenix, PhxError> {
        let settings = nand.read_settings()?;
        let cx = settings.product >= 0x0F0;
        info!("Product {:03X}, {} MiB SDRAM, {} hardware.",
              settings.product, settings.sdram_size >> 20,
              if cx { "CX" } else { "classic" });

        let events = Rc::new(EventWord::new());
        let mem = MemoryBanks::new(settings.sdram_size);
        let bus = Rc::new(RefCell::new(Bus::new(mem, nand, cx, events.clone())));
        let cpu = Arm926::new(bus.clone(), events.clone());
        Ok(Phoenix { cpu, bus, events, product: settings.product })
    }

    /// The machine's product code.
    pub fn product(&self) -> u32 { self.product }

    /// The shared event word.
    pub fn events(&self) -> &Rc<EventWord> { &self.events }

    /// The CPU, for the debugger and for tests.
    pub fn cpu_mut(&mut self) -> &mut Arm926 { &mut self.cpu }

    /// Loads a boot ROM image into the ROM bank.
    pub fn load_boot_rom(&mut self, path: &Path) -> Result<(), PhxError> {
        let image = fs::read(path)?;
        self.bus.borrow_mut().mem.load_boot_rom(&image);
        info!("Loaded boot ROM `{}` ({} bytes).", path.display(), image.len());
        Ok(())
    }

    /// Resets the CPU and the devices, as the reset exception path does.
    pub fn reset(&mut self) -> Result<(), PhxError> {
        self.cpu.reset()?;
        let mut bus = self.bus.borrow_mut();
        bus.intc.reset();
        let Bus { ref mut phx, ref mut nand, .. } = *bus;
        phx.reset(nand);
        Ok(())
    }

    /// Writes every modified NAND block back to the image file.
    ///
    /// Only called from between quanta; the block-modified map is not
    /// shared with running guest code.
    pub fn save_flash(&mut self) -> Result<(), PhxError> {
        self.bus.borrow_mut().nand.save_changes()
    }

    /// Writes the whole flash image to a new backing file.
    pub fn save_flash_as(&mut self, path: &Path) -> Result<(), PhxError> {
        self.bus.borrow_mut().nand.save_as(path)
    }

    /// Dispatches pending events and runs one quantum of guest code.
    pub fn run_quantum(&mut self) -> Result<CpuStop, PhxError> {
        let events = self.events.get();
        if events & EVENT_RESET != 0 {
            info!("Reset requested.");
            self.events.clear(EVENT_RESET);
            self.reset()?;
        }
        if events & EVENT_FIQ != 0 {
            self.events.clear(EVENT_WAITING);
            self.cpu.exception(Exception::FastInterrupt)?;
        } else if events & EVENT_IRQ != 0 {
            self.events.clear(EVENT_WAITING);
            self.cpu.exception(Exception::NormalInterrupt)?;
        }

        self.cpu.cycle_count_delta = -QUANTUM;
        loop {
            let stop = if self.cpu.is_thumb() {
                self.cpu.run_thumb()?
            } else {
                self.cpu.run_arm()?
            };
            if stop != CpuStop::StateChange {
                return Ok(stop);
            }
        }
    }

    /// Whether the CPU idles in wait-for-interrupt with nothing pending.
    pub fn is_idle(&self) -> bool {
        let events = self.events.get();
        events & EVENT_WAITING != 0 && events & (EVENT_IRQ | EVENT_FIQ) == 0
    }

    /// Clears a debugger-step request (the driver owns the debugger
    /// hand-off; only the loops and the driver clear event bits).
    pub fn clear_debug_step(&self) {
        self.events.clear(EVENT_DEBUG_STEP);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::memory::SDRAM_FIRST;

    fn machine() -> Phoenix {
        let nand = NandFlash::create_new(false, 0x0E0, false, None, None).unwrap();
        Phoenix::new(nand).unwrap()
    }

    #[test]
    fn created_machine_reads_its_settings() {
        let phx = machine();
        assert_eq!(phx.product(), 0x0E0);

        let cx = Phoenix::new(NandFlash::create_new(true, 0x0F0, true, None, None).unwrap()).unwrap();
        assert!(cx.bus.borrow().is_cx());
    }

    #[test]
    fn driver_switches_between_arm_and_thumb_loops() {
        let mut phx = machine();
        let base = SDRAM_FIRST + 0x8000;
        {
            let cpu = phx.cpu_mut();
            // ARM: branch into THUMB code two words down.
            cpu.write_word(base, 0xE28F0005).unwrap();      // add r0, pc, #5
            cpu.write_word(base + 4, 0xE12FFF10).unwrap(); // bx r0
            // THUMB at base + 12: set r1, drop back to ARM via bx r2.
            cpu.write_half(base + 12, 0x2107).unwrap();     // movs r1, #7
            cpu.write_half(base + 14, 0x4710).unwrap();     // bx r2
            // ARM landing pad.
            cpu.write_word(base + 16, 0xE3A02020).unwrap(); // mov r2, #32
            cpu.set_register(2, base + 16);
            cpu.set_register(15, base);
        }
        let stop = phx.run_quantum().unwrap();
        assert_eq!(stop, CpuStop::Quantum);
        let regs = phx.cpu_mut().registers();
        assert_eq!(regs[1], 7);
        assert_eq!(regs[2], 32);
    }

    #[test]
    fn irq_event_vectors_into_the_interrupt_handler() {
        let mut phx = machine();
        let base = SDRAM_FIRST + 0x8000;
        {
            let cpu = phx.cpu_mut();
            cpu.write_word(base, 0xE3A00001).unwrap(); // mov r0, #1
            cpu.set_register(15, base);
            // Enable IRQs at the CPU.
            cpu.set_cpsr_full(0x40 | 0x13).unwrap();
        }
        // Raise line 17 through the controller with everything enabled.
        {
            let mut bus = phx.bus.borrow_mut();
            bus.intc.write_word(0x200, 0xFFFFFFFF);
            bus.intc.write_word(0x008, 1 << 17);
            bus.intc.set_line(17, true);
        }
        assert_ne!(phx.events().get() & EVENT_IRQ, 0);
        let stop = phx.run_quantum().unwrap();
        // The exception was taken before any instruction ran: the CPU is
        // in IRQ mode at the vector, with further IRQs masked.
        assert_eq!(stop, CpuStop::Quantum);
        let cpu = phx.cpu_mut();
        assert_eq!(cpu.get_cpsr() & 0x1F, 0x12);
        assert_eq!(phx.events().get() & EVENT_IRQ, 0);
    }

    #[test]
    fn reset_event_restarts_at_the_reset_vector() {
        let mut phx = machine();
        phx.cpu_mut().set_register(15, 0x1234);
        phx.events().set(EVENT_RESET);
        phx.run_quantum().unwrap();
        let cpu = phx.cpu_mut();
        assert_eq!(cpu.get_cpsr() & 0x1F, 0x13);
        assert_ne!(cpu.get_cpsr() & 0xC0, 0);
        // Execution restarted from the vector at 0; the empty boot ROM
        // decodes as condition-failed instructions, one per cycle.
        assert_eq!(cpu.registers()[15], QUANTUM as u32 * 4);
        assert_eq!(phx.events().get() & EVENT_RESET, 0);
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
