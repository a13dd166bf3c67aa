// License below.
//! Implements the interactive debugger entered on breakpoints and
//! faults.
//!
//! The debugger is a small REPL: it reads CPU and memory state through
//! the same accessors the interpreter uses, toggles execution
//! breakpoints through the RAM flags, and resumes or single-steps by
//! setting event-word bits. The remote protocols (GDB and friends) are
//! separate front-ends and not part of this.
#![warn(missing_docs)]

use std::io;
use std::io::Write;

use super::hardware::cpu::{psr, Arm926, DebugEntry};
use super::hardware::events::EVENT_DEBUG_STEP;

/// The interactive debugger and its terminal settings.
pub struct Debugger {
    colour: bool,
}

impl Debugger {
    /// Creates a debugger without entering it.
    pub fn new() -> Debugger {
        Debugger { colour: true }
    }

    /// Configure whether prompts should be colourised.
    pub fn with_colour(&mut self, c: bool) -> &mut Debugger {
        self.colour = c;
        self
    }

    /// Runs the debugger until the user resumes, steps, or quits.
    pub fn enter(&mut self, cpu: &mut Arm926, entry: DebugEntry) {
        cpu.events().clear(EVENT_DEBUG_STEP);

        match entry {
            DebugEntry::ExecBreakpoint => {}
            DebugEntry::SoftwareBreakpoint(comment) =>
                println!("Stopped at software breakpoint ({:#X}).", comment),
            DebugEntry::Fault =>
                println!("Stopped on a fault."),
        }
        self.print_registers(cpu);

        let mut terminal = match term::stdout() {
            Some(t) => t,
            None => {
                warn!("No terminal available; resuming execution.");
                return;
            }
        };
        let mut input = String::new();

        loop {
            let line = match self.input_prompt(&mut terminal, &mut input) {
                Ok(line) => line,
                Err(e) => { error!("{}", e); break; } // Abort loop on error.
            };
            let mut words = line.split_whitespace();

            match words.next() {
                Some("c") | None => break,
                Some("s") => {
                    cpu.events().set(EVENT_DEBUG_STEP);
                    break;
                }
                Some("q") => {
                    cpu.events().set_exiting();
                    break;
                }
                Some("r") => self.print_registers(cpu),
                Some("x") => match parse_hex(words.next()) {
                    Some(addr) => self.examine(cpu, addr),
                    None => println!("\t\t<x needs a hex address>"),
                },
                Some("b") => match parse_hex(words.next()) {
                    Some(addr) => match cpu.toggle_breakpoint(addr) {
                        Some(true) => println!("Breakpoint set at {:#010X}.", addr),
                        Some(false) => println!("Breakpoint removed at {:#010X}.", addr),
                        None => println!("{:#010X} is not in RAM.", addr),
                    },
                    None => println!("\t\t<b needs a hex address>"),
                },
                _ => { write!(terminal, "\t\t<What?>\n").unwrap_or(()); }
            }
        }
    }

    fn print_registers(&self, cpu: &Arm926) {
        let r = cpu.registers();
        for row in 0..4 {
            println!("\tR{:<2} {:08X}  R{:<2} {:08X}  R{:<2} {:08X}  R{:<2} {:08X}",
                row * 4, r[row * 4],
                row * 4 + 1, r[row * 4 + 1],
                row * 4 + 2, r[row * 4 + 2],
                row * 4 + 3, r[row * 4 + 3]);
        }
        println!("\tCPSR {:08X} {}", cpu.get_cpsr(), psr::format_psr(cpu.get_cpsr()));
    }

    fn examine(&self, cpu: &mut Arm926, addr: u32) {
        for row in 0..4 {
            let base = addr + row * 16;
            print!("\t{:08X}:", base);
            for word in 0..4 {
                match cpu.read_word(base + word * 4) {
                    Ok(w) => print!(" {:08X}", w),
                    Err(_) => print!(" ????????"),
                }
            }
            println!();
        }
    }

    fn input_prompt<'a>(&self, terminal: &mut Box<term::StdoutTerminal>, input: &'a mut String)
                        -> io::Result<&'a str> {
        write!(terminal, "\t")?;
        if self.colour {
            terminal.fg(term::color::BLACK).unwrap_or(());
            terminal.bg(term::color::WHITE).unwrap_or(());
        }
        write!(terminal, "[c = Continue, s = Step, r = Regs, x ADDR, b ADDR, q = Quit]")?;
        terminal.reset().unwrap_or(());
        write!(terminal, "\n\t> ")?;
        io::stdout().flush()?;

        input.clear();
        io::stdin().read_line(input)?;
        Ok(input.trim())
    }
}

fn parse_hex(word: Option<&str>) -> Option<u32> {
    let word = word?;
    let word = word.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(word, 16).ok()
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
