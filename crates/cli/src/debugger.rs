// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Line-oriented debugger driving a [`Machine`] from any `BufRead`.

use anyhow::{anyhow, bail, Result};
use serialfmt_sim::cpu::RISCV_ABI_NAMES;
use serialfmt_sim::decoder::decode_rv32;
use serialfmt_sim::{Bus, Cpu, Machine};
use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use tracing::debug;

/// Upper bound for a single `continue` when no breakpoint is hit.
pub const CONTINUE_STEP_LIMIT: u64 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Continue,
    Break(u32),
    DeleteBreak(u32),
    Disasm(u32),
    InfoRegs,
    Quit,
}

fn parse_hex(arg: &str, usage: &str) -> Result<u32> {
    let hex = arg
        .strip_prefix("0x")
        .or_else(|| arg.strip_prefix("0X"))
        .ok_or_else(|| anyhow!("Invalid usage: {} <0xaddress>, got '{}'", usage, arg))?;
    u32::from_str_radix(hex, 16).map_err(|e| anyhow!("Failed to parse hex literal: {}", e))
}

pub fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let (cmd, arg) = line.split_at(line.find(' ').unwrap_or(line.len()));
    let arg = arg.trim_start();

    match cmd {
        "n" | "next" => Ok(Command::Next),
        "c" | "continue" => Ok(Command::Continue),
        "b" | "bp" | "break" => parse_hex(arg, "b|bp|break").map(Command::Break),
        "rb" | "db" | "delbreakpoint" => {
            parse_hex(arg, "rb|db|delbreakpoint").map(Command::DeleteBreak)
        }
        "d" | "disasm" => parse_hex(arg, "d|disasm").map(Command::Disasm),
        "i" | "info" => match arg {
            "regs" => Ok(Command::InfoRegs),
            _ => bail!("Invalid usage: i|info regs, got '{}'", arg),
        },
        "q" | "quit" | "exit" => Ok(Command::Quit),
        _ => bail!("Unknown command '{}'", cmd),
    }
}

pub struct Debugger<C: Cpu> {
    pub machine: Machine<C>,
    pub breakpoints: BTreeSet<u32>,
}

impl<C: Cpu> Debugger<C> {
    pub fn new(machine: Machine<C>) -> Self {
        Self {
            machine,
            breakpoints: BTreeSet::new(),
        }
    }

    /// Runs commands from `input` until `quit` or end of input, returning the guest exit status.
    pub fn run_session<R: BufRead, W: Write>(
        &mut self,
        input: R,
        out: &mut W,
    ) -> Result<Option<u8>> {
        self.show_current(out)?;
        write!(out, ":")?;
        out.flush()?;

        let mut last_line = String::new();
        for line in input.lines() {
            let mut line = line?;
            if line.trim().is_empty() {
                if last_line.is_empty() {
                    continue;
                }
                line = last_line.clone();
            }

            match parse_command(&line) {
                Ok(Command::Quit) => break,
                Ok(cmd) => self.execute(cmd, out)?,
                Err(e) => writeln!(out, "ERROR: {}", e)?,
            }

            self.show_current(out)?;
            write!(out, ":")?;
            out.flush()?;
            last_line = line;
        }
        writeln!(out)?;

        Ok(self.machine.exit_status())
    }

    pub fn execute<W: Write>(&mut self, cmd: Command, out: &mut W) -> Result<()> {
        debug!("Debugger command: {:?}", cmd);
        match cmd {
            Command::Next => {
                self.step_once(out)?;
            }
            Command::Continue => self.continue_to_breakpoint(out)?,
            Command::Break(addr) => {
                self.breakpoints.insert(addr);
                writeln!(out, "Set breakpoint at 0x{:08X}", addr)?;
            }
            Command::DeleteBreak(addr) => {
                if !self.breakpoints.remove(&addr) {
                    writeln!(out, "ERROR: Breakpoint 0x{:08X} does not exist", addr)?;
                }
            }
            Command::Disasm(addr) => self.disasm_at(addr, out)?,
            Command::InfoRegs => self.dump_regs(out)?,
            Command::Quit => {}
        }
        Ok(())
    }

    /// Returns false when the machine could not advance.
    fn step_once<W: Write>(&mut self, out: &mut W) -> Result<bool> {
        if let Some(code) = self.machine.exit_status() {
            writeln!(out, "Guest exited with status {}", code)?;
            return Ok(false);
        }
        if let Err(e) = self.machine.step() {
            writeln!(out, "Simulation error: {}", e)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn continue_to_breakpoint<W: Write>(&mut self, out: &mut W) -> Result<()> {
        // Always move off the current instruction, even if it carries a breakpoint.
        for _ in 0..CONTINUE_STEP_LIMIT {
            if !self.step_once(out)? {
                return Ok(());
            }
            let pc = self.machine.cpu.get_pc();
            if self.breakpoints.contains(&pc) {
                writeln!(out, "Hit breakpoint at 0x{:08X}", pc)?;
                return Ok(());
            }
        }
        writeln!(
            out,
            "Stopped after {} steps without reaching a breakpoint",
            CONTINUE_STEP_LIMIT
        )?;
        Ok(())
    }

    fn disasm_at<W: Write>(&self, addr: u32, out: &mut W) -> Result<()> {
        match self.machine.bus.read_u32(addr as u64) {
            Ok(word) => writeln!(out, "{:08X}> {}", addr, decode_rv32(word))?,
            Err(e) => writeln!(out, "{:08X}> <{}>", addr, e)?,
        }
        Ok(())
    }

    fn show_current<W: Write>(&self, out: &mut W) -> Result<()> {
        self.disasm_at(self.machine.cpu.get_pc(), out)
    }

    fn dump_regs<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "pc=0x{:08X}", self.machine.cpu.get_pc())?;
        for (i, name) in RISCV_ABI_NAMES.iter().enumerate() {
            let val = self.machine.cpu.get_register(i as u8);
            write!(out, "x{:<2} {:>4}=0x{:08X}", i, name, val)?;
            if i % 4 == 3 {
                writeln!(out)?;
            } else {
                write!(out, "  ")?;
            }
        }
        Ok(())
    }
}
