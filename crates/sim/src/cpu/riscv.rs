// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::decoder::{decode_rv32, Instruction};
use crate::{Bus, Cpu, SimResult, SimulationError, SimulationObserver};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct RiscV {
    pub x: [u32; 32], // x0..x31. x0 is hardwired to 0 in read_reg/write_reg.
    pub pc: u32,
}

impl RiscV {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_reg(&self, n: u8) -> u32 {
        if n == 0 {
            0
        } else {
            self.x[n as usize]
        }
    }

    fn write_reg(&mut self, n: u8, val: u32) {
        if n != 0 {
            self.x[n as usize] = val;
        }
    }

    fn effective_addr(&self, rs1: u8, imm: i32) -> u64 {
        self.read_reg(rs1).wrapping_add(imm as u32) as u64
    }

    fn op_imm(&mut self, rd: u8, rs1: u8, f: impl FnOnce(u32) -> u32) {
        let res = f(self.read_reg(rs1));
        self.write_reg(rd, res);
    }

    fn op_reg(&mut self, rd: u8, rs1: u8, rs2: u8, f: impl FnOnce(u32, u32) -> u32) {
        let res = f(self.read_reg(rs1), self.read_reg(rs2));
        self.write_reg(rd, res);
    }

    fn branch_target(
        &self,
        rs1: u8,
        rs2: u8,
        imm: i32,
        taken: impl FnOnce(u32, u32) -> bool,
    ) -> Option<u32> {
        taken(self.read_reg(rs1), self.read_reg(rs2)).then(|| self.pc.wrapping_add(imm as u32))
    }

    /// Executes one decoded instruction and returns the next pc.
    fn execute(&mut self, instruction: Instruction, bus: &mut dyn Bus) -> SimResult<u32> {
        use Instruction::*;

        let link = self.pc.wrapping_add(4);
        let mut next_pc = link;

        match instruction {
            Lui { rd, imm } => self.write_reg(rd, imm),
            Auipc { rd, imm } => self.write_reg(rd, self.pc.wrapping_add(imm)),
            Jal { rd, imm } => {
                next_pc = self.pc.wrapping_add(imm as u32);
                self.write_reg(rd, link);
            }
            Jalr { rd, rs1, imm } => {
                // Target is computed before rd is written; rd may equal rs1.
                next_pc = self.read_reg(rs1).wrapping_add(imm as u32) & !1;
                self.write_reg(rd, link);
            }

            Beq { rs1, rs2, imm } => {
                next_pc = self.branch_target(rs1, rs2, imm, |a, b| a == b).unwrap_or(link)
            }
            Bne { rs1, rs2, imm } => {
                next_pc = self.branch_target(rs1, rs2, imm, |a, b| a != b).unwrap_or(link)
            }
            Blt { rs1, rs2, imm } => {
                next_pc = self
                    .branch_target(rs1, rs2, imm, |a, b| (a as i32) < (b as i32))
                    .unwrap_or(link)
            }
            Bge { rs1, rs2, imm } => {
                next_pc = self
                    .branch_target(rs1, rs2, imm, |a, b| (a as i32) >= (b as i32))
                    .unwrap_or(link)
            }
            Bltu { rs1, rs2, imm } => {
                next_pc = self.branch_target(rs1, rs2, imm, |a, b| a < b).unwrap_or(link)
            }
            Bgeu { rs1, rs2, imm } => {
                next_pc = self.branch_target(rs1, rs2, imm, |a, b| a >= b).unwrap_or(link)
            }

            Lb { rd, rs1, imm } => {
                let val = bus.read_u8(self.effective_addr(rs1, imm))? as i8;
                self.write_reg(rd, val as i32 as u32);
            }
            Lh { rd, rs1, imm } => {
                let val = bus.read_u16(self.effective_addr(rs1, imm))? as i16;
                self.write_reg(rd, val as i32 as u32);
            }
            Lw { rd, rs1, imm } => {
                let val = bus.read_u32(self.effective_addr(rs1, imm))?;
                self.write_reg(rd, val);
            }
            Lbu { rd, rs1, imm } => {
                let val = bus.read_u8(self.effective_addr(rs1, imm))?;
                self.write_reg(rd, val as u32);
            }
            Lhu { rd, rs1, imm } => {
                let val = bus.read_u16(self.effective_addr(rs1, imm))?;
                self.write_reg(rd, val as u32);
            }

            Sb { rs1, rs2, imm } => {
                bus.write_u8(self.effective_addr(rs1, imm), self.read_reg(rs2) as u8)?
            }
            Sh { rs1, rs2, imm } => {
                bus.write_u16(self.effective_addr(rs1, imm), self.read_reg(rs2) as u16)?
            }
            Sw { rs1, rs2, imm } => bus.write_u32(self.effective_addr(rs1, imm), self.read_reg(rs2))?,

            Addi { rd, rs1, imm } => self.op_imm(rd, rs1, |a| a.wrapping_add(imm as u32)),
            Slti { rd, rs1, imm } => self.op_imm(rd, rs1, |a| ((a as i32) < imm) as u32),
            Sltiu { rd, rs1, imm } => self.op_imm(rd, rs1, |a| (a < imm as u32) as u32),
            Xori { rd, rs1, imm } => self.op_imm(rd, rs1, |a| a ^ imm as u32),
            Ori { rd, rs1, imm } => self.op_imm(rd, rs1, |a| a | imm as u32),
            Andi { rd, rs1, imm } => self.op_imm(rd, rs1, |a| a & imm as u32),
            Slli { rd, rs1, shamt } => self.op_imm(rd, rs1, |a| a << shamt),
            Srli { rd, rs1, shamt } => self.op_imm(rd, rs1, |a| a >> shamt),
            Srai { rd, rs1, shamt } => self.op_imm(rd, rs1, |a| ((a as i32) >> shamt) as u32),

            Add { rd, rs1, rs2 } => self.op_reg(rd, rs1, rs2, u32::wrapping_add),
            Sub { rd, rs1, rs2 } => self.op_reg(rd, rs1, rs2, u32::wrapping_sub),
            Sll { rd, rs1, rs2 } => self.op_reg(rd, rs1, rs2, |a, b| a << (b & 0x1F)),
            Slt { rd, rs1, rs2 } => {
                self.op_reg(rd, rs1, rs2, |a, b| ((a as i32) < (b as i32)) as u32)
            }
            Sltu { rd, rs1, rs2 } => self.op_reg(rd, rs1, rs2, |a, b| (a < b) as u32),
            Xor { rd, rs1, rs2 } => self.op_reg(rd, rs1, rs2, |a, b| a ^ b),
            Srl { rd, rs1, rs2 } => self.op_reg(rd, rs1, rs2, |a, b| a >> (b & 0x1F)),
            Sra { rd, rs1, rs2 } => {
                self.op_reg(rd, rs1, rs2, |a, b| ((a as i32) >> (b & 0x1F)) as u32)
            }
            Or { rd, rs1, rs2 } => self.op_reg(rd, rs1, rs2, |a, b| a | b),
            And { rd, rs1, rs2 } => self.op_reg(rd, rs1, rs2, |a, b| a & b),

            Fence => {
                // Single hart, in-order memory: nothing to order.
            }
            Ecall | Ebreak => {
                // No trap handler exists on this machine.
                tracing::warn!("{} at {:#x} ignored", instruction, self.pc);
            }
            Unknown(inst) => {
                tracing::error!("Unknown instruction {:#x} at {:#x}", inst, self.pc);
                return Err(SimulationError::DecodeError(self.pc as u64));
            }
        }

        Ok(next_pc)
    }
}

impl Cpu for RiscV {
    fn reset(&mut self) {
        self.x = [0; 32];
        self.pc = 0;
    }

    fn step(
        &mut self,
        bus: &mut dyn Bus,
        observers: &[Arc<dyn SimulationObserver>],
    ) -> SimResult<()> {
        let opcode = bus.read_u32(self.pc as u64)?;

        for observer in observers {
            observer.on_step_start(self.pc, opcode);
        }

        let instruction = decode_rv32(opcode);
        tracing::debug!("PC={:#010x}, Op={:#010x}, Instr={}", self.pc, opcode, instruction);

        self.pc = self.execute(instruction, bus)?;

        for observer in observers {
            observer.on_step_end(1);
        }
        Ok(())
    }

    fn set_pc(&mut self, val: u32) {
        self.pc = val;
    }
    fn get_pc(&self) -> u32 {
        self.pc
    }
    fn set_sp(&mut self, val: u32) {
        self.write_reg(2, val); // x2 is SP
    }

    fn get_register(&self, id: u8) -> u32 {
        if id < 32 {
            self.read_reg(id)
        } else {
            0
        }
    }
}
