// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! RV32I base instruction decoding and disassembly.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Lui { rd: u8, imm: u32 },
    Auipc { rd: u8, imm: u32 },
    Jal { rd: u8, imm: i32 },
    Jalr { rd: u8, rs1: u8, imm: i32 },
    Beq { rs1: u8, rs2: u8, imm: i32 },
    Bne { rs1: u8, rs2: u8, imm: i32 },
    Blt { rs1: u8, rs2: u8, imm: i32 },
    Bge { rs1: u8, rs2: u8, imm: i32 },
    Bltu { rs1: u8, rs2: u8, imm: i32 },
    Bgeu { rs1: u8, rs2: u8, imm: i32 },
    Lb { rd: u8, rs1: u8, imm: i32 },
    Lh { rd: u8, rs1: u8, imm: i32 },
    Lw { rd: u8, rs1: u8, imm: i32 },
    Lbu { rd: u8, rs1: u8, imm: i32 },
    Lhu { rd: u8, rs1: u8, imm: i32 },
    Sb { rs1: u8, rs2: u8, imm: i32 },
    Sh { rs1: u8, rs2: u8, imm: i32 },
    Sw { rs1: u8, rs2: u8, imm: i32 },
    Addi { rd: u8, rs1: u8, imm: i32 },
    Slti { rd: u8, rs1: u8, imm: i32 },
    Sltiu { rd: u8, rs1: u8, imm: i32 },
    Xori { rd: u8, rs1: u8, imm: i32 },
    Ori { rd: u8, rs1: u8, imm: i32 },
    Andi { rd: u8, rs1: u8, imm: i32 },
    Slli { rd: u8, rs1: u8, shamt: u32 },
    Srli { rd: u8, rs1: u8, shamt: u32 },
    Srai { rd: u8, rs1: u8, shamt: u32 },
    Add { rd: u8, rs1: u8, rs2: u8 },
    Sub { rd: u8, rs1: u8, rs2: u8 },
    Sll { rd: u8, rs1: u8, rs2: u8 },
    Slt { rd: u8, rs1: u8, rs2: u8 },
    Sltu { rd: u8, rs1: u8, rs2: u8 },
    Xor { rd: u8, rs1: u8, rs2: u8 },
    Srl { rd: u8, rs1: u8, rs2: u8 },
    Sra { rd: u8, rs1: u8, rs2: u8 },
    Or { rd: u8, rs1: u8, rs2: u8 },
    And { rd: u8, rs1: u8, rs2: u8 },
    Fence,
    Ecall,
    Ebreak,
    Unknown(u32),
}

const OP_LUI: u32 = 0b011_0111;
const OP_AUIPC: u32 = 0b001_0111;
const OP_JAL: u32 = 0b110_1111;
const OP_JALR: u32 = 0b110_0111;
const OP_BRANCH: u32 = 0b110_0011;
const OP_LOAD: u32 = 0b000_0011;
const OP_STORE: u32 = 0b010_0011;
const OP_IMM: u32 = 0b001_0011;
const OP_REG: u32 = 0b011_0011;
const OP_FENCE: u32 = 0b000_1111;
const OP_SYSTEM: u32 = 0b111_0011;

/// Decodes a 32-bit RV32I instruction.
///
/// Compressed (16-bit) encodings have low bits other than `0b11` and come
/// back as `Unknown`.
pub fn decode_rv32(inst: u32) -> Instruction {
    let opcode = inst & 0x7F;
    let rd = ((inst >> 7) & 0x1F) as u8;
    let funct3 = (inst >> 12) & 0x7;
    let rs1 = ((inst >> 15) & 0x1F) as u8;
    let rs2 = ((inst >> 20) & 0x1F) as u8;
    let funct7 = inst >> 25;

    // Immediates, sign-extended from bit 31.
    let imm_i = (inst as i32) >> 20;
    let imm_s = (((inst as i32) >> 25) << 5) | ((inst >> 7) & 0x1F) as i32;
    let imm_b = (((inst as i32) >> 31) << 12)
        | (((inst >> 7) & 0x1) << 11) as i32
        | (((inst >> 25) & 0x3F) << 5) as i32
        | (((inst >> 8) & 0xF) << 1) as i32;
    let imm_u = inst & 0xFFFF_F000;
    let imm_j = (((inst as i32) >> 31) << 20)
        | (inst & 0x000F_F000) as i32
        | (((inst >> 20) & 0x1) << 11) as i32
        | (((inst >> 21) & 0x3FF) << 1) as i32;
    let shamt = (inst >> 20) & 0x1F;

    match opcode {
        OP_LUI => Instruction::Lui { rd, imm: imm_u },
        OP_AUIPC => Instruction::Auipc { rd, imm: imm_u },
        OP_JAL => Instruction::Jal { rd, imm: imm_j },
        OP_JALR if funct3 == 0 => Instruction::Jalr { rd, rs1, imm: imm_i },
        OP_BRANCH => match funct3 {
            0b000 => Instruction::Beq { rs1, rs2, imm: imm_b },
            0b001 => Instruction::Bne { rs1, rs2, imm: imm_b },
            0b100 => Instruction::Blt { rs1, rs2, imm: imm_b },
            0b101 => Instruction::Bge { rs1, rs2, imm: imm_b },
            0b110 => Instruction::Bltu { rs1, rs2, imm: imm_b },
            0b111 => Instruction::Bgeu { rs1, rs2, imm: imm_b },
            _ => Instruction::Unknown(inst),
        },
        OP_LOAD => match funct3 {
            0b000 => Instruction::Lb { rd, rs1, imm: imm_i },
            0b001 => Instruction::Lh { rd, rs1, imm: imm_i },
            0b010 => Instruction::Lw { rd, rs1, imm: imm_i },
            0b100 => Instruction::Lbu { rd, rs1, imm: imm_i },
            0b101 => Instruction::Lhu { rd, rs1, imm: imm_i },
            _ => Instruction::Unknown(inst),
        },
        OP_STORE => match funct3 {
            0b000 => Instruction::Sb { rs1, rs2, imm: imm_s },
            0b001 => Instruction::Sh { rs1, rs2, imm: imm_s },
            0b010 => Instruction::Sw { rs1, rs2, imm: imm_s },
            _ => Instruction::Unknown(inst),
        },
        OP_IMM => match (funct3, funct7) {
            (0b000, _) => Instruction::Addi { rd, rs1, imm: imm_i },
            (0b010, _) => Instruction::Slti { rd, rs1, imm: imm_i },
            (0b011, _) => Instruction::Sltiu { rd, rs1, imm: imm_i },
            (0b100, _) => Instruction::Xori { rd, rs1, imm: imm_i },
            (0b110, _) => Instruction::Ori { rd, rs1, imm: imm_i },
            (0b111, _) => Instruction::Andi { rd, rs1, imm: imm_i },
            (0b001, 0x00) => Instruction::Slli { rd, rs1, shamt },
            (0b101, 0x00) => Instruction::Srli { rd, rs1, shamt },
            (0b101, 0x20) => Instruction::Srai { rd, rs1, shamt },
            _ => Instruction::Unknown(inst),
        },
        OP_REG => match (funct3, funct7) {
            (0b000, 0x00) => Instruction::Add { rd, rs1, rs2 },
            (0b000, 0x20) => Instruction::Sub { rd, rs1, rs2 },
            (0b001, 0x00) => Instruction::Sll { rd, rs1, rs2 },
            (0b010, 0x00) => Instruction::Slt { rd, rs1, rs2 },
            (0b011, 0x00) => Instruction::Sltu { rd, rs1, rs2 },
            (0b100, 0x00) => Instruction::Xor { rd, rs1, rs2 },
            (0b101, 0x00) => Instruction::Srl { rd, rs1, rs2 },
            (0b101, 0x20) => Instruction::Sra { rd, rs1, rs2 },
            (0b110, 0x00) => Instruction::Or { rd, rs1, rs2 },
            (0b111, 0x00) => Instruction::And { rd, rs1, rs2 },
            _ => Instruction::Unknown(inst),
        },
        OP_FENCE => Instruction::Fence,
        OP_SYSTEM => match inst {
            0x0000_0073 => Instruction::Ecall,
            0x0010_0073 => Instruction::Ebreak,
            _ => Instruction::Unknown(inst),
        },
        _ => Instruction::Unknown(inst),
    }
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        use Instruction::*;
        match self {
            Lui { .. } => "lui",
            Auipc { .. } => "auipc",
            Jal { .. } => "jal",
            Jalr { .. } => "jalr",
            Beq { .. } => "beq",
            Bne { .. } => "bne",
            Blt { .. } => "blt",
            Bge { .. } => "bge",
            Bltu { .. } => "bltu",
            Bgeu { .. } => "bgeu",
            Lb { .. } => "lb",
            Lh { .. } => "lh",
            Lw { .. } => "lw",
            Lbu { .. } => "lbu",
            Lhu { .. } => "lhu",
            Sb { .. } => "sb",
            Sh { .. } => "sh",
            Sw { .. } => "sw",
            Addi { .. } => "addi",
            Slti { .. } => "slti",
            Sltiu { .. } => "sltiu",
            Xori { .. } => "xori",
            Ori { .. } => "ori",
            Andi { .. } => "andi",
            Slli { .. } => "slli",
            Srli { .. } => "srli",
            Srai { .. } => "srai",
            Add { .. } => "add",
            Sub { .. } => "sub",
            Sll { .. } => "sll",
            Slt { .. } => "slt",
            Sltu { .. } => "sltu",
            Xor { .. } => "xor",
            Srl { .. } => "srl",
            Sra { .. } => "sra",
            Or { .. } => "or",
            And { .. } => "and",
            Fence => "fence",
            Ecall => "ecall",
            Ebreak => "ebreak",
            Unknown(_) => ".word",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        let m = self.mnemonic();
        match *self {
            Lui { rd, imm } | Auipc { rd, imm } => write!(f, "{} x{}, {:#x}", m, rd, imm >> 12),
            Jal { rd, imm } => write!(f, "{} x{}, {}", m, rd, imm),
            Jalr { rd, rs1, imm }
            | Lb { rd, rs1, imm }
            | Lh { rd, rs1, imm }
            | Lw { rd, rs1, imm }
            | Lbu { rd, rs1, imm }
            | Lhu { rd, rs1, imm } => write!(f, "{} x{}, {}(x{})", m, rd, imm, rs1),
            Beq { rs1, rs2, imm }
            | Bne { rs1, rs2, imm }
            | Blt { rs1, rs2, imm }
            | Bge { rs1, rs2, imm }
            | Bltu { rs1, rs2, imm }
            | Bgeu { rs1, rs2, imm } => write!(f, "{} x{}, x{}, {}", m, rs1, rs2, imm),
            Sb { rs1, rs2, imm } | Sh { rs1, rs2, imm } | Sw { rs1, rs2, imm } => {
                write!(f, "{} x{}, {}(x{})", m, rs2, imm, rs1)
            }
            Addi { rd, rs1, imm }
            | Slti { rd, rs1, imm }
            | Sltiu { rd, rs1, imm }
            | Xori { rd, rs1, imm }
            | Ori { rd, rs1, imm }
            | Andi { rd, rs1, imm } => write!(f, "{} x{}, x{}, {}", m, rd, rs1, imm),
            Slli { rd, rs1, shamt } | Srli { rd, rs1, shamt } | Srai { rd, rs1, shamt } => {
                write!(f, "{} x{}, x{}, {}", m, rd, rs1, shamt)
            }
            Add { rd, rs1, rs2 }
            | Sub { rd, rs1, rs2 }
            | Sll { rd, rs1, rs2 }
            | Slt { rd, rs1, rs2 }
            | Sltu { rd, rs1, rs2 }
            | Xor { rd, rs1, rs2 }
            | Srl { rd, rs1, rs2 }
            | Sra { rd, rs1, rs2 }
            | Or { rd, rs1, rs2 }
            | And { rd, rs1, rs2 } => write!(f, "{} x{}, x{}, x{}", m, rd, rs1, rs2),
            Fence | Ecall | Ebreak => f.write_str(m),
            Unknown(inst) => write!(f, "{} {:#010x}", m, inst),
        }
    }
}
