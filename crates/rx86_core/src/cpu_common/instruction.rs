/*
    rx86
    Copyright 2025 The rx86 Authors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    ---------------------------------------------------------------------------

    cpu_common::instruction.rs

    Defines the decoded instruction record and its resolved operands.

*/

use std::fmt;

use crate::cpu_common::{Mnemonic, OperandSize, Segment, REGISTER16_STR, REGISTER32_STR, REGISTER8_STR};

/// A reference to an operand location: a register slot or a byte offset into memory, plus
/// the width the location is accessed at. Operands are created per instruction and never
/// outlive it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    /// Register index in encoding order. For byte width, indices 4-7 are AH, CH, DH and BH.
    Reg(u8, OperandSize),
    Mem(u32, OperandSize),
}

impl Operand {
    #[inline(always)]
    pub fn size(&self) -> OperandSize {
        match *self {
            Operand::Reg(_, size) | Operand::Mem(_, size) => size,
        }
    }
}

/// An operand after decode. Immediates have already been fetched and extended to 32 bits.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OperandType {
    #[default]
    NoOperand,
    Location(Operand),
    Immediate(u32),
    Relative(i32),
    ControlRegister(u8),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// Address of the instruction's first byte, including prefixes.
    pub address: u32,
    pub opcode: u16,
    pub decode_idx: usize,
    pub mnemonic: Mnemonic,
    pub prefixes: u32,
    pub segment_override: Option<Segment>,
    pub operand_size: OperandSize,
    pub address_size: OperandSize,
    pub operand1: OperandType,
    pub operand2: OperandType,
    /// Total length in bytes.
    pub size: u32,
}

impl Default for Instruction {
    fn default() -> Self {
        Self {
            address: 0,
            opcode: 0,
            decode_idx: 0,
            mnemonic: Mnemonic::Invalid,
            prefixes: 0,
            segment_override: None,
            operand_size: OperandSize::Operand16,
            address_size: OperandSize::Operand16,
            operand1: OperandType::NoOperand,
            operand2: OperandType::NoOperand,
            size: 0,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Operand::Reg(idx, OperandSize::Operand8) => write!(f, "{}", REGISTER8_STR[idx as usize & 0x07]),
            Operand::Reg(idx, OperandSize::Operand16) => write!(f, "{}", REGISTER16_STR[idx as usize & 0x07]),
            Operand::Reg(idx, OperandSize::Operand32) => write!(f, "{}", REGISTER32_STR[idx as usize & 0x07]),
            Operand::Mem(addr, OperandSize::Operand8) => write!(f, "byte [{:08X}]", addr),
            Operand::Mem(addr, OperandSize::Operand16) => write!(f, "word [{:08X}]", addr),
            Operand::Mem(addr, OperandSize::Operand32) => write!(f, "dword [{:08X}]", addr),
        }
    }
}

impl fmt::Display for OperandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            OperandType::NoOperand => Ok(()),
            OperandType::Location(op) => write!(f, "{}", op),
            OperandType::Immediate(imm) => write!(f, "{:#X}", imm),
            OperandType::Relative(rel) if rel < 0 => write!(f, "-{:#X}", rel.unsigned_abs()),
            OperandType::Relative(rel) => write!(f, "+{:#X}", rel),
            OperandType::ControlRegister(cr) => write!(f, "cr{}", cr),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.mnemonic.to_string().to_lowercase();
        match (self.operand1, self.operand2) {
            (OperandType::NoOperand, _) => write!(f, "{}", mnemonic),
            (op1, OperandType::NoOperand) => write!(f, "{} {}", mnemonic, op1),
            (op1, op2) => write!(f, "{} {}, {}", mnemonic, op1, op2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_display() {
        let i = Instruction {
            mnemonic: Mnemonic::MOV,
            operand1: OperandType::Location(Operand::Reg(0, OperandSize::Operand32)),
            operand2: OperandType::Location(Operand::Reg(3, OperandSize::Operand32)),
            ..Default::default()
        };
        assert_eq!(i.to_string(), "mov eax, ebx");

        let i = Instruction {
            mnemonic: Mnemonic::ADD,
            operand1: OperandType::Location(Operand::Mem(0x1000, OperandSize::Operand8)),
            operand2: OperandType::Location(Operand::Reg(4, OperandSize::Operand8)),
            ..Default::default()
        };
        assert_eq!(i.to_string(), "add byte [00001000], ah");

        let i = Instruction {
            mnemonic: Mnemonic::JMP,
            operand1: OperandType::Relative(-2),
            ..Default::default()
        };
        assert_eq!(i.to_string(), "jmp -0x2");
    }
}
