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

    cpu_common::mod.rs

    Register, segment and operand-size vocabulary shared by the decoder,
    the instruction handlers and the diagnostic display.

*/

pub mod alu;
pub mod error;
pub mod instruction;

use std::fmt;

pub use instruction::Instruction;

pub const OPCODE_PREFIX_OPERAND_SIZE: u32 = 0b_0000_0000_0000_0001;
pub const OPCODE_PREFIX_ADDRESS_SIZE: u32 = 0b_0000_0000_0000_0010;
pub const OPCODE_PREFIX_ES_OVERRIDE: u32 = 0b_0000_0000_0000_0100;
pub const OPCODE_PREFIX_CS_OVERRIDE: u32 = 0b_0000_0000_0000_1000;
pub const OPCODE_PREFIX_SS_OVERRIDE: u32 = 0b_0000_0000_0001_0000;
pub const OPCODE_PREFIX_DS_OVERRIDE: u32 = 0b_0000_0000_0010_0000;
pub const OPCODE_PREFIX_FS_OVERRIDE: u32 = 0b_0000_0000_0100_0000;
pub const OPCODE_PREFIX_GS_OVERRIDE: u32 = 0b_0000_0000_1000_0000;
pub const OPCODE_PREFIX_LOCK: u32 = 0b_0000_0001_0000_0000;
pub const OPCODE_PREFIX_REPNE: u32 = 0b_0000_0010_0000_0000;
pub const OPCODE_PREFIX_REP: u32 = 0b_0000_0100_0000_0000;
pub const OPCODE_PREFIX_REX: u32 = 0b_0000_1000_0000_0000;
pub const OPCODE_PREFIX_VEX2: u32 = 0b_0001_0000_0000_0000;
pub const OPCODE_PREFIX_VEX3: u32 = 0b_0010_0000_0000_0000;

pub const OPCODE_PREFIX_SEGMENT_MASK: u32 = 0b_0000_0000_1111_1100;

/// Even-parity lookup for the low byte of a result.
pub const PARITY_TABLE: [bool; 256] = {
    let mut table = [false; 256];
    let mut index = 0;
    loop {
        table[index] = index.count_ones() % 2 == 0;
        index += 1;

        if index == 256 {
            break;
        }
    }
    table
};

pub const REGISTER32_STR: [&str; 8] = ["eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi"];
pub const REGISTER16_STR: [&str; 8] = ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"];
pub const REGISTER8_STR: [&str; 8] = ["al", "cl", "dl", "bl", "ah", "ch", "dh", "bh"];

/// General purpose registers in encoding order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register32 {
    EAX,
    ECX,
    EDX,
    EBX,
    ESP,
    EBP,
    ESI,
    EDI,
}

impl Register32 {
    pub const ALL: [Register32; 8] = [
        Register32::EAX,
        Register32::ECX,
        Register32::EDX,
        Register32::EBX,
        Register32::ESP,
        Register32::EBP,
        Register32::ESI,
        Register32::EDI,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register16 {
    AX,
    CX,
    DX,
    BX,
    SP,
    BP,
    SI,
    DI,
}

/// Byte registers in encoding order. Indices 4-7 name bits 8..15 of the first four
/// 32-bit registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register8 {
    AL,
    CL,
    DL,
    BL,
    AH,
    CH,
    DH,
    BH,
}

/// Segment registers in encoding order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    ES,
    CS,
    SS,
    DS,
    FS,
    GS,
}

impl Segment {
    pub const ALL: [Segment; 6] = [Segment::ES, Segment::CS, Segment::SS, Segment::DS, Segment::FS, Segment::GS];

    pub fn from_override_prefix(byte: u8) -> Option<Segment> {
        match byte {
            0x26 => Some(Segment::ES),
            0x2E => Some(Segment::CS),
            0x36 => Some(Segment::SS),
            0x3E => Some(Segment::DS),
            0x64 => Some(Segment::FS),
            0x65 => Some(Segment::GS),
            _ => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Segment::ES => "es",
            Segment::CS => "cs",
            Segment::SS => "ss",
            Segment::DS => "ds",
            Segment::FS => "fs",
            Segment::GS => "gs",
        };
        write!(f, "{}", s)
    }
}

/// Width of an operand or an addressing computation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandSize {
    Operand8,
    Operand16,
    Operand32,
}

impl OperandSize {
    #[inline(always)]
    pub const fn bytes(self) -> u32 {
        match self {
            OperandSize::Operand8 => 1,
            OperandSize::Operand16 => 2,
            OperandSize::Operand32 => 4,
        }
    }

    #[inline(always)]
    pub const fn mask(self) -> u32 {
        match self {
            OperandSize::Operand8 => 0xFF,
            OperandSize::Operand16 => 0xFFFF,
            OperandSize::Operand32 => 0xFFFF_FFFF,
        }
    }

    #[inline(always)]
    pub const fn msb_mask(self) -> u32 {
        match self {
            OperandSize::Operand8 => 0x80,
            OperandSize::Operand16 => 0x8000,
            OperandSize::Operand32 => 0x8000_0000,
        }
    }

    /// Sign-extend the low bits of `value` at this width to 32 bits.
    #[inline(always)]
    pub const fn sign_extend(self, value: u32) -> u32 {
        match self {
            OperandSize::Operand8 => value as u8 as i8 as i32 as u32,
            OperandSize::Operand16 => value as u16 as i16 as i32 as u32,
            OperandSize::Operand32 => value,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mnemonic {
    Invalid,
    Prefix,
    Group,
    ADD,
    OR,
    ADC,
    SBB,
    AND,
    SUB,
    XOR,
    CMP,
    TEST,
    INC,
    DEC,
    MOV,
    MOVSX,
    MOVZX,
    LEA,
    PUSH,
    POP,
    CALL,
    RET,
    JMP,
    JO,
    JNO,
    JB,
    JNB,
    JZ,
    JNZ,
    JBE,
    JNBE,
    JS,
    JNS,
    JP,
    JNP,
    JL,
    JNL,
    JLE,
    JNLE,
    SHL,
    SHR,
    SAL,
    SAR,
    AAM,
    LGDT,
    LIDT,
    CLI,
    STI,
    CLC,
    STC,
    CLD,
    STD,
    HLT,
    NOP,
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_table() {
        assert!(PARITY_TABLE[0x00]);
        assert!(!PARITY_TABLE[0x01]);
        assert!(PARITY_TABLE[0x03]);
        assert!(!PARITY_TABLE[0x80]);
        assert!(PARITY_TABLE[0xFF]);
        for i in 0..256usize {
            assert_eq!(PARITY_TABLE[i], i.count_ones() % 2 == 0);
        }
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(OperandSize::Operand8.sign_extend(0x80), 0xFFFF_FF80);
        assert_eq!(OperandSize::Operand8.sign_extend(0x7F), 0x0000_007F);
        assert_eq!(OperandSize::Operand16.sign_extend(0x1_8000), 0xFFFF_8000);
        assert_eq!(OperandSize::Operand32.sign_extend(0x8000_0000), 0x8000_0000);
    }
}
