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

    cpu_x86::modrm.rs

    ModRM byte decoding and effective address calculation.

    Addressing bytes are consumed in a fixed order through the fetch layer:
    the ModRM byte, then the SIB byte if one is selected, then any
    displacement.

*/

use crate::{
    cpu_common::{error::CpuError, instruction::Operand, OperandSize, REGISTER32_STR},
    cpu_x86::{sib::SibByte, CpuX86},
};

pub const MODRM_REG_MASK: u8 = 0b00_111_000;
pub const MODRM_RM_MASK: u8 = 0b00_000_111;

pub const MODRM_ADDR_DISP16: u8 = 0b110;
pub const MODRM_ADDR_DISP32: u8 = 0b101;
pub const MODRM_ADDR_SIB: u8 = 0b100;

// 16-bit base/index pairs by rm. rm 6 with mod 0 is a bare disp16 instead of BP.
const MODRM16_STR: [&str; 8] = ["bx+si", "bx+di", "bp+si", "bp+di", "si", "di", "bp", "bx"];

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ModRmByte {
    byte: u8,
}

impl ModRmByte {
    #[inline(always)]
    pub const fn from_byte(byte: u8) -> ModRmByte {
        ModRmByte { byte }
    }

    #[inline(always)]
    pub const fn byte(&self) -> u8 {
        self.byte
    }

    #[inline(always)]
    pub const fn mode(&self) -> u8 {
        self.byte >> 6
    }

    #[inline(always)]
    pub const fn reg(&self) -> u8 {
        (self.byte & MODRM_REG_MASK) >> 3
    }

    #[inline(always)]
    pub const fn rm(&self) -> u8 {
        self.byte & MODRM_RM_MASK
    }

    /// mod == 3: the r/m field names a register rather than memory.
    #[inline(always)]
    pub const fn is_register(&self) -> bool {
        self.mode() == 0b11
    }

    /// Whether a SIB byte follows when decoding with 32-bit addressing.
    #[inline(always)]
    pub const fn has_sib(&self) -> bool {
        !self.is_register() && self.rm() == MODRM_ADDR_SIB
    }

    /// Build the r/m operand. `ea` is ignored for register forms.
    #[inline]
    pub fn rm_operand(&self, ea: u32, size: OperandSize) -> Operand {
        if self.is_register() {
            Operand::Reg(self.rm(), size)
        }
        else {
            Operand::Mem(ea, size)
        }
    }

    /// Render the addressing expression for the r/m half, without displacement values.
    pub fn to_string_for_size(&self, address_size: OperandSize) -> String {
        match (address_size, self.mode(), self.rm()) {
            (_, 0b11, rm) => format!("reg {}", rm),
            (OperandSize::Operand32, _, MODRM_ADDR_SIB) => "[sib]".to_string(),
            (OperandSize::Operand32, 0b00, MODRM_ADDR_DISP32) => "[disp32]".to_string(),
            (OperandSize::Operand32, 0b00, rm) => format!("[{}]", REGISTER32_STR[rm as usize]),
            (OperandSize::Operand32, 0b01, rm) => format!("[{}+disp8]", REGISTER32_STR[rm as usize]),
            (OperandSize::Operand32, _, rm) => format!("[{}+disp16]", REGISTER32_STR[rm as usize]),
            (_, 0b00, MODRM_ADDR_DISP16) => "[disp16]".to_string(),
            (_, 0b00, rm) => format!("[{}]", MODRM16_STR[rm as usize]),
            (_, 0b01, rm) => format!("[{}+disp8]", MODRM16_STR[rm as usize]),
            (_, _, rm) => format!("[{}+disp16]", MODRM16_STR[rm as usize]),
        }
    }
}

impl CpuX86 {
    /// Compute the effective address of a memory-form ModRM byte, fetching any SIB and
    /// displacement bytes that follow it. Returns the SIB byte when one was consumed.
    pub(crate) fn modrm_address(
        &mut self,
        modrm: ModRmByte,
        address_size: OperandSize,
    ) -> Result<(u32, Option<SibByte>), CpuError> {
        match address_size {
            OperandSize::Operand32 => self.modrm_address32(modrm),
            _ => Ok((self.modrm_address16(modrm)?, None)),
        }
    }

    fn modrm_address32(&mut self, modrm: ModRmByte) -> Result<(u32, Option<SibByte>), CpuError> {
        let mut sib = None;

        let base = match (modrm.mode(), modrm.rm()) {
            (_, MODRM_ADDR_SIB) => {
                let sib_byte = SibByte::from_byte(self.fetch_u8()?);
                sib = Some(sib_byte);
                self.sib_address(sib_byte, modrm.mode())?
            }
            (0b00, MODRM_ADDR_DISP32) => self.fetch_u32()?,
            (_, rm) => self.regs[rm as usize],
        };

        // mod 2 takes an unsigned 16-bit displacement even with 32-bit addressing.
        let ea = match modrm.mode() {
            0b01 => base.wrapping_add(self.fetch_i8()? as i32 as u32),
            0b10 => base.wrapping_add(self.fetch_u16()? as u32),
            _ => base,
        };

        Ok((ea, sib))
    }

    fn modrm_address16(&mut self, modrm: ModRmByte) -> Result<u32, CpuError> {
        let bx = self.regs[3] & 0xFFFF;
        let bp = self.regs[5] & 0xFFFF;
        let si = self.regs[6] & 0xFFFF;
        let di = self.regs[7] & 0xFFFF;

        let base = match (modrm.mode(), modrm.rm()) {
            (0b00, MODRM_ADDR_DISP16) => return Ok(self.fetch_u16()? as u32),
            (_, 0) => bx + si,
            (_, 1) => bx + di,
            (_, 2) => bp + si,
            (_, 3) => bp + di,
            (_, 4) => si,
            (_, 5) => di,
            (_, 6) => bp,
            _ => bx,
        };

        let ea = match modrm.mode() {
            0b01 => base.wrapping_add(self.fetch_i8()? as i32 as u32),
            0b10 => base.wrapping_add(self.fetch_u16()? as u32),
            _ => base,
        };

        Ok(ea & 0xFFFF)
    }
}
