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

    cpu_x86::sib.rs

    Scale-index-base byte decoding for 32-bit addressing.

*/

use crate::{
    cpu_common::{error::CpuError, REGISTER32_STR},
    cpu_x86::CpuX86,
};

pub const SIB_INDEX_NONE: u8 = 0b100;
pub const SIB_BASE_DISPLACEMENT: u8 = 0b101;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SibByte {
    byte: u8,
}

impl SibByte {
    #[inline(always)]
    pub const fn from_byte(byte: u8) -> SibByte {
        SibByte { byte }
    }

    #[inline(always)]
    pub const fn byte(&self) -> u8 {
        self.byte
    }

    /// The two-bit scale field, as a shift count (0-3).
    #[inline(always)]
    pub const fn scale(&self) -> u8 {
        self.byte >> 6
    }

    #[inline(always)]
    pub const fn index(&self) -> u8 {
        (self.byte >> 3) & 0x07
    }

    #[inline(always)]
    pub const fn base(&self) -> u8 {
        self.byte & 0x07
    }

    #[inline(always)]
    pub const fn has_index(&self) -> bool {
        self.index() != SIB_INDEX_NONE
    }

    /// With mod == 0, base 5 means no base register and a disp32 follows the SIB byte.
    #[inline(always)]
    pub const fn has_base(&self, modrm_mod: u8) -> bool {
        !(modrm_mod == 0 && self.base() == SIB_BASE_DISPLACEMENT)
    }

    /// Render the addressing expression, e.g. `[ebx+esi*4]`.
    pub fn to_string_for_mod(&self, modrm_mod: u8) -> String {
        let mut s = String::from("[");
        if self.has_base(modrm_mod) {
            s.push_str(REGISTER32_STR[self.base() as usize]);
        }
        else {
            s.push_str("disp32");
        }
        if self.has_index() {
            s.push('+');
            s.push_str(REGISTER32_STR[self.index() as usize]);
            if self.scale() > 0 {
                s.push_str(&format!("*{}", 1 << self.scale()));
            }
        }
        s.push(']');
        s
    }
}

impl CpuX86 {
    /// Compute base + index * scale for a SIB byte that has already been fetched. When
    /// the SIB byte selects no base, the disp32 that replaces it is fetched here.
    pub(crate) fn sib_address(&mut self, sib: SibByte, modrm_mod: u8) -> Result<u32, CpuError> {
        let base = if sib.has_base(modrm_mod) {
            self.regs[sib.base() as usize]
        }
        else {
            self.fetch_u32()?
        };

        let index = if sib.has_index() {
            self.regs[sib.index() as usize] << sib.scale()
        }
        else {
            0
        };

        Ok(base.wrapping_add(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_common::Register32;

    #[test]
    fn test_sib_fields() {
        // ss=10 index=110 (esi) base=011 (ebx)
        let sib = SibByte::from_byte(0b10_110_011);
        assert_eq!(sib.scale(), 2);
        assert_eq!(sib.index(), 6);
        assert_eq!(sib.base(), 3);
        assert!(sib.has_index());
        assert!(sib.has_base(0));
        assert_eq!(sib.to_string_for_mod(0), "[ebx+esi*4]");

        let sib = SibByte::from_byte(0b00_100_101);
        assert!(!sib.has_index());
        assert!(!sib.has_base(0));
        assert!(sib.has_base(1));
        assert_eq!(sib.to_string_for_mod(0), "[disp32]");
    }

    #[test]
    fn test_sib_address() {
        let mut cpu = CpuX86::new(0x100);
        cpu.set_register(Register32::EBX, 0x1000);
        cpu.set_register(Register32::ESI, 0x10);
        let ea = cpu.sib_address(SibByte::from_byte(0b10_110_011), 0).unwrap();
        assert_eq!(ea, 0x1040);
        // No bytes consumed.
        assert_eq!(cpu.eip(), 0);
    }

    #[test]
    fn test_sib_no_base_fetches_disp32() {
        let mut cpu = CpuX86::new(0x100);
        cpu.load_program(0, &[0x00, 0x20, 0x00, 0x00]).unwrap();
        cpu.set_register(Register32::ECX, 3);
        // ss=11 index=001 (ecx) base=101 with mod 0
        let ea = cpu.sib_address(SibByte::from_byte(0b11_001_101), 0).unwrap();
        assert_eq!(ea, 0x2000 + 3 * 8);
        assert_eq!(cpu.eip(), 4);
    }
}
