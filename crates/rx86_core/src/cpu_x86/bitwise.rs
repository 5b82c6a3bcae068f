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

    cpu_x86::bitwise.rs

    Shift instruction semantics.

    Counts are masked to five bits. A masked count of zero changes nothing,
    flags included. Otherwise the destination is shifted one bit at a time,
    CF taking the bit about to leave it at the operand's own width. OF is only
    defined for a count of one.

*/

use crate::{
    cpu_common::{
        alu::{shift_once, Shift},
        error::CpuError,
        instruction::Operand,
    },
    cpu_x86::{flags::Flag, CpuX86},
};

impl CpuX86 {
    fn bitshift_op(&mut self, shift: Shift, dst: Operand, count: u8) -> Result<(), CpuError> {
        let count = count & 0x1F;
        if count == 0 {
            return Ok(());
        }

        let size = dst.size();
        let pre_msb = dst.msb(self)?;

        let mut carry = false;
        for _ in 0..count {
            carry = match shift {
                Shift::Left => dst.msb(self)?,
                Shift::LogicalRight | Shift::ArithmeticRight => dst.lsb(self)?,
            };
            let value = dst.read_zero_extended(self)?;
            dst.write(self, shift_once(shift, value, size))?;
        }
        let result = dst.read_zero_extended(self)?;

        self.set_flag_state(Flag::Carry, carry);
        if count == 1 {
            let overflow = match shift {
                Shift::Left => (result & size.msb_mask() != 0) ^ carry,
                Shift::LogicalRight => pre_msb,
                Shift::ArithmeticRight => false,
            };
            self.set_flag_state(Flag::Overflow, overflow);
        }
        self.set_sf_zf_pf(result, size);
        Ok(())
    }

    pub fn sal(&mut self, dst: Operand, count: u8) -> Result<(), CpuError> {
        self.bitshift_op(Shift::Left, dst, count)
    }

    /// Identical to sal.
    pub fn shl(&mut self, dst: Operand, count: u8) -> Result<(), CpuError> {
        self.bitshift_op(Shift::Left, dst, count)
    }

    pub fn shr(&mut self, dst: Operand, count: u8) -> Result<(), CpuError> {
        self.bitshift_op(Shift::LogicalRight, dst, count)
    }

    pub fn sar(&mut self, dst: Operand, count: u8) -> Result<(), CpuError> {
        self.bitshift_op(Shift::ArithmeticRight, dst, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_common::{OperandSize, Register32};

    const EAX: Operand = Operand::Reg(0, OperandSize::Operand32);
    const AL: Operand = Operand::Reg(0, OperandSize::Operand8);

    #[test]
    fn test_shl_carry_is_pre_shift_msb() {
        let mut cpu = CpuX86::new(0x10);
        for value in [0x80u32, 0x40, 0xC1, 0x01] {
            cpu.set_register(Register32::EAX, value);
            cpu.shl(AL, 1).unwrap();
            assert_eq!(cpu.get_flag(Flag::Carry), value & 0x80 != 0);
            assert_eq!(cpu.register(Register32::EAX), (value << 1) & 0xFF);
        }
    }

    #[test]
    fn test_shr_carry_is_pre_shift_lsb() {
        let mut cpu = CpuX86::new(0x10);
        for value in [0x8000_0001u32, 0x8000_0000, 0x3, 0x2] {
            cpu.set_register(Register32::EAX, value);
            cpu.shr(EAX, 1).unwrap();
            assert_eq!(cpu.get_flag(Flag::Carry), value & 1 != 0);
            assert_eq!(cpu.get_flag(Flag::Overflow), value & 0x8000_0000 != 0);
            assert_eq!(cpu.register(Register32::EAX), value >> 1);
        }
    }

    #[test]
    fn test_sal_overflow() {
        let mut cpu = CpuX86::new(0x10);
        // 0x40 << 1 = 0x80: msb set, carry clear
        cpu.set_register(Register32::EAX, 0x40);
        cpu.sal(AL, 1).unwrap();
        assert!(cpu.get_flag(Flag::Overflow));
        assert!(cpu.get_flag(Flag::Sign));
        // 0xC0 << 1 = 0x80: msb set, carry set
        cpu.set_register(Register32::EAX, 0xC0);
        cpu.sal(AL, 1).unwrap();
        assert!(!cpu.get_flag(Flag::Overflow));
        assert!(cpu.get_flag(Flag::Carry));
    }

    #[test]
    fn test_sar_keeps_sign() {
        let mut cpu = CpuX86::new(0x10);
        cpu.set_flag(Flag::Overflow);
        cpu.set_register(Register32::EAX, 0x85);
        cpu.sar(AL, 1).unwrap();
        assert_eq!(cpu.register(Register32::EAX), 0xC2);
        assert!(cpu.get_flag(Flag::Carry));
        assert!(!cpu.get_flag(Flag::Overflow));

        cpu.set_register(Register32::EAX, 0x8000_0000);
        cpu.sar(EAX, 31).unwrap();
        assert_eq!(cpu.register(Register32::EAX), 0xFFFF_FFFF);
    }

    #[test]
    fn test_count_masked_and_zero_is_noop() {
        let mut cpu = CpuX86::new(0x10);
        cpu.set_register(Register32::EAX, 0x1234);
        cpu.set_flag(Flag::Carry);
        let flags = cpu.eflags();
        cpu.shl(EAX, 32).unwrap();
        assert_eq!(cpu.register(Register32::EAX), 0x1234);
        assert_eq!(cpu.eflags(), flags);

        // 33 & 0x1F == 1
        cpu.shl(EAX, 33).unwrap();
        assert_eq!(cpu.register(Register32::EAX), 0x2468);
    }

    #[test]
    fn test_multi_bit_shift_carry_is_last_bit_out() {
        let mut cpu = CpuX86::new(0x10);
        let word = Operand::Mem(0x2, OperandSize::Operand16);
        word.write(&mut cpu, 0b0100_0000_0000_0000).unwrap();
        cpu.shl(word, 2).unwrap();
        assert_eq!(word.read_zero_extended(&cpu).unwrap(), 0);
        assert!(cpu.get_flag(Flag::Carry));
        assert!(cpu.get_flag(Flag::Zero));
    }

    #[test]
    fn test_flags_use_own_width_bits() {
        // AH = 0x81 inside EAX; bit 0 and bit 7 of AH, not of EAX, decide CF and OF
        let mut cpu = CpuX86::new(0x10);
        let ah = Operand::Reg(4, OperandSize::Operand8);
        cpu.set_register(Register32::EAX, 0x0000_8100);
        cpu.shr(ah, 1).unwrap();
        assert_eq!(cpu.register(Register32::EAX), 0x0000_4000);
        assert!(cpu.get_flag(Flag::Carry));
        assert!(cpu.get_flag(Flag::Overflow));

        // Shifting a byte past its width leaves zero and a clear carry
        cpu.set_register(Register32::EAX, 0x0000_0081);
        cpu.shl(AL, 9).unwrap();
        assert_eq!(cpu.register(Register32::EAX), 0);
        assert!(!cpu.get_flag(Flag::Carry));
        assert!(cpu.get_flag(Flag::Zero));
    }
}
