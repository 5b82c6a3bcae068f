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

    cpu_x86::jump.rs

    Relative jumps, conditional jumps, call and return.

*/

use crate::{
    cpu_common::{error::CpuError, OperandSize},
    cpu_x86::{flags::Flag, CpuX86},
};

/// Jump conditions in encoding order (the low nibble of 0x70-0x7F and 0x0F 0x80-0x8F).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Overflow,
    NotOverflow,
    Below,
    NotBelow,
    Zero,
    NotZero,
    BelowOrEqual,
    Above,
    Sign,
    NotSign,
    Parity,
    NotParity,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Greater,
}

impl Condition {
    pub const fn from_opcode(opcode: u16) -> Condition {
        match opcode & 0x0F {
            0x0 => Condition::Overflow,
            0x1 => Condition::NotOverflow,
            0x2 => Condition::Below,
            0x3 => Condition::NotBelow,
            0x4 => Condition::Zero,
            0x5 => Condition::NotZero,
            0x6 => Condition::BelowOrEqual,
            0x7 => Condition::Above,
            0x8 => Condition::Sign,
            0x9 => Condition::NotSign,
            0xA => Condition::Parity,
            0xB => Condition::NotParity,
            0xC => Condition::Less,
            0xD => Condition::GreaterOrEqual,
            0xE => Condition::LessOrEqual,
            _ => Condition::Greater,
        }
    }
}

impl CpuX86 {
    pub fn condition_met(&self, cond: Condition) -> bool {
        let cf = self.get_flag(Flag::Carry);
        let zf = self.get_flag(Flag::Zero);
        let sf = self.get_flag(Flag::Sign);
        let of = self.get_flag(Flag::Overflow);
        let pf = self.get_flag(Flag::Parity);

        match cond {
            Condition::Overflow => of,
            Condition::NotOverflow => !of,
            Condition::Below => cf,
            Condition::NotBelow => !cf,
            Condition::Zero => zf,
            Condition::NotZero => !zf,
            Condition::BelowOrEqual => cf || zf,
            Condition::Above => !cf && !zf,
            Condition::Sign => sf,
            Condition::NotSign => !sf,
            Condition::Parity => pf,
            Condition::NotParity => !pf,
            Condition::Less => sf != of,
            Condition::GreaterOrEqual => sf == of,
            Condition::LessOrEqual => zf || (sf != of),
            Condition::Greater => !zf && (sf == of),
        }
    }

    /// Add a relative displacement to eip. With a 16-bit operand size the result wraps
    /// at 64K.
    #[inline]
    pub fn jmp_rel(&mut self, rel: i32, size: OperandSize) {
        let eip = self.eip.wrapping_add(rel as u32);
        self.eip = match size {
            OperandSize::Operand16 => eip & 0xFFFF,
            _ => eip,
        };
    }

    /// Jump if `cond` holds. Returns whether the jump was taken.
    #[inline]
    pub fn jcc(&mut self, cond: Condition, rel: i32, size: OperandSize) -> bool {
        let taken = self.condition_met(cond);
        if taken {
            self.jmp_rel(rel, size);
        }
        taken
    }

    /// Push the return address (eip, already past the call) and jump.
    pub fn call(&mut self, rel: i32, size: OperandSize) -> Result<(), CpuError> {
        self.push_u32(self.eip)?;
        self.jmp_rel(rel, size);
        Ok(())
    }

    pub fn ret_near(&mut self) -> Result<(), CpuError> {
        self.eip = self.pop_u32()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_common::Register32;

    #[test]
    fn test_jmp_rel() {
        let mut cpu = CpuX86::new(0x10);
        cpu.set_eip(0x102);
        cpu.jmp_rel(5, OperandSize::Operand32);
        assert_eq!(cpu.eip(), 0x107);
        cpu.jmp_rel(-0x10, OperandSize::Operand32);
        assert_eq!(cpu.eip(), 0xF7);
    }

    #[test]
    fn test_jmp_rel16_wraps() {
        let mut cpu = CpuX86::new(0x10);
        cpu.set_eip(0xFFFE);
        cpu.jmp_rel(4, OperandSize::Operand16);
        assert_eq!(cpu.eip(), 0x0002);
        cpu.set_eip(0x1_0002);
        cpu.jmp_rel(4, OperandSize::Operand32);
        assert_eq!(cpu.eip(), 0x1_0006);
    }

    #[test]
    fn test_jle_condition() {
        let mut cpu = CpuX86::new(0x10);
        assert!(!cpu.condition_met(Condition::LessOrEqual));
        cpu.set_flag(Flag::Zero);
        assert!(cpu.condition_met(Condition::LessOrEqual));
        cpu.clear_flag(Flag::Zero);
        cpu.set_flag(Flag::Sign);
        assert!(cpu.condition_met(Condition::LessOrEqual));
        cpu.set_flag(Flag::Overflow);
        assert!(!cpu.condition_met(Condition::LessOrEqual));
        assert!(cpu.condition_met(Condition::Greater));
    }

    #[test]
    fn test_condition_pairs_are_complements() {
        let mut cpu = CpuX86::new(0x10);
        for eflags in [0x2u32, 0x8C3, 0x0C1, 0x895, 0x2 | 0x40] {
            cpu.set_eflags(eflags);
            for cc in (0..16u16).step_by(2) {
                let a = cpu.condition_met(Condition::from_opcode(cc));
                let b = cpu.condition_met(Condition::from_opcode(cc + 1));
                assert_ne!(a, b, "condition {:X} with eflags {:X}", cc, eflags);
            }
        }
    }

    #[test]
    fn test_jcc_not_taken() {
        let mut cpu = CpuX86::new(0x10);
        cpu.set_eip(0x20);
        assert!(!cpu.jcc(Condition::Zero, 0x10, OperandSize::Operand32));
        assert_eq!(cpu.eip(), 0x20);
        assert!(cpu.jcc(Condition::NotZero, 0x10, OperandSize::Operand32));
        assert_eq!(cpu.eip(), 0x30);
    }

    #[test]
    fn test_call_ret() {
        let mut cpu = CpuX86::new(0x1000);
        cpu.set_register(Register32::ESP, 0x800);
        cpu.set_eip(0x105);
        cpu.call(0x100, OperandSize::Operand32).unwrap();
        assert_eq!(cpu.eip(), 0x205);
        assert_eq!(cpu.register(Register32::ESP), 0x7FC);
        assert_eq!(cpu.load_dword_at(0x7FC).unwrap(), 0x105);
        cpu.ret_near().unwrap();
        assert_eq!(cpu.eip(), 0x105);
        assert_eq!(cpu.register(Register32::ESP), 0x800);
    }
}
