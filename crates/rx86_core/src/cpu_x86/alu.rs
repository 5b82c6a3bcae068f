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

    cpu_x86::alu.rs

    Arithmetic and logical instruction semantics.

    AF is not computed by any instruction here, and inc/dec leave all flags
    untouched.

*/

use crate::{
    cpu_common::{
        alu::{add_with_carry, sub_with_borrow, AluResult},
        error::CpuError,
        instruction::Operand,
        OperandSize,
        Register8,
        PARITY_TABLE,
    },
    cpu_x86::{flags::Flag, CpuX86},
};

/// Two-operand ALU operations. cmp and test are Sub and And with the result discarded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbb,
    And,
    Or,
    Xor,
}

impl CpuX86 {
    /// Set SF, ZF and PF from a result at the given width. PF reflects the low byte only.
    #[inline]
    pub fn set_sf_zf_pf(&mut self, result: u32, size: OperandSize) {
        self.set_flag_state(Flag::Sign, result & size.msb_mask() != 0);
        self.set_flag_state(Flag::Zero, result & size.mask() == 0);
        self.set_flag_state(Flag::Parity, PARITY_TABLE[(result & 0xFF) as usize]);
    }

    /// Perform an ALU operation at `size`, setting CF/OF per operation and SF/ZF/PF from
    /// the result. Returns the result truncated to `size`.
    pub fn math_op(&mut self, op: AluOp, operand1: u32, operand2: u32, size: OperandSize) -> u32 {
        let carry_in = self.get_flag(Flag::Carry);
        let AluResult { value, carry, overflow } = match op {
            AluOp::Add => add_with_carry(operand1, operand2, false, size),
            AluOp::Adc => add_with_carry(operand1, operand2, carry_in, size),
            AluOp::Sub => sub_with_borrow(operand1, operand2, false, size),
            AluOp::Sbb => sub_with_borrow(operand1, operand2, carry_in, size),
            AluOp::And => AluResult {
                value: operand1 & operand2 & size.mask(),
                carry: false,
                overflow: false,
            },
            AluOp::Or => AluResult {
                value: (operand1 | operand2) & size.mask(),
                carry: false,
                overflow: false,
            },
            AluOp::Xor => AluResult {
                value: (operand1 ^ operand2) & size.mask(),
                carry: false,
                overflow: false,
            },
        };

        self.set_flag_state(Flag::Carry, carry);
        self.set_flag_state(Flag::Overflow, overflow);
        self.set_sf_zf_pf(value, size);
        value
    }

    #[inline]
    fn math_op_rmw(&mut self, op: AluOp, dst: Operand, src: u32) -> Result<(), CpuError> {
        let operand1 = dst.read_signed(self)?;
        let result = self.math_op(op, operand1, src, dst.size());
        dst.write(self, result)
    }

    pub fn add(&mut self, dst: Operand, src: u32) -> Result<(), CpuError> {
        self.math_op_rmw(AluOp::Add, dst, src)
    }

    pub fn adc(&mut self, dst: Operand, src: u32) -> Result<(), CpuError> {
        self.math_op_rmw(AluOp::Adc, dst, src)
    }

    pub fn sub(&mut self, dst: Operand, src: u32) -> Result<(), CpuError> {
        self.math_op_rmw(AluOp::Sub, dst, src)
    }

    pub fn sbb(&mut self, dst: Operand, src: u32) -> Result<(), CpuError> {
        self.math_op_rmw(AluOp::Sbb, dst, src)
    }

    pub fn and(&mut self, dst: Operand, src: u32) -> Result<(), CpuError> {
        self.math_op_rmw(AluOp::And, dst, src)
    }

    pub fn or(&mut self, dst: Operand, src: u32) -> Result<(), CpuError> {
        self.math_op_rmw(AluOp::Or, dst, src)
    }

    pub fn xor(&mut self, dst: Operand, src: u32) -> Result<(), CpuError> {
        self.math_op_rmw(AluOp::Xor, dst, src)
    }

    /// Subtract without storing the result.
    pub fn cmp(&mut self, dst: Operand, src: u32) -> Result<(), CpuError> {
        let operand1 = dst.read_signed(self)?;
        self.math_op(AluOp::Sub, operand1, src, dst.size());
        Ok(())
    }

    /// And without storing the result.
    pub fn test(&mut self, dst: Operand, src: u32) -> Result<(), CpuError> {
        let operand1 = dst.read_signed(self)?;
        self.math_op(AluOp::And, operand1, src, dst.size());
        Ok(())
    }

    pub fn inc(&mut self, dst: Operand) -> Result<(), CpuError> {
        let value = dst.read_signed(self)?;
        dst.write(self, value.wrapping_add(1))
    }

    pub fn dec(&mut self, dst: Operand) -> Result<(), CpuError> {
        let value = dst.read_signed(self)?;
        dst.write(self, value.wrapping_sub(1))
    }

    /// ASCII adjust after multiply: AH := AL / base, AL := AL % base.
    pub fn aam(&mut self, base: u8) -> Result<(), CpuError> {
        if base == 0 {
            return Err(CpuError::DivideError { eip: self.eip });
        }
        let al = self.register8(Register8::AL);
        let quotient = al / base;
        let remainder = al % base;
        self.set_register8(Register8::AH, quotient);
        self.set_register8(Register8::AL, remainder);
        self.set_sf_zf_pf(remainder as u32, OperandSize::Operand8);
        Ok(())
    }
}
