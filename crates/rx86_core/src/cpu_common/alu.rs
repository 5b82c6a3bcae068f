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

    cpu_common::alu.rs

    Width-generic arithmetic primitives.

    Operands are passed as u32 together with the OperandSize they are to be
    treated at. Sums and differences are formed at 64 bits so that the carry
    out of the top bit is always visible, then masked back to the operand's
    width.

*/

use crate::cpu_common::OperandSize;

/// A masked result with the carry and signed overflow it produced.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AluResult {
    pub value: u32,
    pub carry: bool,
    pub overflow: bool,
}

/// Direction of a single-bit shift step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Shift {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// `lhs + rhs + carry_in` at `size`. Carry is unsigned overflow out of the top bit, overflow
/// is set when both inputs share a sign that the result does not.
pub fn add_with_carry(lhs: u32, rhs: u32, carry_in: bool, size: OperandSize) -> AluResult {
    let mask = size.mask() as u64;
    let sign = size.msb_mask() as u64;
    let (lhs, rhs) = (lhs as u64 & mask, rhs as u64 & mask);

    let sum = lhs + rhs + carry_in as u64;
    AluResult {
        value: (sum & mask) as u32,
        carry: sum > mask,
        overflow: (lhs ^ sum) & (rhs ^ sum) & sign != 0,
    }
}

/// `lhs - (rhs + borrow_in)` at `size`. Carry is set on borrow, overflow when the inputs'
/// signs differ and the result's sign differs from `lhs`.
pub fn sub_with_borrow(lhs: u32, rhs: u32, borrow_in: bool, size: OperandSize) -> AluResult {
    let mask = size.mask() as u64;
    let sign = size.msb_mask() as u64;
    let (lhs, rhs) = (lhs as u64 & mask, rhs as u64 & mask);

    let subtrahend = rhs + borrow_in as u64;
    let difference = lhs.wrapping_sub(subtrahend);
    AluResult {
        value: (difference & mask) as u32,
        carry: subtrahend > lhs,
        overflow: (lhs ^ rhs) & (lhs ^ difference) & sign != 0,
    }
}

/// Shift `value` by one bit at `size`. The bit shifted out is not returned; callers read it
/// from the operand beforehand.
#[inline]
pub const fn shift_once(shift: Shift, value: u32, size: OperandSize) -> u32 {
    let value = value & size.mask();
    match shift {
        Shift::Left => (value << 1) & size.mask(),
        Shift::LogicalRight => value >> 1,
        Shift::ArithmeticRight => (value >> 1) | (value & size.msb_mask()),
    }
}
