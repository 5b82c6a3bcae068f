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

    cpu_x86::stack.rs

    Implements stack-oriented routines such as push and pop.

    The stack lives in the same flat memory as everything else: esp is used as
    a plain address with no segment base. Slot width follows the operand size,
    except for call/ret return addresses which are always 4 bytes.

*/

use crate::{
    cpu_common::{error::CpuError, instruction::Operand, OperandSize, Register32},
    cpu_x86::CpuX86,
};

const ESP: usize = Register32::ESP.index();

impl CpuX86 {
    /// Push the low `size` bytes of `value`. esp is only updated once the write succeeds.
    #[inline]
    pub fn push(&mut self, value: u32, size: OperandSize) -> Result<(), CpuError> {
        // Stack pointer grows downwards
        let esp = self.regs[ESP].wrapping_sub(size.bytes());
        Operand::Mem(esp, size).write(self, value)?;
        self.regs[ESP] = esp;
        Ok(())
    }

    /// Pop a value of `dst`'s width into `dst`. esp is incremented before the write, so
    /// popping into esp leaves the popped value in esp.
    #[inline]
    pub fn pop(&mut self, dst: Operand) -> Result<(), CpuError> {
        let size = dst.size();
        let esp = self.regs[ESP];
        let value = Operand::Mem(esp, size).read_zero_extended(self)?;

        // Stack pointer shrinks upwards
        self.regs[ESP] = esp.wrapping_add(size.bytes());
        dst.write(self, value)
    }

    #[inline]
    pub fn push_u32(&mut self, value: u32) -> Result<(), CpuError> {
        self.push(value, OperandSize::Operand32)
    }

    #[inline]
    pub fn pop_u32(&mut self) -> Result<u32, CpuError> {
        let esp = self.regs[ESP];
        let value = self.load_dword_at(esp)?;
        self.regs[ESP] = esp.wrapping_add(4);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_restores() {
        let mut cpu = CpuX86::new(0x100);
        for size in [OperandSize::Operand16, OperandSize::Operand32] {
            cpu.set_register(Register32::ESP, 0x80);
            cpu.push(0xCAFE_BABE, size).unwrap();
            assert_eq!(cpu.register(Register32::ESP), 0x80 - size.bytes());

            let dst = Operand::Reg(Register32::EDX.index() as u8, size);
            cpu.pop(dst).unwrap();
            assert_eq!(dst.read_zero_extended(&cpu).unwrap(), 0xCAFE_BABE & size.mask());
            assert_eq!(cpu.register(Register32::ESP), 0x80);
        }
    }

    #[test]
    fn test_push_layout() {
        let mut cpu = CpuX86::new(0x100);
        cpu.set_register(Register32::ESP, 0x10);
        cpu.push_u32(0x1122_3344).unwrap();
        assert_eq!(cpu.memory().read_u8(0x0C).unwrap(), 0x44);
        assert_eq!(cpu.memory().read_u8(0x0F).unwrap(), 0x11);
        assert_eq!(cpu.pop_u32().unwrap(), 0x1122_3344);
        assert_eq!(cpu.register(Register32::ESP), 0x10);
    }

    #[test]
    fn test_pop_into_esp() {
        let mut cpu = CpuX86::new(0x100);
        cpu.set_register(Register32::ESP, 0x40);
        cpu.push_u32(0x20).unwrap();
        cpu.pop(Operand::Reg(Register32::ESP.index() as u8, OperandSize::Operand32)).unwrap();
        assert_eq!(cpu.register(Register32::ESP), 0x20);
    }

    #[test]
    fn test_push_fault_leaves_esp() {
        let mut cpu = CpuX86::new(0x100);
        cpu.set_register(Register32::ESP, 0x2);
        assert!(matches!(cpu.push_u32(1), Err(CpuError::MemoryFault { .. })));
        assert_eq!(cpu.register(Register32::ESP), 0x2);
    }
}
