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

    cpu_x86::operand.rs

    Reads and writes through operand references.

    A signed read extends the stored value's own-width sign bit through 32 bits;
    a zero-extended read pads with zeros. Arithmetic uses the former, moves to
    wider destinations and address computation use the latter. Writes always
    truncate to the operand's width.

*/

use crate::{
    cpu_common::{error::CpuError, instruction::Operand, OperandSize},
    cpu_x86::CpuX86,
};

impl Operand {
    /// Read the location and sign-extend it to 32 bits.
    #[inline]
    pub fn read_signed(&self, cpu: &CpuX86) -> Result<u32, CpuError> {
        Ok(self.size().sign_extend(self.read_zero_extended(cpu)?))
    }

    /// Read the location and zero-extend it to 32 bits.
    #[inline]
    pub fn read_zero_extended(&self, cpu: &CpuX86) -> Result<u32, CpuError> {
        match *self {
            Operand::Reg(idx, size) => Ok(cpu.read_reg(idx, size)),
            Operand::Mem(addr, OperandSize::Operand8) => Ok(cpu.load_byte_at(addr)? as u32),
            Operand::Mem(addr, OperandSize::Operand16) => Ok(cpu.load_word_at(addr)? as u32),
            Operand::Mem(addr, OperandSize::Operand32) => cpu.load_dword_at(addr),
        }
    }

    /// Truncate `value` to the operand's width and store it.
    #[inline]
    pub fn write(&self, cpu: &mut CpuX86, value: u32) -> Result<(), CpuError> {
        match *self {
            Operand::Reg(idx, size) => {
                cpu.write_reg(idx, size, value);
                Ok(())
            }
            Operand::Mem(addr, OperandSize::Operand8) => Ok(cpu.mem.write_u8(addr, value as u8)?),
            Operand::Mem(addr, OperandSize::Operand16) => Ok(cpu.mem.write_u16(addr, value as u16)?),
            Operand::Mem(addr, OperandSize::Operand32) => Ok(cpu.mem.write_u32(addr, value)?),
        }
    }

    /// Most significant bit at the operand's own width.
    #[inline]
    pub fn msb(&self, cpu: &CpuX86) -> Result<bool, CpuError> {
        Ok(self.read_zero_extended(cpu)? & self.size().msb_mask() != 0)
    }

    #[inline]
    pub fn lsb(&self, cpu: &CpuX86) -> Result<bool, CpuError> {
        Ok(self.read_zero_extended(cpu)? & 1 != 0)
    }

    /// Copy this operand's value into `dst`: a signed read followed by a truncating write.
    #[inline]
    pub fn copy_to(&self, cpu: &mut CpuX86, dst: Operand) -> Result<(), CpuError> {
        let value = self.read_signed(cpu)?;
        dst.write(cpu, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_common::Register32;

    const SIZES: [OperandSize; 3] = [OperandSize::Operand8, OperandSize::Operand16, OperandSize::Operand32];

    #[test]
    fn test_truncating_write() {
        let mut cpu = CpuX86::new(0x100);
        for size in SIZES {
            for value in [0u32, 0x7F, 0x80, 0xFFFF, 0x1_2345, 0xDEAD_BEEF] {
                let reg = Operand::Reg(1, size);
                reg.write(&mut cpu, value).unwrap();
                assert_eq!(reg.read_zero_extended(&cpu).unwrap(), value & size.mask());

                let mem = Operand::Mem(0x10, size);
                mem.write(&mut cpu, value).unwrap();
                assert_eq!(mem.read_zero_extended(&cpu).unwrap(), value & size.mask());
            }
        }
    }

    #[test]
    fn test_sign_extension() {
        let mut cpu = CpuX86::new(0x100);
        let op = Operand::Mem(0x20, OperandSize::Operand8);
        op.write(&mut cpu, 0x80).unwrap();
        assert_eq!(op.read_signed(&cpu).unwrap(), 0xFFFF_FF80);
        assert_eq!(op.read_zero_extended(&cpu).unwrap(), 0x0000_0080);
        op.write(&mut cpu, 0x7F).unwrap();
        assert_eq!(op.read_signed(&cpu).unwrap(), 0x0000_007F);

        let op = Operand::Reg(2, OperandSize::Operand16);
        op.write(&mut cpu, 0x8001).unwrap();
        assert_eq!(op.read_signed(&cpu).unwrap(), 0xFFFF_8001);
    }

    #[test]
    fn test_partial_register_write_preserves_upper_bits() {
        let mut cpu = CpuX86::new(0x10);
        cpu.set_register(Register32::EAX, 0xAABB_CCDD);
        Operand::Reg(0, OperandSize::Operand16).write(&mut cpu, 0x1234).unwrap();
        assert_eq!(cpu.register(Register32::EAX), 0xAABB_1234);
        // AH
        Operand::Reg(4, OperandSize::Operand8).write(&mut cpu, 0x5F).unwrap();
        assert_eq!(cpu.register(Register32::EAX), 0xAABB_5F34);
    }

    #[test]
    fn test_msb_lsb_at_own_width() {
        let mut cpu = CpuX86::new(0x10);
        cpu.set_register(Register32::ECX, 0x0000_0081);
        assert!(Operand::Reg(1, OperandSize::Operand8).msb(&cpu).unwrap());
        assert!(!Operand::Reg(1, OperandSize::Operand16).msb(&cpu).unwrap());
        assert!(Operand::Reg(1, OperandSize::Operand32).lsb(&cpu).unwrap());
    }

    #[test]
    fn test_copy_between_widths() {
        let mut cpu = CpuX86::new(0x10);
        cpu.set_register(Register32::EBX, 0x0000_00F0);
        cpu.set_register(Register32::EAX, 0x1111_1111);
        // byte -> dword copies sign-extended
        Operand::Reg(3, OperandSize::Operand8)
            .copy_to(&mut cpu, Operand::Reg(0, OperandSize::Operand32))
            .unwrap();
        assert_eq!(cpu.register(Register32::EAX), 0xFFFF_FFF0);
        // dword -> word truncates
        cpu.set_register(Register32::EDX, 0x1234_5678);
        Operand::Reg(2, OperandSize::Operand32)
            .copy_to(&mut cpu, Operand::Reg(3, OperandSize::Operand16))
            .unwrap();
        assert_eq!(cpu.register(Register32::EBX), 0x0000_5678);
    }

    #[test]
    fn test_memory_operand_out_of_range() {
        let mut cpu = CpuX86::new(0x10);
        let op = Operand::Mem(0x0E, OperandSize::Operand32);
        assert!(matches!(op.read_zero_extended(&cpu), Err(CpuError::MemoryFault { address: 0x0E, .. })));
        assert!(matches!(op.write(&mut cpu, 1), Err(CpuError::MemoryFault { .. })));
    }
}
