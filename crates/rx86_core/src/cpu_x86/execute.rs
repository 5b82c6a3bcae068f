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

    cpu_x86::execute.rs

    Binds decoded instructions to their semantic handlers.

    Every entry in the decode tables names one of the op_* functions here. Each
    one unpacks the already-resolved operands and calls the handler, which
    never fetches.

*/

use crate::{
    cpu_common::{
        error::CpuError,
        instruction::{Operand, OperandType},
        Instruction,
    },
    cpu_x86::{flags::Flag, jump::Condition, CpuX86},
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ExecutionResult {
    #[default]
    Okay,
    OkayJump,
    Halt,
}

#[inline]
fn unsupported(i: &Instruction) -> CpuError {
    CpuError::UnsupportedOpcode {
        opcode: i.opcode,
        eip: i.address,
    }
}

#[inline]
fn location(op: OperandType, i: &Instruction) -> Result<Operand, CpuError> {
    match op {
        OperandType::Location(operand) => Ok(operand),
        _ => Err(unsupported(i)),
    }
}

#[inline]
fn relative(i: &Instruction) -> Result<i32, CpuError> {
    match i.operand1 {
        OperandType::Relative(rel) => Ok(rel),
        _ => Err(unsupported(i)),
    }
}

impl CpuX86 {
    /// Value of an operand. Locations are read sign-extended; immediates were extended
    /// at decode.
    #[inline]
    fn operand_value(&self, op: OperandType, i: &Instruction) -> Result<u32, CpuError> {
        match op {
            OperandType::Location(operand) => operand.read_signed(self),
            OperandType::Immediate(imm) => Ok(imm),
            _ => Err(unsupported(i)),
        }
    }

    #[inline]
    fn alu_operands(&self, i: &Instruction) -> Result<(Operand, u32), CpuError> {
        let dst = location(i.operand1, i)?;
        let src = self.operand_value(i.operand2, i)?;
        Ok((dst, src))
    }

    /// Execute a decoded instruction through its table entry.
    #[inline]
    pub fn execute_instruction(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        (CpuX86::template(i).handler)(self, i)
    }

    pub(crate) fn op_invalid(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        Err(unsupported(i))
    }

    pub(crate) fn op_add(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let (dst, src) = self.alu_operands(i)?;
        self.add(dst, src)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_or(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let (dst, src) = self.alu_operands(i)?;
        self.or(dst, src)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_adc(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let (dst, src) = self.alu_operands(i)?;
        self.adc(dst, src)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_sbb(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let (dst, src) = self.alu_operands(i)?;
        self.sbb(dst, src)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_and(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let (dst, src) = self.alu_operands(i)?;
        self.and(dst, src)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_sub(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let (dst, src) = self.alu_operands(i)?;
        self.sub(dst, src)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_xor(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let (dst, src) = self.alu_operands(i)?;
        self.xor(dst, src)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_cmp(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let (dst, src) = self.alu_operands(i)?;
        self.cmp(dst, src)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_test(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let (dst, src) = self.alu_operands(i)?;
        self.test(dst, src)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_inc(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.inc(location(i.operand1, i)?)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_dec(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.dec(location(i.operand1, i)?)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_mov(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let dst = location(i.operand1, i)?;
        match i.operand2 {
            OperandType::Location(src) => src.copy_to(self, dst)?,
            OperandType::Immediate(imm) => dst.write(self, imm)?,
            _ => return Err(unsupported(i)),
        }
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_movsx(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let dst = location(i.operand1, i)?;
        let value = location(i.operand2, i)?.read_signed(self)?;
        dst.write(self, value)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_movzx(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let dst = location(i.operand1, i)?;
        let value = location(i.operand2, i)?.read_zero_extended(self)?;
        dst.write(self, value)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_lea(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let dst = location(i.operand1, i)?;
        match location(i.operand2, i)? {
            Operand::Mem(ea, _) => dst.write(self, ea)?,
            Operand::Reg(..) => return Err(unsupported(i)),
        }
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_push(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let value = self.operand_value(i.operand1, i)?;
        self.push(value, i.operand_size)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_pop(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.pop(location(i.operand1, i)?)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_call(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.call(relative(i)?, i.operand_size)?;
        Ok(ExecutionResult::OkayJump)
    }

    pub(crate) fn op_ret(&mut self, _i: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.ret_near()?;
        Ok(ExecutionResult::OkayJump)
    }

    pub(crate) fn op_jmp(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.jmp_rel(relative(i)?, i.operand_size);
        Ok(ExecutionResult::OkayJump)
    }

    pub(crate) fn op_jcc(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        if self.jcc(Condition::from_opcode(i.opcode), relative(i)?, i.operand_size) {
            Ok(ExecutionResult::OkayJump)
        }
        else {
            Ok(ExecutionResult::Okay)
        }
    }

    pub(crate) fn op_shl(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let (dst, count) = self.alu_operands(i)?;
        self.shl(dst, count as u8)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_sal(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let (dst, count) = self.alu_operands(i)?;
        self.sal(dst, count as u8)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_shr(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let (dst, count) = self.alu_operands(i)?;
        self.shr(dst, count as u8)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_sar(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let (dst, count) = self.alu_operands(i)?;
        self.sar(dst, count as u8)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_aam(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        let base = self.operand_value(i.operand1, i)?;
        self.aam(base as u8)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_lgdt(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        match location(i.operand1, i)? {
            Operand::Mem(ea, _) => self.lgdt(ea, i.operand_size)?,
            Operand::Reg(..) => return Err(unsupported(i)),
        }
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_lidt(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        match location(i.operand1, i)? {
            Operand::Mem(ea, _) => self.lidt(ea, i.operand_size)?,
            Operand::Reg(..) => return Err(unsupported(i)),
        }
        Ok(ExecutionResult::Okay)
    }

    /// mov r32, crN and mov crN, r32.
    pub(crate) fn op_mov_cr(&mut self, i: &Instruction) -> Result<ExecutionResult, CpuError> {
        match (i.operand1, i.operand2) {
            (OperandType::Location(dst), OperandType::ControlRegister(cr)) => {
                let value = self.control_register(cr).ok_or_else(|| unsupported(i))?;
                dst.write(self, value)?;
            }
            (OperandType::ControlRegister(cr), OperandType::Location(src)) => {
                let value = src.read_zero_extended(self)?;
                if !self.set_control_register(cr, value) {
                    return Err(unsupported(i));
                }
            }
            _ => return Err(unsupported(i)),
        }
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_cli(&mut self, _i: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.cli()?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_sti(&mut self, _i: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.sti()?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_clc(&mut self, _i: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.clear_flag(Flag::Carry);
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_stc(&mut self, _i: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.set_flag(Flag::Carry);
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_cld(&mut self, _i: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.clear_flag(Flag::Direction);
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_std(&mut self, _i: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.set_flag(Flag::Direction);
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_nop(&mut self, _i: &Instruction) -> Result<ExecutionResult, CpuError> {
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_hlt(&mut self, _i: &Instruction) -> Result<ExecutionResult, CpuError> {
        Ok(ExecutionResult::Halt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cpu_common::{Register32, Register8},
        cpu_x86::decode::DecodeContext,
    };

    fn exec(cpu: &mut CpuX86, bytes: &[u8]) -> Result<ExecutionResult, CpuError> {
        let eip = cpu.eip();
        cpu.load_program(eip, bytes).unwrap();
        let mut ctx = DecodeContext::default();
        let i = cpu.decode(&mut ctx)?;
        cpu.execute_instruction(&i)
    }

    fn pm_cpu() -> CpuX86 {
        let mut cpu = CpuX86::new(0x1000);
        cpu.set_protected_mode(true);
        cpu.set_register(Register32::ESP, 0x800);
        cpu
    }

    #[test]
    fn test_lea_does_not_access_memory() {
        let mut cpu = pm_cpu();
        cpu.set_register(Register32::EBX, 0xFFFF_0000);
        cpu.set_register(Register32::ESI, 0x10);
        // lea eax, [ebx+esi*2+0x20]
        exec(&mut cpu, &[0x8D, 0x44, 0x73, 0x20]).unwrap();
        assert_eq!(cpu.register(Register32::EAX), 0xFFFF_0040);
    }

    #[test]
    fn test_movsx_movzx() {
        let mut cpu = pm_cpu();
        cpu.set_register(Register32::EBX, 0x0000_0080);
        // movsx eax, bl
        exec(&mut cpu, &[0x0F, 0xBE, 0xC3]).unwrap();
        assert_eq!(cpu.register(Register32::EAX), 0xFFFF_FF80);
        // movzx ecx, bl
        exec(&mut cpu, &[0x0F, 0xB6, 0xCB]).unwrap();
        assert_eq!(cpu.register(Register32::ECX), 0x0000_0080);
    }

    #[test]
    fn test_mov_byte_keeps_zero_extension_apart() {
        let mut cpu = pm_cpu();
        cpu.set_register(Register32::EAX, 0x1111_1111);
        cpu.set_register(Register32::EBX, 0x0000_00F0);
        // mov al, bl
        exec(&mut cpu, &[0x88, 0xD8]).unwrap();
        assert_eq!(cpu.register(Register32::EAX), 0x1111_11F0);
    }

    #[test]
    fn test_push_imm8_sign_extended() {
        let mut cpu = pm_cpu();
        exec(&mut cpu, &[0x6A, 0xFE]).unwrap();
        assert_eq!(cpu.register(Register32::ESP), 0x7FC);
        assert_eq!(cpu.load_dword_at(0x7FC).unwrap(), 0xFFFF_FFFE);
        // pop edx
        exec(&mut cpu, &[0x5A]).unwrap();
        assert_eq!(cpu.register(Register32::EDX), 0xFFFF_FFFE);
        assert_eq!(cpu.register(Register32::ESP), 0x800);
    }

    #[test]
    fn test_push_width_follows_operand_size() {
        let mut cpu = pm_cpu();
        cpu.set_register(Register32::EAX, 0x1234_5678);
        // push ax
        exec(&mut cpu, &[0x66, 0x50]).unwrap();
        assert_eq!(cpu.register(Register32::ESP), 0x7FE);
        assert_eq!(cpu.load_word_at(0x7FE).unwrap(), 0x5678);
    }

    #[test]
    fn test_group1_cmp_and_jcc() {
        let mut cpu = pm_cpu();
        cpu.set_register(Register32::ECX, 3);
        // cmp ecx, 3
        exec(&mut cpu, &[0x83, 0xF9, 0x03]).unwrap();
        assert!(cpu.get_flag(Flag::Zero));
        assert_eq!(cpu.register(Register32::ECX), 3);
        // jz +0x10
        let eip = cpu.eip();
        assert_eq!(exec(&mut cpu, &[0x74, 0x10]).unwrap(), ExecutionResult::OkayJump);
        assert_eq!(cpu.eip(), eip + 2 + 0x10);
    }

    #[test]
    fn test_shift_by_cl() {
        let mut cpu = pm_cpu();
        cpu.set_register(Register32::EDX, 1);
        cpu.set_register8(Register8::CL, 4);
        // shl edx, cl
        exec(&mut cpu, &[0xD3, 0xE2]).unwrap();
        assert_eq!(cpu.register(Register32::EDX), 0x10);
        // sar edx, 1
        exec(&mut cpu, &[0xD1, 0xFA]).unwrap();
        assert_eq!(cpu.register(Register32::EDX), 0x8);
    }

    #[test]
    fn test_mov_to_and_from_cr0() {
        let mut cpu = CpuX86::new(0x100);
        cpu.set_register(Register32::EAX, 1);
        // mov cr0, eax
        exec(&mut cpu, &[0x0F, 0x22, 0xC0]).unwrap();
        assert!(cpu.protected_mode());
        // mov ebx, cr0
        exec(&mut cpu, &[0x0F, 0x20, 0xC3]).unwrap();
        assert_eq!(cpu.register(Register32::EBX), 1);
        // mov cr4, eax is not modelled
        assert!(matches!(
            exec(&mut cpu, &[0x0F, 0x22, 0xE0]),
            Err(CpuError::UnsupportedOpcode { opcode: 0x0F22, .. })
        ));
    }

    #[test]
    fn test_flag_instructions() {
        let mut cpu = pm_cpu();
        exec(&mut cpu, &[0xF9]).unwrap();
        assert!(cpu.get_flag(Flag::Carry));
        exec(&mut cpu, &[0xF8]).unwrap();
        assert!(!cpu.get_flag(Flag::Carry));
        exec(&mut cpu, &[0xFD]).unwrap();
        assert!(cpu.get_flag(Flag::Direction));
        exec(&mut cpu, &[0xFC]).unwrap();
        assert!(!cpu.get_flag(Flag::Direction));
        assert_eq!(exec(&mut cpu, &[0xF4]).unwrap(), ExecutionResult::Halt);
    }

    #[test]
    fn test_lgdt_through_decode() {
        let mut cpu = pm_cpu();
        cpu.load_program(0x200, &[0xFF, 0x00, 0x00, 0x10, 0x00, 0x00]).unwrap();
        // lgdt [0x200]
        exec(&mut cpu, &[0x0F, 0x01, 0x15, 0x00, 0x02, 0x00, 0x00]).unwrap();
        assert_eq!(cpu.gdtr().limit, 0xFF);
        assert_eq!(cpu.gdtr().base, 0x1000);
    }
}
