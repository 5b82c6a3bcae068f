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

    cpu_x86::mod.rs

    Implements the x86 machine state: register file, segment selectors, flags,
    control and descriptor-table registers, and the memory array.

    Instruction semantics are spread across the sibling modules as further
    impl blocks on CpuX86.

*/

pub mod alu;
pub mod bitwise;
pub mod decode;
pub mod display;
pub mod execute;
pub mod fetch;
pub mod flags;
pub mod jump;
pub mod modrm;
pub mod operand;
pub mod sib;
pub mod stack;
pub mod step;
pub mod system;

use crate::{
    bus::Memory,
    cpu_common::{OperandSize, Register16, Register32, Register8, Segment},
    cpu_x86::{decode::DecodeContext, flags::Eflags},
};

pub const CR0_PE: u32 = 1 << 0;
pub const CR0_MP: u32 = 1 << 1;
pub const CR0_EM: u32 = 1 << 2;
pub const CR0_TS: u32 = 1 << 3;
pub const CR0_ET: u32 = 1 << 4;
pub const CR0_NE: u32 = 1 << 5;
pub const CR0_WP: u32 = 1 << 16;
pub const CR0_AM: u32 = 1 << 18;
pub const CR0_NW: u32 = 1 << 29;
pub const CR0_CD: u32 = 1 << 30;
pub const CR0_PG: u32 = 1 << 31;

/// GDTR / IDTR contents.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DescriptorTableRegister {
    pub limit: u16,
    pub base:  u32,
}

pub struct CpuX86 {
    regs: [u32; 8],

    es: u16,
    cs: u16,
    ss: u16,
    ds: u16,
    fs: u16,
    gs: u16,

    eflags: Eflags,
    eip: u32,

    cr0: u32,
    cr1: u32,
    cr2: u32,
    cr3: u32,
    gdtr: DescriptorTableRegister,
    idtr: DescriptorTableRegister,
    ldtr: u16,
    tr: u16,

    mem: Memory,

    // Prefix and ModRM/SIB state of the most recently decoded instruction.
    decode_state: DecodeContext,
    instruction_count: u64,
    trace: bool,
}

impl CpuX86 {
    /// Create a machine with `memory_size` bytes of zeroed memory. EFLAGS starts at 0x2,
    /// everything else at zero.
    pub fn new(memory_size: usize) -> Self {
        Self {
            regs: [0; 8],
            es: 0,
            cs: 0,
            ss: 0,
            ds: 0,
            fs: 0,
            gs: 0,
            eflags: Eflags::default(),
            eip: 0,
            cr0: 0,
            cr1: 0,
            cr2: 0,
            cr3: 0,
            gdtr: DescriptorTableRegister::default(),
            idtr: DescriptorTableRegister::default(),
            ldtr: 0,
            tr: 0,
            mem: Memory::new(memory_size),
            decode_state: DecodeContext::default(),
            instruction_count: 0,
            trace: false,
        }
    }

    /// Seed the instruction pointer and any number of general purpose registers before a run.
    pub fn set_entry(&mut self, eip: u32, registers: &[(Register32, u32)]) {
        self.eip = eip;
        for &(reg, value) in registers {
            self.regs[reg.index()] = value;
        }
        log::debug!("Entry point set to {:08X}", eip);
    }

    #[inline]
    pub fn decode_state(&self) -> &DecodeContext {
        &self.decode_state
    }

    #[inline]
    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    #[inline]
    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    #[inline]
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    /* ----------------------------- Registers ------------------------------ */

    #[inline]
    pub fn eip(&self) -> u32 {
        self.eip
    }

    #[inline]
    pub fn set_eip(&mut self, eip: u32) {
        self.eip = eip;
    }

    #[inline(always)]
    pub fn register(&self, reg: Register32) -> u32 {
        self.regs[reg.index()]
    }

    #[inline(always)]
    pub fn set_register(&mut self, reg: Register32, value: u32) {
        self.regs[reg.index()] = value;
    }

    #[inline]
    pub fn register16(&self, reg: Register16) -> u16 {
        self.regs[reg as usize] as u16
    }

    #[inline]
    pub fn set_register16(&mut self, reg: Register16, value: u16) {
        let r = &mut self.regs[reg as usize];
        *r = (*r & 0xFFFF_0000) | value as u32;
    }

    #[inline]
    pub fn register8(&self, reg: Register8) -> u8 {
        self.read_reg8(reg as u8)
    }

    #[inline]
    pub fn set_register8(&mut self, reg: Register8, value: u8) {
        self.write_reg8(reg as u8, value);
    }

    /// Read a byte register by encoding index. 0-3 are the low bytes of eax..ebx, 4-7 are
    /// bits 8..15 of the same registers.
    #[inline(always)]
    pub(crate) fn read_reg8(&self, idx: u8) -> u8 {
        let idx = idx as usize & 0x07;
        if idx < 4 {
            self.regs[idx] as u8
        }
        else {
            (self.regs[idx - 4] >> 8) as u8
        }
    }

    #[inline(always)]
    pub(crate) fn write_reg8(&mut self, idx: u8, value: u8) {
        let idx = idx as usize & 0x07;
        if idx < 4 {
            self.regs[idx] = (self.regs[idx] & 0xFFFF_FF00) | value as u32;
        }
        else {
            self.regs[idx - 4] = (self.regs[idx - 4] & 0xFFFF_00FF) | ((value as u32) << 8);
        }
    }

    /// Read a register by encoding index at the given width, zero-extended.
    #[inline(always)]
    pub(crate) fn read_reg(&self, idx: u8, size: OperandSize) -> u32 {
        match size {
            OperandSize::Operand8 => self.read_reg8(idx) as u32,
            OperandSize::Operand16 => self.regs[idx as usize & 0x07] & 0xFFFF,
            OperandSize::Operand32 => self.regs[idx as usize & 0x07],
        }
    }

    /// Write the low `size` bits of `value` into a register, leaving the upper bits intact.
    #[inline(always)]
    pub(crate) fn write_reg(&mut self, idx: u8, size: OperandSize, value: u32) {
        match size {
            OperandSize::Operand8 => self.write_reg8(idx, value as u8),
            OperandSize::Operand16 => {
                let r = &mut self.regs[idx as usize & 0x07];
                *r = (*r & 0xFFFF_0000) | (value & 0xFFFF);
            }
            OperandSize::Operand32 => self.regs[idx as usize & 0x07] = value,
        }
    }

    #[inline]
    pub fn segment(&self, seg: Segment) -> u16 {
        match seg {
            Segment::ES => self.es,
            Segment::CS => self.cs,
            Segment::SS => self.ss,
            Segment::DS => self.ds,
            Segment::FS => self.fs,
            Segment::GS => self.gs,
        }
    }

    #[inline]
    pub fn set_segment(&mut self, seg: Segment, selector: u16) {
        match seg {
            Segment::ES => self.es = selector,
            Segment::CS => self.cs = selector,
            Segment::SS => self.ss = selector,
            Segment::DS => self.ds = selector,
            Segment::FS => self.fs = selector,
            Segment::GS => self.gs = selector,
        }
    }

    /* ------------------------- Control registers -------------------------- */

    #[inline]
    pub fn cr0(&self) -> u32 {
        self.cr0
    }

    /// Read cr0-cr3 by number. Other numbers are not modelled.
    pub fn control_register(&self, cr: u8) -> Option<u32> {
        match cr {
            0 => Some(self.cr0),
            1 => Some(self.cr1),
            2 => Some(self.cr2),
            3 => Some(self.cr3),
            _ => None,
        }
    }

    /// Write cr0-cr3 by number. Returns false for registers that are not modelled.
    pub fn set_control_register(&mut self, cr: u8, value: u32) -> bool {
        match cr {
            0 => {
                if (self.cr0 ^ value) & CR0_PE != 0 {
                    log::debug!(
                        "cr0.PE {} at {:08X}",
                        if value & CR0_PE != 0 { "set" } else { "cleared" },
                        self.eip
                    );
                }
                self.cr0 = value;
            }
            1 => self.cr1 = value,
            2 => self.cr2 = value,
            3 => self.cr3 = value,
            _ => return false,
        }
        true
    }

    #[inline(always)]
    pub fn protected_mode(&self) -> bool {
        self.cr0 & CR0_PE != 0
    }

    pub fn set_protected_mode(&mut self, state: bool) {
        let cr0 = if state { self.cr0 | CR0_PE } else { self.cr0 & !CR0_PE };
        self.set_control_register(0, cr0);
    }

    #[inline]
    pub fn gdtr(&self) -> DescriptorTableRegister {
        self.gdtr
    }

    #[inline]
    pub fn idtr(&self) -> DescriptorTableRegister {
        self.idtr
    }

    #[inline]
    pub fn ldtr(&self) -> u16 {
        self.ldtr
    }

    #[inline]
    pub fn tr(&self) -> u16 {
        self.tr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let cpu = CpuX86::new(0x1000);
        assert_eq!(cpu.eflags(), 0x2);
        assert_eq!(cpu.eip(), 0);
        assert_eq!(cpu.memory().size(), 0x1000);
        assert!(!cpu.protected_mode());
        for reg in Register32::ALL {
            assert_eq!(cpu.register(reg), 0);
        }
        for seg in Segment::ALL {
            assert_eq!(cpu.segment(seg), 0);
        }
    }

    #[test]
    fn test_sub_register_views() {
        let mut cpu = CpuX86::new(16);
        cpu.set_register(Register32::EAX, 0x1234_5678);
        assert_eq!(cpu.register16(Register16::AX), 0x5678);
        assert_eq!(cpu.register8(Register8::AL), 0x78);
        assert_eq!(cpu.register8(Register8::AH), 0x56);

        cpu.set_register8(Register8::AH, 0xAB);
        assert_eq!(cpu.register(Register32::EAX), 0x1234_AB78);
        cpu.set_register16(Register16::AX, 0xFFFF);
        assert_eq!(cpu.register(Register32::EAX), 0x1234_FFFF);

        cpu.set_register(Register32::EBX, 0xCAFE_0000);
        cpu.set_register8(Register8::BL, 0x11);
        assert_eq!(cpu.register8(Register8::BH), 0x00);
        assert_eq!(cpu.register(Register32::EBX), 0xCAFE_0011);
    }

    #[test]
    fn test_set_entry() {
        let mut cpu = CpuX86::new(16);
        cpu.set_entry(0x10000, &[(Register32::EAX, 0x200_0000), (Register32::EBX, 0x20_0000)]);
        assert_eq!(cpu.eip(), 0x10000);
        assert_eq!(cpu.register(Register32::EAX), 0x200_0000);
        assert_eq!(cpu.register(Register32::EBX), 0x20_0000);
        assert_eq!(cpu.register(Register32::ECX), 0);
    }

    #[test]
    fn test_control_registers() {
        let mut cpu = CpuX86::new(16);
        cpu.set_protected_mode(true);
        assert!(cpu.protected_mode());
        assert_eq!(cpu.cr0(), CR0_PE);
        assert!(cpu.set_control_register(3, 0x1000));
        assert_eq!(cpu.control_register(3), Some(0x1000));
        assert!(!cpu.set_control_register(4, 1));
        assert_eq!(cpu.control_register(4), None);
    }
}
