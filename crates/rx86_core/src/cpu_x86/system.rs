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

    cpu_x86::system.rs

    Implements system instructions and segment descriptor lookup.

    Descriptor tables are loaded and can be inspected, but segment bases are
    never applied to effective addresses.

*/

use modular_bitfield::prelude::*;

use crate::{
    cpu_common::{error::CpuError, Mnemonic, OperandSize, Segment},
    cpu_x86::{flags::Flag, CpuX86, DescriptorTableRegister},
};

/// An 8-byte GDT/LDT entry.
#[bitfield]
#[repr(u64)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub limit_low: B16,
    pub base_low: B16,
    pub base_mid: B8,
    pub accessed: bool,
    pub seg_type: B3,
    /// Code/data (set) or system (clear) descriptor.
    pub s: bool,
    pub dpl: B2,
    pub present: bool,
    pub limit_high: B4,
    pub avl: bool,
    #[skip]
    __: B1,
    pub db: bool,
    pub granularity: bool,
    pub base_high: B8,
}

impl SegmentDescriptor {
    pub fn base(&self) -> u32 {
        self.base_low() as u32 | (self.base_mid() as u32) << 16 | (self.base_high() as u32) << 24
    }

    /// Segment limit in bytes. With the granularity bit set the 20-bit limit counts
    /// 4K pages.
    pub fn limit(&self) -> u32 {
        let raw = self.limit_low() as u32 | (self.limit_high() as u32) << 16;
        if self.granularity() {
            (raw << 12) | 0xFFF
        }
        else {
            raw
        }
    }
}

impl CpuX86 {
    fn load_descriptor_table(&mut self, addr: u32, size: OperandSize) -> Result<DescriptorTableRegister, CpuError> {
        let limit = self.load_word_at(addr)?;
        let mut base = self.load_dword_at(addr.wrapping_add(2))?;
        if size == OperandSize::Operand16 {
            base &= 0x00FF_FFFF;
        }
        Ok(DescriptorTableRegister { limit, base })
    }

    /// Load gdtr from the 6-byte pseudo-descriptor at `addr`. The base keeps only
    /// 24 bits with a 16-bit operand size.
    pub fn lgdt(&mut self, addr: u32, size: OperandSize) -> Result<(), CpuError> {
        self.gdtr = self.load_descriptor_table(addr, size)?;
        log::debug!("lgdt: base {:08X} limit {:04X}", self.gdtr.base, self.gdtr.limit);
        Ok(())
    }

    pub fn lidt(&mut self, addr: u32, size: OperandSize) -> Result<(), CpuError> {
        self.idtr = self.load_descriptor_table(addr, size)?;
        log::debug!("lidt: base {:08X} limit {:04X}", self.idtr.base, self.idtr.limit);
        Ok(())
    }

    /// IF may be written in protected mode outside virtual-8086 mode, or in virtual-8086
    /// mode with IOPL 3. No other context is modelled.
    fn interrupt_flag_writable(&self) -> bool {
        let vm = self.get_flag(Flag::Virtual8086);
        (self.protected_mode() && !vm) || (vm && self.iopl() == 3)
    }

    pub fn cli(&mut self) -> Result<(), CpuError> {
        if !self.interrupt_flag_writable() {
            return Err(CpuError::UnsupportedPrivilegeContext {
                mnemonic: Mnemonic::CLI,
                eip: self.eip,
            });
        }
        self.clear_flag(Flag::Interrupt);
        Ok(())
    }

    pub fn sti(&mut self) -> Result<(), CpuError> {
        if !self.interrupt_flag_writable() {
            return Err(CpuError::UnsupportedPrivilegeContext {
                mnemonic: Mnemonic::STI,
                eip: self.eip,
            });
        }
        self.set_flag(Flag::Interrupt);
        Ok(())
    }

    /// Read a descriptor from the GDT. Returns None for the null selector, for LDT
    /// selectors, and for indices past the gdtr limit.
    pub fn read_descriptor(&self, selector: u16) -> Result<Option<SegmentDescriptor>, CpuError> {
        let index = (selector >> 3) as u32;
        if index == 0 || selector & 0x04 != 0 {
            return Ok(None);
        }
        let offset = index * 8;
        if offset + 7 > self.gdtr.limit as u32 {
            return Ok(None);
        }
        let raw = self.mem.read_u64(self.gdtr.base.wrapping_add(offset))?;
        Ok(Some(SegmentDescriptor::from(raw)))
    }

    /// The base address a segment register would select: selector * 16 in real mode,
    /// the descriptor base in protected mode (0 if the selector resolves to nothing).
    pub fn segment_base(&self, seg: Segment) -> Result<u32, CpuError> {
        let selector = self.segment(seg);
        if !self.protected_mode() {
            return Ok((selector as u32) << 4);
        }
        Ok(self.read_descriptor(selector)?.map(|d| d.base()).unwrap_or(0))
    }
}
