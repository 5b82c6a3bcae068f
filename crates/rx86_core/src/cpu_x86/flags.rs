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

    cpu_x86::flags.rs

    Implements the EFLAGS register as a bitfield with named flag accessors,
    and the CPU methods that read and write individual flags.

*/

use modular_bitfield::prelude::*;

use crate::cpu_x86::CpuX86;

pub const EFLAGS_RESERVED_ON: u32 = 0x0000_0002;

pub const CPU_FLAG_CARRY: u32 = 0b0000_0000_0000_0001;
pub const CPU_FLAG_PARITY: u32 = 0b0000_0000_0000_0100;
pub const CPU_FLAG_AUX_CARRY: u32 = 0b0000_0000_0001_0000;
pub const CPU_FLAG_ZERO: u32 = 0b0000_0000_0100_0000;
pub const CPU_FLAG_SIGN: u32 = 0b0000_0000_1000_0000;
pub const CPU_FLAG_TRAP: u32 = 0b0000_0001_0000_0000;
pub const CPU_FLAG_INT_ENABLE: u32 = 0b0000_0010_0000_0000;
pub const CPU_FLAG_DIRECTION: u32 = 0b0000_0100_0000_0000;
pub const CPU_FLAG_OVERFLOW: u32 = 0b0000_1000_0000_0000;
pub const CPU_FLAG_IOPL: u32 = 0b0011_0000_0000_0000;
pub const CPU_FLAG_NESTED_TASK: u32 = 0b0100_0000_0000_0000;
pub const CPU_FLAG_RESUME: u32 = 1 << 16;
pub const CPU_FLAG_VM: u32 = 1 << 17;
pub const CPU_FLAG_ALIGN_CHECK: u32 = 1 << 18;
pub const CPU_FLAG_VIF: u32 = 1 << 19;
pub const CPU_FLAG_VIP: u32 = 1 << 20;
pub const CPU_FLAG_ID: u32 = 1 << 21;

/// EFLAGS. Reserved bits are kept as skipped fields so that a value written as a u32
/// reads back unchanged.
#[bitfield]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct Eflags {
    pub cf: bool,
    #[skip]
    __: B1,
    pub pf: bool,
    #[skip]
    __: B1,
    pub af: bool,
    #[skip]
    __: B1,
    pub zf: bool,
    pub sf: bool,
    pub tf: bool,
    pub intf: bool,
    pub df: bool,
    pub of: bool,
    pub iopl: B2,
    pub nt: bool,
    #[skip]
    __: B1,
    pub rf: bool,
    pub vm: bool,
    pub ac: bool,
    pub vif: bool,
    pub vip: bool,
    pub id: bool,
    #[skip]
    __: B10,
}

impl Default for Eflags {
    fn default() -> Self {
        Eflags::from(EFLAGS_RESERVED_ON)
    }
}

/// Single-bit flags addressable by name.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flag {
    Carry,
    Parity,
    AuxCarry,
    Zero,
    Sign,
    Trap,
    Interrupt,
    Direction,
    Overflow,
    NestedTask,
    Resume,
    Virtual8086,
    AlignmentCheck,
    VirtualInterrupt,
    VirtualInterruptPending,
    Id,
}

impl Flag {
    /// The flag's mask within EFLAGS.
    pub const fn mask(self) -> u32 {
        match self {
            Flag::Carry => CPU_FLAG_CARRY,
            Flag::Parity => CPU_FLAG_PARITY,
            Flag::AuxCarry => CPU_FLAG_AUX_CARRY,
            Flag::Zero => CPU_FLAG_ZERO,
            Flag::Sign => CPU_FLAG_SIGN,
            Flag::Trap => CPU_FLAG_TRAP,
            Flag::Interrupt => CPU_FLAG_INT_ENABLE,
            Flag::Direction => CPU_FLAG_DIRECTION,
            Flag::Overflow => CPU_FLAG_OVERFLOW,
            Flag::NestedTask => CPU_FLAG_NESTED_TASK,
            Flag::Resume => CPU_FLAG_RESUME,
            Flag::Virtual8086 => CPU_FLAG_VM,
            Flag::AlignmentCheck => CPU_FLAG_ALIGN_CHECK,
            Flag::VirtualInterrupt => CPU_FLAG_VIF,
            Flag::VirtualInterruptPending => CPU_FLAG_VIP,
            Flag::Id => CPU_FLAG_ID,
        }
    }
}

impl Eflags {
    #[inline]
    pub fn get(&self, flag: Flag) -> bool {
        u32::from(*self) & flag.mask() != 0
    }

    #[inline]
    pub fn set(&mut self, flag: Flag, state: bool) {
        let bits = u32::from(*self);
        *self = Eflags::from(if state { bits | flag.mask() } else { bits & !flag.mask() });
    }

    /// Render as the conventional flag letter string, uppercase when set.
    pub fn to_flag_string(&self) -> String {
        let letters = [
            (Flag::Overflow, 'o'),
            (Flag::Direction, 'd'),
            (Flag::Interrupt, 'i'),
            (Flag::Trap, 't'),
            (Flag::Sign, 's'),
            (Flag::Zero, 'z'),
            (Flag::AuxCarry, 'a'),
            (Flag::Parity, 'p'),
            (Flag::Carry, 'c'),
        ];
        letters
            .iter()
            .map(|&(flag, c)| if self.get(flag) { c.to_ascii_uppercase() } else { c })
            .collect()
    }
}

impl CpuX86 {
    #[inline(always)]
    pub fn set_flag(&mut self, flag: Flag) {
        self.eflags.set(flag, true);
    }

    #[inline(always)]
    pub fn clear_flag(&mut self, flag: Flag) {
        self.eflags.set(flag, false);
    }

    #[inline(always)]
    pub fn set_flag_state(&mut self, flag: Flag, state: bool) {
        self.eflags.set(flag, state);
    }

    #[inline(always)]
    pub fn get_flag(&self, flag: Flag) -> bool {
        self.eflags.get(flag)
    }

    #[inline]
    pub fn iopl(&self) -> u8 {
        self.eflags.iopl()
    }

    #[inline]
    pub fn flags(&self) -> &Eflags {
        &self.eflags
    }

    #[inline]
    pub fn eflags(&self) -> u32 {
        u32::from(self.eflags)
    }

    #[inline]
    pub fn set_eflags(&mut self, eflags: u32) {
        self.eflags = Eflags::from(eflags);
    }
}
