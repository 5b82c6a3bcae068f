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

    cpu_x86::display.rs

    Human-readable machine state dump for debugging.

*/

use crate::{
    cpu_common::{Segment, REGISTER32_STR},
    cpu_x86::CpuX86,
};

impl CpuX86 {
    /// Registers, flags, segment selectors with their bases, control and descriptor table
    /// registers, and the prefix/ModRM/SIB state of the last decoded instruction.
    pub fn dump_state(&self) -> String {
        let mut dump_str = String::new();

        dump_str.push_str(&format!(
            "EIP: {:08X}  EFLAGS: {:08X} [{}]  instructions: {}\n",
            self.eip,
            self.eflags(),
            self.eflags.to_flag_string(),
            self.instruction_count
        ));

        for (row, names) in REGISTER32_STR.chunks(4).enumerate() {
            let mut line = String::new();
            for (col, name) in names.iter().enumerate() {
                line.push_str(&format!("{}: {:08X}  ", name.to_uppercase(), self.regs[row * 4 + col]));
            }
            dump_str.push_str(line.trim_end());
            dump_str.push('\n');
        }

        let mut line = String::new();
        for seg in Segment::ALL {
            let base = match self.segment_base(seg) {
                Ok(base) => format!("{:08X}", base),
                Err(_) => "????????".to_string(),
            };
            line.push_str(&format!("{}: {:04X} ({})  ", seg.to_string().to_uppercase(), self.segment(seg), base));
        }
        dump_str.push_str(line.trim_end());
        dump_str.push('\n');

        dump_str.push_str(&format!(
            "CR0: {:08X}  CR1: {:08X}  CR2: {:08X}  CR3: {:08X}\n",
            self.cr0, self.cr1, self.cr2, self.cr3
        ));
        dump_str.push_str(&format!(
            "GDTR: {:08X}:{:04X}  IDTR: {:08X}:{:04X}  LDTR: {:04X}  TR: {:04X}\n",
            self.gdtr.base, self.gdtr.limit, self.idtr.base, self.idtr.limit, self.ldtr, self.tr
        ));

        let state = &self.decode_state;
        dump_str.push_str(&format!("prefixes: {:04X}", state.prefixes));
        if let Some(seg) = state.segment_override {
            dump_str.push_str(&format!(" ({} override)", seg));
        }
        match state.modrm {
            Some(modrm) => dump_str.push_str(&format!(
                "  modrm: {:02X} mod={:02b} reg={:03b} rm={:03b} {}",
                modrm.byte(),
                modrm.mode(),
                modrm.reg(),
                modrm.rm(),
                modrm.to_string_for_size(state.address_size(self.protected_mode()))
            )),
            None => dump_str.push_str("  modrm: --"),
        }
        match (state.sib, state.modrm) {
            (Some(sib), Some(modrm)) => dump_str.push_str(&format!(
                "  sib: {:02X} ss={:02b} index={:03b} base={:03b} {}",
                sib.byte(),
                sib.scale(),
                sib.index(),
                sib.base(),
                sib.to_string_for_mod(modrm.mode())
            )),
            _ => dump_str.push_str("  sib: --"),
        }
        dump_str.push('\n');

        dump_str
    }
}
