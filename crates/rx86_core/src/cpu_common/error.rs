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

    cpu_common::error.rs

    This module defines the error type returned when an instruction cannot
    be decoded or executed. Any of these stops a run.

*/

use crate::{cpu_common::Mnemonic, memerror::MemError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CpuError {
    #[error("A memory access at address {address:08X} fell outside memory of size {size:08X}")]
    MemoryFault { address: u32, size: usize },
    /// Two-byte opcodes are reported as 0x0Fxx.
    #[error("An unsupported opcode was encountered: {} at address: {eip:08X}", opcode_str(.opcode))]
    UnsupportedOpcode { opcode: u16, eip: u32 },
    #[error("{mnemonic} at address: {eip:08X} was executed in an unsupported privilege context")]
    UnsupportedPrivilegeContext { mnemonic: Mnemonic, eip: u32 },
    #[error("Divide by zero at address: {eip:08X}")]
    DivideError { eip: u32 },
    #[error("Error reading program image: {0}")]
    IoError(#[from] std::io::Error),
}

fn opcode_str(opcode: &u16) -> String {
    if *opcode > 0xFF {
        format!("{:02X} {:02X}", opcode >> 8, opcode & 0xFF)
    }
    else {
        format!("{:02X}", opcode)
    }
}

impl CpuError {
    /// Attribute an execution fault to the instruction starting at `address`. Variants
    /// without an address are returned unchanged.
    pub fn at_instruction(self, address: u32) -> Self {
        match self {
            CpuError::UnsupportedOpcode { opcode, .. } => CpuError::UnsupportedOpcode { opcode, eip: address },
            CpuError::UnsupportedPrivilegeContext { mnemonic, .. } => {
                CpuError::UnsupportedPrivilegeContext { mnemonic, eip: address }
            }
            CpuError::DivideError { .. } => CpuError::DivideError { eip: address },
            err => err,
        }
    }
}

impl From<MemError> for CpuError {
    fn from(err: MemError) -> Self {
        match err {
            MemError::OutOfBounds { address, size, .. } => CpuError::MemoryFault { address, size },
        }
    }
}
