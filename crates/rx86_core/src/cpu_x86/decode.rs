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

    cpu_x86::decode.rs

    Instruction decoding.

    decode() consumes prefixes, selects the one- or two-byte opcode table,
    resolves group sub-opcodes by the ModRM reg field, and then resolves each
    operand template into a concrete operand. All bytes are read through the
    fetch layer, so on return eip points past the instruction.

    Each table entry carries the handler that executes it. Entries marked
    Invalid have no handler and fault at decode time.

*/

use crate::{
    cpu_common::{
        error::CpuError,
        instruction::{Operand, OperandType},
        Instruction,
        Mnemonic,
        OperandSize,
        Segment,
        OPCODE_PREFIX_ADDRESS_SIZE,
        OPCODE_PREFIX_CS_OVERRIDE,
        OPCODE_PREFIX_DS_OVERRIDE,
        OPCODE_PREFIX_ES_OVERRIDE,
        OPCODE_PREFIX_FS_OVERRIDE,
        OPCODE_PREFIX_GS_OVERRIDE,
        OPCODE_PREFIX_LOCK,
        OPCODE_PREFIX_OPERAND_SIZE,
        OPCODE_PREFIX_REP,
        OPCODE_PREFIX_REPNE,
        OPCODE_PREFIX_REX,
        OPCODE_PREFIX_SS_OVERRIDE,
        OPCODE_PREFIX_VEX2,
        OPCODE_PREFIX_VEX3,
    },
    cpu_x86::{execute::ExecutionResult, modrm::ModRmByte, sib::SibByte, CpuX86},
};

/// Transient per-instruction decode state: prefixes seen and the addressing bytes
/// consumed. Reset before every instruction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeContext {
    pub prefixes: u32,
    /// The last segment override prefix seen, if any. Every override also sets its own
    /// bit in `prefixes`.
    pub segment_override: Option<Segment>,
    pub rex: Option<u8>,
    pub vex: Option<u32>,
    pub modrm: Option<ModRmByte>,
    pub sib: Option<SibByte>,
}

impl DecodeContext {
    /// 16-bit when the PE bit and the 0x66 prefix agree, 32-bit otherwise.
    #[inline]
    pub fn operand_size(&self, protected_mode: bool) -> OperandSize {
        if protected_mode == (self.prefixes & OPCODE_PREFIX_OPERAND_SIZE != 0) {
            OperandSize::Operand16
        }
        else {
            OperandSize::Operand32
        }
    }

    /// Same rule as operand_size(), toggled by 0x67.
    #[inline]
    pub fn address_size(&self, protected_mode: bool) -> OperandSize {
        if protected_mode == (self.prefixes & OPCODE_PREFIX_ADDRESS_SIZE != 0) {
            OperandSize::Operand16
        }
        else {
            OperandSize::Operand32
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandTemplate {
    NoOperand,
    ModRM8,
    ModRM16,
    ModRMv,
    /// Memory-only r/m. A register form is an invalid encoding.
    ModRMMem,
    /// r/m always names a 32-bit register, whatever mod says.
    ModRMReg32,
    Register8,
    Registerv,
    ControlRegister,
    Immediate8,
    Immediate8SignExtended,
    Immediatev,
    Immediate32,
    Relative8,
    Relativev,
    FixedRegister8(u8),
    FixedRegisterv(u8),
    FixedRegister32(u8),
    One,
}

use OperandTemplate as Ot;

impl OperandTemplate {
    /// Whether this operand needs the effective address of the ModRM byte.
    #[inline]
    pub const fn uses_rm_address(&self) -> bool {
        matches!(self, Ot::ModRM8 | Ot::ModRM16 | Ot::ModRMv | Ot::ModRMMem)
    }

    #[inline(always)]
    pub fn resolve_operand(
        &self,
        cpu: &mut CpuX86,
        modrm: ModRmByte,
        ea: u32,
        operand_size: OperandSize,
    ) -> Result<OperandType, CpuError> {
        let operand = match *self {
            Ot::NoOperand => OperandType::NoOperand,
            Ot::ModRM8 => OperandType::Location(modrm.rm_operand(ea, OperandSize::Operand8)),
            Ot::ModRM16 => OperandType::Location(modrm.rm_operand(ea, OperandSize::Operand16)),
            Ot::ModRMv => OperandType::Location(modrm.rm_operand(ea, operand_size)),
            Ot::ModRMMem => OperandType::Location(Operand::Mem(ea, operand_size)),
            Ot::ModRMReg32 => OperandType::Location(Operand::Reg(modrm.rm(), OperandSize::Operand32)),
            Ot::Register8 => OperandType::Location(Operand::Reg(modrm.reg(), OperandSize::Operand8)),
            Ot::Registerv => OperandType::Location(Operand::Reg(modrm.reg(), operand_size)),
            Ot::ControlRegister => OperandType::ControlRegister(modrm.reg()),
            Ot::Immediate8 => OperandType::Immediate(cpu.fetch_u8()? as u32),
            Ot::Immediate8SignExtended => OperandType::Immediate(cpu.fetch_i8()? as i32 as u32),
            Ot::Immediatev => match operand_size {
                OperandSize::Operand32 => OperandType::Immediate(cpu.fetch_u32()?),
                _ => OperandType::Immediate(cpu.fetch_u16()? as u32),
            },
            Ot::Immediate32 => OperandType::Immediate(cpu.fetch_u32()?),
            Ot::Relative8 => OperandType::Relative(cpu.fetch_i8()? as i32),
            Ot::Relativev => match operand_size {
                OperandSize::Operand32 => OperandType::Relative(cpu.fetch_u32()? as i32),
                _ => OperandType::Relative(cpu.fetch_u16()? as i16 as i32),
            },
            Ot::FixedRegister8(r) => OperandType::Location(Operand::Reg(r, OperandSize::Operand8)),
            Ot::FixedRegisterv(r) => OperandType::Location(Operand::Reg(r, operand_size)),
            Ot::FixedRegister32(r) => OperandType::Location(Operand::Reg(r, OperandSize::Operand32)),
            Ot::One => OperandType::Immediate(1),
        };
        Ok(operand)
    }
}

pub type OpHandler = fn(&mut CpuX86, &Instruction) -> Result<ExecutionResult, CpuError>;

#[derive(Copy, Clone)]
pub struct InstTemplate {
    /// Non-zero for group opcodes: the sub-opcode is selected by ModRM reg.
    pub grp: u8,
    pub modrm: bool,
    pub handler: OpHandler,
    pub mnemonic: Mnemonic,
    pub operand1: OperandTemplate,
    pub operand2: OperandTemplate,
}

impl InstTemplate {
    #[inline]
    pub const fn is_valid(&self) -> bool {
        !matches!(self.mnemonic, Mnemonic::Invalid | Mnemonic::Prefix)
    }
}

macro_rules! inst {
    ($grp:literal, $modrm:literal, $handler:ident, $m:ident, $o1:expr, $o2:expr) => {
        InstTemplate {
            grp: $grp,
            modrm: $modrm,
            handler: CpuX86::$handler,
            mnemonic: Mnemonic::$m,
            operand1: $o1,
            operand2: $o2,
        }
    };
}

pub const GROUP_BASE: usize = 256;

#[inline(always)]
const fn group_index(grp: u8, reg: u8) -> usize {
    GROUP_BASE + ((grp as usize - 1) * 8) + reg as usize
}

#[rustfmt::skip]
pub static DECODE: [InstTemplate; 352] = [
    inst!( 0, true , op_add,     ADD,     Ot::ModRM8,                      Ot::Register8),
    inst!( 0, true , op_add,     ADD,     Ot::ModRMv,                      Ot::Registerv),
    inst!( 0, true , op_add,     ADD,     Ot::Register8,                   Ot::ModRM8),
    inst!( 0, true , op_add,     ADD,     Ot::Registerv,                   Ot::ModRMv),
    inst!( 0, false, op_add,     ADD,     Ot::FixedRegister8(0),           Ot::Immediate8),
    inst!( 0, false, op_add,     ADD,     Ot::FixedRegisterv(0),           Ot::Immediatev),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, true , op_or,      OR,      Ot::ModRM8,                      Ot::Register8),
    inst!( 0, true , op_or,      OR,      Ot::ModRMv,                      Ot::Registerv),
    inst!( 0, true , op_or,      OR,      Ot::Register8,                   Ot::ModRM8),
    inst!( 0, true , op_or,      OR,      Ot::Registerv,                   Ot::ModRMv),
    inst!( 0, false, op_or,      OR,      Ot::FixedRegister8(0),           Ot::Immediate8),
    inst!( 0, false, op_or,      OR,      Ot::FixedRegisterv(0),           Ot::Immediatev),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, true , op_adc,     ADC,     Ot::ModRM8,                      Ot::Register8),
    inst!( 0, true , op_adc,     ADC,     Ot::ModRMv,                      Ot::Registerv),
    inst!( 0, true , op_adc,     ADC,     Ot::Register8,                   Ot::ModRM8),
    inst!( 0, true , op_adc,     ADC,     Ot::Registerv,                   Ot::ModRMv),
    inst!( 0, false, op_adc,     ADC,     Ot::FixedRegister8(0),           Ot::Immediate8),
    inst!( 0, false, op_adc,     ADC,     Ot::FixedRegisterv(0),           Ot::Immediatev),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, true , op_sbb,     SBB,     Ot::ModRM8,                      Ot::Register8),
    inst!( 0, true , op_sbb,     SBB,     Ot::ModRMv,                      Ot::Registerv),
    inst!( 0, true , op_sbb,     SBB,     Ot::Register8,                   Ot::ModRM8),
    inst!( 0, true , op_sbb,     SBB,     Ot::Registerv,                   Ot::ModRMv),
    inst!( 0, false, op_sbb,     SBB,     Ot::FixedRegister8(0),           Ot::Immediate8),
    inst!( 0, false, op_sbb,     SBB,     Ot::FixedRegisterv(0),           Ot::Immediatev),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, true , op_and,     AND,     Ot::ModRM8,                      Ot::Register8),
    inst!( 0, true , op_and,     AND,     Ot::ModRMv,                      Ot::Registerv),
    inst!( 0, true , op_and,     AND,     Ot::Register8,                   Ot::ModRM8),
    inst!( 0, true , op_and,     AND,     Ot::Registerv,                   Ot::ModRMv),
    inst!( 0, false, op_and,     AND,     Ot::FixedRegister8(0),           Ot::Immediate8),
    inst!( 0, false, op_and,     AND,     Ot::FixedRegisterv(0),           Ot::Immediatev),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, true , op_sub,     SUB,     Ot::ModRM8,                      Ot::Register8),
    inst!( 0, true , op_sub,     SUB,     Ot::ModRMv,                      Ot::Registerv),
    inst!( 0, true , op_sub,     SUB,     Ot::Register8,                   Ot::ModRM8),
    inst!( 0, true , op_sub,     SUB,     Ot::Registerv,                   Ot::ModRMv),
    inst!( 0, false, op_sub,     SUB,     Ot::FixedRegister8(0),           Ot::Immediate8),
    inst!( 0, false, op_sub,     SUB,     Ot::FixedRegisterv(0),           Ot::Immediatev),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, true , op_xor,     XOR,     Ot::ModRM8,                      Ot::Register8),
    inst!( 0, true , op_xor,     XOR,     Ot::ModRMv,                      Ot::Registerv),
    inst!( 0, true , op_xor,     XOR,     Ot::Register8,                   Ot::ModRM8),
    inst!( 0, true , op_xor,     XOR,     Ot::Registerv,                   Ot::ModRMv),
    inst!( 0, false, op_xor,     XOR,     Ot::FixedRegister8(0),           Ot::Immediate8),
    inst!( 0, false, op_xor,     XOR,     Ot::FixedRegisterv(0),           Ot::Immediatev),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, true , op_cmp,     CMP,     Ot::ModRM8,                      Ot::Register8),
    inst!( 0, true , op_cmp,     CMP,     Ot::ModRMv,                      Ot::Registerv),
    inst!( 0, true , op_cmp,     CMP,     Ot::Register8,                   Ot::ModRM8),
    inst!( 0, true , op_cmp,     CMP,     Ot::Registerv,                   Ot::ModRMv),
    inst!( 0, false, op_cmp,     CMP,     Ot::FixedRegister8(0),           Ot::Immediate8),
    inst!( 0, false, op_cmp,     CMP,     Ot::FixedRegisterv(0),           Ot::Immediatev),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_push,    PUSH,    Ot::FixedRegisterv(0),           Ot::NoOperand),
    inst!( 0, false, op_push,    PUSH,    Ot::FixedRegisterv(1),           Ot::NoOperand),
    inst!( 0, false, op_push,    PUSH,    Ot::FixedRegisterv(2),           Ot::NoOperand),
    inst!( 0, false, op_push,    PUSH,    Ot::FixedRegisterv(3),           Ot::NoOperand),
    inst!( 0, false, op_push,    PUSH,    Ot::FixedRegisterv(4),           Ot::NoOperand),
    inst!( 0, false, op_push,    PUSH,    Ot::FixedRegisterv(5),           Ot::NoOperand),
    inst!( 0, false, op_push,    PUSH,    Ot::FixedRegisterv(6),           Ot::NoOperand),
    inst!( 0, false, op_push,    PUSH,    Ot::FixedRegisterv(7),           Ot::NoOperand),
    inst!( 0, false, op_pop,     POP,     Ot::FixedRegisterv(0),           Ot::NoOperand),
    inst!( 0, false, op_pop,     POP,     Ot::FixedRegisterv(1),           Ot::NoOperand),
    inst!( 0, false, op_pop,     POP,     Ot::FixedRegisterv(2),           Ot::NoOperand),
    inst!( 0, false, op_pop,     POP,     Ot::FixedRegisterv(3),           Ot::NoOperand),
    inst!( 0, false, op_pop,     POP,     Ot::FixedRegisterv(4),           Ot::NoOperand),
    inst!( 0, false, op_pop,     POP,     Ot::FixedRegisterv(5),           Ot::NoOperand),
    inst!( 0, false, op_pop,     POP,     Ot::FixedRegisterv(6),           Ot::NoOperand),
    inst!( 0, false, op_pop,     POP,     Ot::FixedRegisterv(7),           Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_push,    PUSH,    Ot::Immediatev,                  Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_push,    PUSH,    Ot::Immediate8SignExtended,      Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JO,      Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JNO,     Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JB,      Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JNB,     Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JZ,      Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JNZ,     Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JBE,     Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JNBE,    Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JS,      Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JNS,     Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JP,      Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JNP,     Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JL,      Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JNL,     Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JLE,     Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_jcc,     JNLE,    Ot::Relative8,                   Ot::NoOperand),
    inst!( 1, true , op_invalid, Group,   Ot::NoOperand,                   Ot::NoOperand),
    inst!( 2, true , op_invalid, Group,   Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 3, true , op_invalid, Group,   Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, true , op_test,    TEST,    Ot::ModRM8,                      Ot::Register8),
    inst!( 0, true , op_test,    TEST,    Ot::ModRMv,                      Ot::Registerv),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, true , op_mov,     MOV,     Ot::ModRM8,                      Ot::Register8),
    inst!( 0, true , op_mov,     MOV,     Ot::ModRMv,                      Ot::Registerv),
    inst!( 0, true , op_mov,     MOV,     Ot::Register8,                   Ot::ModRM8),
    inst!( 0, true , op_mov,     MOV,     Ot::Registerv,                   Ot::ModRMv),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, true , op_lea,     LEA,     Ot::Registerv,                   Ot::ModRMMem),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_nop,     NOP,     Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_test,    TEST,    Ot::FixedRegister8(0),           Ot::Immediate8),
    inst!( 0, false, op_test,    TEST,    Ot::FixedRegisterv(0),           Ot::Immediatev),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister8(0),           Ot::Immediate8),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister8(1),           Ot::Immediate8),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister8(2),           Ot::Immediate8),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister8(3),           Ot::Immediate8),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister8(4),           Ot::Immediate8),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister8(5),           Ot::Immediate8),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister8(6),           Ot::Immediate8),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister8(7),           Ot::Immediate8),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister32(0),          Ot::Immediate32),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister32(1),          Ot::Immediate32),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister32(2),          Ot::Immediate32),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister32(3),          Ot::Immediate32),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister32(4),          Ot::Immediate32),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister32(5),          Ot::Immediate32),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister32(6),          Ot::Immediate32),
    inst!( 0, false, op_mov,     MOV,     Ot::FixedRegister32(7),          Ot::Immediate32),
    inst!( 4, true , op_invalid, Group,   Ot::NoOperand,                   Ot::NoOperand),
    inst!( 5, true , op_invalid, Group,   Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_ret,     RET,     Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!(10, true , op_invalid, Group,   Ot::NoOperand,                   Ot::NoOperand),
    inst!(11, true , op_invalid, Group,   Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 6, true , op_invalid, Group,   Ot::NoOperand,                   Ot::NoOperand),
    inst!( 7, true , op_invalid, Group,   Ot::NoOperand,                   Ot::NoOperand),
    inst!( 8, true , op_invalid, Group,   Ot::NoOperand,                   Ot::NoOperand),
    inst!( 9, true , op_invalid, Group,   Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_aam,     AAM,     Ot::Immediate8,                  Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_call,    CALL,    Ot::Relativev,                   Ot::NoOperand),
    inst!( 0, false, op_jmp,     JMP,     Ot::Relativev,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_jmp,     JMP,     Ot::Relative8,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Prefix,  Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_hlt,     HLT,     Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_clc,     CLC,     Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_stc,     STC,     Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_cli,     CLI,     Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_sti,     STI,     Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_cld,     CLD,     Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_std,     STD,     Ot::NoOperand,                   Ot::NoOperand),
    inst!(12, true , op_invalid, Group,   Ot::NoOperand,                   Ot::NoOperand),
    inst!( 0, false, op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    // Group 1
    inst!( 1, true , op_add,     ADD,     Ot::ModRM8,                      Ot::Immediate8),
    inst!( 1, true , op_or,      OR,      Ot::ModRM8,                      Ot::Immediate8),
    inst!( 1, true , op_adc,     ADC,     Ot::ModRM8,                      Ot::Immediate8),
    inst!( 1, true , op_sbb,     SBB,     Ot::ModRM8,                      Ot::Immediate8),
    inst!( 1, true , op_and,     AND,     Ot::ModRM8,                      Ot::Immediate8),
    inst!( 1, true , op_sub,     SUB,     Ot::ModRM8,                      Ot::Immediate8),
    inst!( 1, true , op_xor,     XOR,     Ot::ModRM8,                      Ot::Immediate8),
    inst!( 1, true , op_cmp,     CMP,     Ot::ModRM8,                      Ot::Immediate8),
    // Group 2
    inst!( 2, true , op_add,     ADD,     Ot::ModRMv,                      Ot::Immediatev),
    inst!( 2, true , op_or,      OR,      Ot::ModRMv,                      Ot::Immediatev),
    inst!( 2, true , op_adc,     ADC,     Ot::ModRMv,                      Ot::Immediatev),
    inst!( 2, true , op_sbb,     SBB,     Ot::ModRMv,                      Ot::Immediatev),
    inst!( 2, true , op_and,     AND,     Ot::ModRMv,                      Ot::Immediatev),
    inst!( 2, true , op_sub,     SUB,     Ot::ModRMv,                      Ot::Immediatev),
    inst!( 2, true , op_xor,     XOR,     Ot::ModRMv,                      Ot::Immediatev),
    inst!( 2, true , op_cmp,     CMP,     Ot::ModRMv,                      Ot::Immediatev),
    // Group 3
    inst!( 3, true , op_add,     ADD,     Ot::ModRMv,                      Ot::Immediate8SignExtended),
    inst!( 3, true , op_or,      OR,      Ot::ModRMv,                      Ot::Immediate8SignExtended),
    inst!( 3, true , op_adc,     ADC,     Ot::ModRMv,                      Ot::Immediate8SignExtended),
    inst!( 3, true , op_sbb,     SBB,     Ot::ModRMv,                      Ot::Immediate8SignExtended),
    inst!( 3, true , op_and,     AND,     Ot::ModRMv,                      Ot::Immediate8SignExtended),
    inst!( 3, true , op_sub,     SUB,     Ot::ModRMv,                      Ot::Immediate8SignExtended),
    inst!( 3, true , op_xor,     XOR,     Ot::ModRMv,                      Ot::Immediate8SignExtended),
    inst!( 3, true , op_cmp,     CMP,     Ot::ModRMv,                      Ot::Immediate8SignExtended),
    // Group 4
    inst!( 4, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 4, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 4, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 4, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 4, true , op_shl,     SHL,     Ot::ModRM8,                      Ot::Immediate8),
    inst!( 4, true , op_shr,     SHR,     Ot::ModRM8,                      Ot::Immediate8),
    inst!( 4, true , op_sal,     SAL,     Ot::ModRM8,                      Ot::Immediate8),
    inst!( 4, true , op_sar,     SAR,     Ot::ModRM8,                      Ot::Immediate8),
    // Group 5
    inst!( 5, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 5, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 5, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 5, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 5, true , op_shl,     SHL,     Ot::ModRMv,                      Ot::Immediate8),
    inst!( 5, true , op_shr,     SHR,     Ot::ModRMv,                      Ot::Immediate8),
    inst!( 5, true , op_sal,     SAL,     Ot::ModRMv,                      Ot::Immediate8),
    inst!( 5, true , op_sar,     SAR,     Ot::ModRMv,                      Ot::Immediate8),
    // Group 6
    inst!( 6, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 6, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 6, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 6, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 6, true , op_shl,     SHL,     Ot::ModRM8,                      Ot::One),
    inst!( 6, true , op_shr,     SHR,     Ot::ModRM8,                      Ot::One),
    inst!( 6, true , op_sal,     SAL,     Ot::ModRM8,                      Ot::One),
    inst!( 6, true , op_sar,     SAR,     Ot::ModRM8,                      Ot::One),
    // Group 7
    inst!( 7, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 7, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 7, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 7, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 7, true , op_shl,     SHL,     Ot::ModRMv,                      Ot::One),
    inst!( 7, true , op_shr,     SHR,     Ot::ModRMv,                      Ot::One),
    inst!( 7, true , op_sal,     SAL,     Ot::ModRMv,                      Ot::One),
    inst!( 7, true , op_sar,     SAR,     Ot::ModRMv,                      Ot::One),
    // Group 8
    inst!( 8, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 8, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 8, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 8, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 8, true , op_shl,     SHL,     Ot::ModRM8,                      Ot::FixedRegister8(1)),
    inst!( 8, true , op_shr,     SHR,     Ot::ModRM8,                      Ot::FixedRegister8(1)),
    inst!( 8, true , op_sal,     SAL,     Ot::ModRM8,                      Ot::FixedRegister8(1)),
    inst!( 8, true , op_sar,     SAR,     Ot::ModRM8,                      Ot::FixedRegister8(1)),
    // Group 9
    inst!( 9, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 9, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 9, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 9, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!( 9, true , op_shl,     SHL,     Ot::ModRMv,                      Ot::FixedRegister8(1)),
    inst!( 9, true , op_shr,     SHR,     Ot::ModRMv,                      Ot::FixedRegister8(1)),
    inst!( 9, true , op_sal,     SAL,     Ot::ModRMv,                      Ot::FixedRegister8(1)),
    inst!( 9, true , op_sar,     SAR,     Ot::ModRMv,                      Ot::FixedRegister8(1)),
    // Group 10
    inst!(10, true , op_mov,     MOV,     Ot::ModRM8,                      Ot::Immediate8),
    inst!(10, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(10, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(10, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(10, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(10, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(10, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(10, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    // Group 11
    inst!(11, true , op_mov,     MOV,     Ot::ModRMv,                      Ot::Immediatev),
    inst!(11, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(11, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(11, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(11, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(11, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(11, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(11, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    // Group 12
    inst!(12, true , op_inc,     INC,     Ot::ModRM8,                      Ot::NoOperand),
    inst!(12, true , op_dec,     DEC,     Ot::ModRM8,                      Ot::NoOperand),
    inst!(12, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(12, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(12, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(12, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(12, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
    inst!(12, true , op_invalid, Invalid, Ot::NoOperand,                   Ot::NoOperand),
];

const INVALID: InstTemplate = inst!(0, false, op_invalid, Invalid, Ot::NoOperand, Ot::NoOperand);

const JCC_MNEMONICS: [Mnemonic; 16] = [
    Mnemonic::JO,
    Mnemonic::JNO,
    Mnemonic::JB,
    Mnemonic::JNB,
    Mnemonic::JZ,
    Mnemonic::JNZ,
    Mnemonic::JBE,
    Mnemonic::JNBE,
    Mnemonic::JS,
    Mnemonic::JNS,
    Mnemonic::JP,
    Mnemonic::JNP,
    Mnemonic::JL,
    Mnemonic::JNL,
    Mnemonic::JLE,
    Mnemonic::JNLE,
];

/// Second-byte table for 0x0F opcodes, followed by the 0F 01 group.
pub static DECODE_0F: [InstTemplate; 264] = {
    let mut table = [INVALID; 264];

    table[0x01] = inst!(1, true, op_invalid, Group, Ot::NoOperand, Ot::NoOperand);
    table[0x20] = inst!(0, true, op_mov_cr, MOV, Ot::ModRMReg32, Ot::ControlRegister);
    table[0x22] = inst!(0, true, op_mov_cr, MOV, Ot::ControlRegister, Ot::ModRMReg32);

    let mut cc = 0;
    while cc < 16 {
        table[0x80 + cc] = InstTemplate {
            mnemonic: JCC_MNEMONICS[cc],
            ..inst!(0, false, op_jcc, JO, Ot::Relativev, Ot::NoOperand)
        };
        cc += 1;
    }

    table[0xB6] = inst!(0, true, op_movzx, MOVZX, Ot::Registerv, Ot::ModRM8);
    table[0xB7] = inst!(0, true, op_movzx, MOVZX, Ot::Registerv, Ot::ModRM16);
    table[0xBE] = inst!(0, true, op_movsx, MOVSX, Ot::Registerv, Ot::ModRM8);
    table[0xBF] = inst!(0, true, op_movsx, MOVSX, Ot::Registerv, Ot::ModRM16);

    // Group 1 (0F 01)
    table[group_index(1, 2)] = inst!(1, true, op_lgdt, LGDT, Ot::ModRMMem, Ot::NoOperand);
    table[group_index(1, 3)] = inst!(1, true, op_lidt, LIDT, Ot::ModRMMem, Ot::NoOperand);

    table
};

#[inline]
const fn segment_prefix_flag(seg: Segment) -> u32 {
    match seg {
        Segment::ES => OPCODE_PREFIX_ES_OVERRIDE,
        Segment::CS => OPCODE_PREFIX_CS_OVERRIDE,
        Segment::SS => OPCODE_PREFIX_SS_OVERRIDE,
        Segment::DS => OPCODE_PREFIX_DS_OVERRIDE,
        Segment::FS => OPCODE_PREFIX_FS_OVERRIDE,
        Segment::GS => OPCODE_PREFIX_GS_OVERRIDE,
    }
}

impl CpuX86 {
    /// Decode the instruction at eip, recording prefixes and addressing bytes in `ctx`.
    pub fn decode(&mut self, ctx: &mut DecodeContext) -> Result<Instruction, CpuError> {
        let address = self.eip;
        let mut byte = self.fetch_u8()?;

        // Read in opcode prefixes until exhausted
        loop {
            match byte {
                0x66 => ctx.prefixes |= OPCODE_PREFIX_OPERAND_SIZE,
                0x67 => ctx.prefixes |= OPCODE_PREFIX_ADDRESS_SIZE,
                0x26 | 0x2E | 0x36 | 0x3E | 0x64 | 0x65 => {
                    if let Some(seg) = Segment::from_override_prefix(byte) {
                        ctx.prefixes |= segment_prefix_flag(seg);
                        ctx.segment_override = Some(seg);
                    }
                }
                0xF0 => ctx.prefixes |= OPCODE_PREFIX_LOCK,
                0xF2 => ctx.prefixes |= OPCODE_PREFIX_REPNE,
                0xF3 => ctx.prefixes |= OPCODE_PREFIX_REP,
                0x40..=0x4F => {
                    ctx.prefixes |= OPCODE_PREFIX_REX;
                    ctx.rex = Some(byte);
                }
                0xC4 => {
                    ctx.prefixes |= OPCODE_PREFIX_VEX3;
                    ctx.vex = Some(self.fetch_u24()?);
                }
                0xC5 => {
                    ctx.prefixes |= OPCODE_PREFIX_VEX2;
                    ctx.vex = Some(self.fetch_u16()? as u32);
                }
                _ => break,
            }
            byte = self.fetch_u8()?;
        }

        let protected_mode = self.protected_mode();
        let operand_size = ctx.operand_size(protected_mode);
        let address_size = ctx.address_size(protected_mode);

        let (opcode, table): (u16, &[InstTemplate]) = if byte == 0x0F {
            let byte2 = self.fetch_u8()?;
            (0x0F00 | byte2 as u16, &DECODE_0F[..])
        }
        else {
            (byte as u16, &DECODE[..])
        };

        let unsupported = CpuError::UnsupportedOpcode { opcode, eip: address };

        let mut decode_idx = (opcode & 0xFF) as usize;
        let mut op_lu = &table[decode_idx];

        let mut modrm = ModRmByte::default();
        if op_lu.modrm || op_lu.grp != 0 {
            modrm = ModRmByte::from_byte(self.fetch_u8()?);
            ctx.modrm = Some(modrm);

            // Perform secondary lookup of opcode group + extension.
            if op_lu.grp != 0 {
                decode_idx = group_index(op_lu.grp, modrm.reg());
                op_lu = &table[decode_idx];
            }
        }

        if !op_lu.is_valid() {
            return Err(unsupported);
        }

        let mut ea = 0;
        if op_lu.operand1.uses_rm_address() || op_lu.operand2.uses_rm_address() {
            if modrm.is_register() {
                if op_lu.operand1 == Ot::ModRMMem || op_lu.operand2 == Ot::ModRMMem {
                    return Err(unsupported);
                }
            }
            else {
                let (addr, sib) = self.modrm_address(modrm, address_size)?;
                ea = addr;
                ctx.sib = sib;
            }
        }

        let operand1 = op_lu.operand1.resolve_operand(self, modrm, ea, operand_size)?;
        let operand2 = op_lu.operand2.resolve_operand(self, modrm, ea, operand_size)?;

        if ctx.prefixes & OPCODE_PREFIX_LOCK != 0 {
            log::warn!("Ignoring lock prefix on {:?} at {:08X}", op_lu.mnemonic, address);
        }
        if ctx.prefixes & (OPCODE_PREFIX_REP | OPCODE_PREFIX_REPNE) != 0 {
            log::warn!("Ignoring repeat prefix on {:?} at {:08X}", op_lu.mnemonic, address);
        }
        if let Some(rex) = ctx.rex {
            log::warn!("Treated {:02X} as a REX prefix at {:08X}", rex, address);
        }

        Ok(Instruction {
            address,
            opcode,
            decode_idx,
            mnemonic: op_lu.mnemonic,
            prefixes: ctx.prefixes,
            segment_override: ctx.segment_override,
            operand_size,
            address_size,
            operand1,
            operand2,
            size: self.eip.wrapping_sub(address),
        })
    }

    /// The table entry an instruction was decoded from.
    #[inline]
    pub(crate) fn template(instruction: &Instruction) -> &'static InstTemplate {
        if instruction.opcode & 0xFF00 == 0x0F00 {
            &DECODE_0F[instruction.decode_idx]
        }
        else {
            &DECODE[instruction.decode_idx]
        }
    }
}
