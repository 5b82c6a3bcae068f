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

    cpu_x86::step.rs

    Implements the fetch-decode-execute step and the run loop.

    A step either retires one instruction or fails. On failure eip is put back
    at the first byte of the failing instruction; any side effects it had
    already made are kept.

    A run has no natural end. It stops on hlt, on a fault, when the caller's
    instruction budget is spent, or when the caller's cancel flag is raised.
    The flag is checked once per instruction.

*/

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    cpu_common::error::CpuError,
    cpu_x86::{decode::DecodeContext, execute::ExecutionResult, CpuX86},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepResult {
    Normal,
    Halt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    InstructionLimit,
    Halted,
    Cancelled,
}

#[derive(Debug)]
pub enum RunOutcome {
    Stopped(StopReason),
    Fault(CpuError),
}

/// Bounds on a call to run(). With neither set, the run continues until hlt or a fault.
#[derive(Clone, Debug, Default)]
pub struct RunLimit {
    pub max_instructions: Option<u64>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl RunLimit {
    pub fn instructions(max: u64) -> Self {
        Self {
            max_instructions: Some(max),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

impl CpuX86 {
    /// Log the machine state after every instruction, at debug level.
    pub fn set_trace(&mut self, state: bool) {
        self.trace = state;
    }

    /// Decode and execute one instruction.
    pub fn step(&mut self) -> Result<StepResult, CpuError> {
        let address = self.eip;

        // A fresh context per instruction; it replaces the previous one even when decode faults.
        let mut ctx = DecodeContext::default();
        let decoded = self.decode(&mut ctx);
        self.decode_state = ctx;

        let result = match decoded {
            Ok(i) => {
                log::trace!("{:08X}: [{:04X}] {}", i.address, i.opcode, i);
                self.execute_instruction(&i)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(exec_result) => {
                self.instruction_count += 1;
                if self.trace {
                    log::debug!("{}", self.dump_state());
                }
                if exec_result == ExecutionResult::Halt {
                    Ok(StepResult::Halt)
                }
                else {
                    Ok(StepResult::Normal)
                }
            }
            Err(e) => {
                self.eip = address;
                Err(e.at_instruction(address))
            }
        }
    }

    /// Step until `limit` is reached, hlt is executed, or an instruction faults.
    pub fn run(&mut self, limit: &RunLimit) -> RunOutcome {
        let start_count = self.instruction_count;
        log::debug!("Run starting at {:08X}", self.eip);

        let outcome = loop {
            if let Some(max) = limit.max_instructions {
                if self.instruction_count - start_count >= max {
                    break RunOutcome::Stopped(StopReason::InstructionLimit);
                }
            }
            if let Some(cancel) = &limit.cancel {
                if cancel.load(Ordering::Relaxed) {
                    break RunOutcome::Stopped(StopReason::Cancelled);
                }
            }

            match self.step() {
                Ok(StepResult::Normal) => {}
                Ok(StepResult::Halt) => break RunOutcome::Stopped(StopReason::Halted),
                Err(e) => {
                    log::error!("CPU fault at {:08X}: {}", self.eip, e);
                    break RunOutcome::Fault(e);
                }
            }
        };

        log::debug!(
            "Run stopped at {:08X} after {} instructions",
            self.eip,
            self.instruction_count - start_count
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_common::{Register32, OPCODE_PREFIX_OPERAND_SIZE};

    #[test]
    fn test_step_counts_instructions() {
        let mut cpu = CpuX86::new(0x100);
        cpu.load_program(0, &[0x90, 0x90, 0xF4]).unwrap();
        assert_eq!(cpu.step().unwrap(), StepResult::Normal);
        assert_eq!(cpu.step().unwrap(), StepResult::Normal);
        assert_eq!(cpu.step().unwrap(), StepResult::Halt);
        assert_eq!(cpu.instruction_count(), 3);
        assert_eq!(cpu.eip(), 3);
    }

    #[test]
    fn test_fault_rewinds_to_first_prefix() {
        let mut cpu = CpuX86::new(0x100);
        cpu.load_program(0x10, &[0x66, 0x2E, 0xFF]).unwrap();
        cpu.set_eip(0x10);
        let err = cpu.step().unwrap_err();
        assert!(matches!(err, CpuError::UnsupportedOpcode { opcode: 0xFF, eip: 0x10 }));
        assert_eq!(cpu.eip(), 0x10);
        assert_eq!(cpu.instruction_count(), 0);
        // The prefixes seen are still available for diagnostics
        assert_ne!(cpu.decode_state().prefixes & OPCODE_PREFIX_OPERAND_SIZE, 0);
    }

    #[test]
    fn test_decode_state_reset_each_step() {
        let mut cpu = CpuX86::new(0x100);
        cpu.load_program(0, &[0x66, 0x89, 0xD8, 0x90]).unwrap();
        cpu.step().unwrap();
        assert!(cpu.decode_state().modrm.is_some());
        cpu.step().unwrap();
        assert_eq!(*cpu.decode_state(), DecodeContext::default());
    }

    #[test]
    fn test_run_instruction_limit() {
        let mut cpu = CpuX86::new(0x100);
        // jmp short -2
        cpu.load_program(0, &[0xEB, 0xFE]).unwrap();
        let outcome = cpu.run(&RunLimit::instructions(1000));
        assert!(matches!(outcome, RunOutcome::Stopped(StopReason::InstructionLimit)));
        assert_eq!(cpu.instruction_count(), 1000);
        assert_eq!(cpu.eip(), 0);
    }

    #[test]
    fn test_run_cancelled() {
        let mut cpu = CpuX86::new(0x100);
        cpu.load_program(0, &[0xEB, 0xFE]).unwrap();
        let cancel = Arc::new(AtomicBool::new(true));
        let outcome = cpu.run(&RunLimit::default().with_cancel(cancel));
        assert!(matches!(outcome, RunOutcome::Stopped(StopReason::Cancelled)));
        assert_eq!(cpu.instruction_count(), 0);
    }

    #[test]
    fn test_run_until_halt() {
        let mut cpu = CpuX86::new(0x100);
        cpu.set_protected_mode(true);
        // mov ecx, 5 ; dec: sub ecx, 1 ; jnz -5 ; hlt
        cpu.load_program(0, &[0xB9, 0x05, 0x00, 0x00, 0x00, 0x83, 0xE9, 0x01, 0x75, 0xFB, 0xF4]).unwrap();
        let outcome = cpu.run(&RunLimit::default());
        assert!(matches!(outcome, RunOutcome::Stopped(StopReason::Halted)));
        assert_eq!(cpu.register(Register32::ECX), 0);
        assert_eq!(cpu.eip(), 11);
        assert_eq!(cpu.instruction_count(), 1 + 5 * 2 + 1);
    }

    #[test]
    fn test_run_privilege_fault_reports_instruction() {
        let mut cpu = CpuX86::new(0x100);
        cpu.load_program(0, &[0x90, 0xFA]).unwrap();
        let outcome = cpu.run(&RunLimit::default());
        assert!(matches!(
            outcome,
            RunOutcome::Fault(CpuError::UnsupportedPrivilegeContext { eip: 1, .. })
        ));
        assert_eq!(cpu.eip(), 1);
    }
}
