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

    tests::scenarios.rs

    End-to-end behaviour of the machine through its public interface.

*/

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use rx86_core::{
    cpu_common::{instruction::Operand, OperandSize, Register32},
    cpu_x86::flags::Flag,
    CpuError,
    CpuX86,
    RunLimit,
    RunOutcome,
    StopReason,
};

const MB: usize = 1024 * 1024;

fn machine_with(memory_size: usize, address: u32, program: &[u8]) -> CpuX86 {
    let mut cpu = CpuX86::new(memory_size);
    cpu.load_program(address, program).unwrap();
    cpu.set_entry(address, &[]);
    cpu
}

#[test]
fn mov_imm32_into_eax() {
    let mut cpu = machine_with(MB, 0, &[0xB8, 0x00, 0x00, 0x00, 0x02]);
    let outcome = cpu.run(&RunLimit::instructions(1));
    assert!(matches!(outcome, RunOutcome::Stopped(StopReason::InstructionLimit)));
    assert_eq!(cpu.register(Register32::EAX), 0x0200_0000);
    assert_eq!(cpu.eip(), 5);
}

#[test]
fn mov_register_direct() {
    let mut cpu = machine_with(MB, 0, &[0x89, 0xD8]);
    cpu.set_protected_mode(true);
    cpu.set_register(Register32::EBX, 0x1234);
    cpu.run(&RunLimit::instructions(1));
    assert_eq!(cpu.register(Register32::EAX), 0x1234);
    assert_eq!(cpu.eip(), 2);
}

#[test]
fn jmp_short_forward() {
    let mut cpu = machine_with(MB, 0x100, &[0xEB, 0x05]);
    cpu.run(&RunLimit::instructions(1));
    assert_eq!(cpu.eip(), 0x107);
}

#[test]
fn unsupported_opcode_stops_run() {
    // Two committed instructions, then 0xFF
    let mut cpu = machine_with(MB, 0x200, &[0xB0, 0x11, 0x90, 0xFF]);
    let outcome = cpu.run(&RunLimit::instructions(10));
    match outcome {
        RunOutcome::Fault(CpuError::UnsupportedOpcode { opcode, eip }) => {
            assert_eq!(opcode, 0xFF);
            assert_eq!(eip, 0x203);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(cpu.eip(), 0x203);
    assert_eq!(cpu.register(Register32::EAX), 0x11);
    assert_eq!(cpu.instruction_count(), 2);
}

#[test]
fn out_of_range_access_is_memory_fault() {
    // mov eax, [0x00100000] with 1MB of memory
    let mut cpu = machine_with(MB, 0, &[0x8B, 0x05, 0x00, 0x00, 0x10, 0x00]);
    cpu.set_protected_mode(true);
    let outcome = cpu.run(&RunLimit::instructions(1));
    assert!(matches!(
        outcome,
        RunOutcome::Fault(CpuError::MemoryFault { address: 0x0010_0000, .. })
    ));
    assert_eq!(cpu.eip(), 0);

    // Running off the end of memory is also a fault
    let mut cpu = machine_with(16, 14, &[0x90, 0x90]);
    let outcome = cpu.run(&RunLimit::default());
    assert!(matches!(outcome, RunOutcome::Fault(CpuError::MemoryFault { address: 16, .. })));
    assert_eq!(cpu.eip(), 16);
}

#[test]
fn load_program_rejects_oversized_image() {
    let mut cpu = CpuX86::new(16);
    assert!(matches!(cpu.load_program(8, &[0u8; 9]), Err(CpuError::MemoryFault { .. })));
    assert_eq!(cpu.load_program(8, &[0u8; 8]).unwrap(), 8);
}

#[test]
fn width_truncation_round_trip() {
    let mut cpu = CpuX86::new(0x100);
    for size in [OperandSize::Operand8, OperandSize::Operand16, OperandSize::Operand32] {
        for value in [0u32, 0x80, 0xFF, 0x1234, 0x8000, 0x0001_0000, 0xFFFF_FFFF, 0x89AB_CDEF] {
            for op in [Operand::Reg(2, size), Operand::Mem(0x40, size)] {
                op.write(&mut cpu, value).unwrap();
                assert_eq!(op.read_zero_extended(&cpu).unwrap(), value & size.mask());
            }
        }
    }
}

#[test]
fn cmp_leaves_destination() {
    // cmp dword [0x80], 0x10
    let mut cpu = machine_with(0x1000, 0, &[0x83, 0x3D, 0x80, 0x00, 0x00, 0x00, 0x10]);
    cpu.set_protected_mode(true);
    cpu.load_program(0x80, &[0x08, 0x00, 0x00, 0x00]).unwrap();
    cpu.run(&RunLimit::instructions(1));
    assert_eq!(cpu.load_dword_at(0x80).unwrap(), 8);
    assert!(cpu.get_flag(Flag::Carry));
    assert!(!cpu.get_flag(Flag::Zero));
}

#[test]
fn call_and_return() {
    // call +3 ; hlt ; (pad) ; mov eax, 7 ; ret
    let program = [
        0xE8, 0x03, 0x00, 0x00, 0x00, // call 0x108
        0xF4, // hlt
        0x90, 0x90, // pad
        0xB8, 0x07, 0x00, 0x00, 0x00, // mov eax, 7
        0xC3, // ret
    ];
    let mut cpu = machine_with(0x1000, 0, &program);
    cpu.set_protected_mode(true);
    cpu.set_register(Register32::ESP, 0x800);
    let outcome = cpu.run(&RunLimit::default());
    assert!(matches!(outcome, RunOutcome::Stopped(StopReason::Halted)));
    assert_eq!(cpu.register(Register32::EAX), 7);
    assert_eq!(cpu.register(Register32::ESP), 0x800);
    assert_eq!(cpu.eip(), 6);
}

#[test]
fn linux_style_entry_state() {
    let mut cpu = CpuX86::new(MB);
    cpu.load_program(0x10000, &[0xF4]).unwrap();
    cpu.set_protected_mode(true);
    cpu.set_entry(0x10000, &[(Register32::EAX, 0x0200_0000), (Register32::EBX, 0x0020_0000)]);
    let outcome = cpu.run(&RunLimit::default());
    assert!(matches!(outcome, RunOutcome::Stopped(StopReason::Halted)));
    assert_eq!(cpu.register(Register32::EAX), 0x0200_0000);
    assert_eq!(cpu.register(Register32::EBX), 0x0020_0000);
}

#[test]
fn cancel_from_another_thread() {
    let mut cpu = machine_with(0x100, 0, &[0xEB, 0xFE]);
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        flag.store(true, Ordering::Relaxed);
    });
    let outcome = cpu.run(&RunLimit::default().with_cancel(cancel));
    handle.join().unwrap();
    assert!(matches!(outcome, RunOutcome::Stopped(StopReason::Cancelled)));
    assert!(cpu.instruction_count() > 0);
}

#[test]
fn image_from_reader() {
    let mut cpu = CpuX86::new(0x100);
    let image: &[u8] = &[0xB8, 0x78, 0x56, 0x34, 0x12, 0xF4];
    assert_eq!(cpu.load_program_from_reader(0x20, image).unwrap(), 6);
    cpu.set_entry(0x20, &[]);
    cpu.run(&RunLimit::default());
    assert_eq!(cpu.register(Register32::EAX), 0x1234_5678);
}
