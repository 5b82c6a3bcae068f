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

    benches::cpu_bench.rs

    Benchmarks for instruction decode and the run loop.

*/

use rand::Rng;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rx86_core::{
    cpu_common::Register32,
    cpu_x86::{decode::DecodeContext, CpuX86},
    RunLimit,
};

const BENCH_MEMORY: usize = 0x10000;

pub fn cpu_decode_bench(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let mut cpu = CpuX86::new(BENCH_MEMORY);
    cpu.set_protected_mode(true);

    let mut image = vec![0u8; BENCH_MEMORY];
    rng.fill(&mut image[..]);
    let _ = cpu.load_program(0, &image);

    c.bench_function("cpu_decode_bench", |b| {
        b.iter(|| {
            cpu.set_eip(rng.gen_range(0..(BENCH_MEMORY as u32 - 0x100)));
            let mut ctx = DecodeContext::default();
            let _ = black_box(cpu.decode(&mut ctx));
        });
    });
}

pub fn cpu_loop_bench(c: &mut Criterion) {
    let mut cpu = CpuX86::new(BENCH_MEMORY);
    cpu.set_protected_mode(true);

    // loop: add eax, ecx ; sub ecx, 1 ; jnz loop ; hlt
    let program = [0x01, 0xC8, 0x83, 0xE9, 0x01, 0x75, 0xF9, 0xF4];
    let _ = cpu.load_program(0x1000, &program);
    let limit = RunLimit::default();

    c.bench_function("cpu_loop_bench", |b| {
        b.iter(|| {
            cpu.set_entry(0x1000, &[(Register32::EAX, 0), (Register32::ECX, 1000)]);
            black_box(cpu.run(&limit));
        });
    });
}

criterion_group!(benches, cpu_decode_bench, cpu_loop_bench);
criterion_main!(benches);
