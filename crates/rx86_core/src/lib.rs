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

    lib.rs

    Main emulator core

*/

//! `rx86_core` models an x86 processor's register file, flags and flat memory, and
//! fetches, decodes and executes machine code from that memory.
//!
//! The entry point is [`cpu_x86::CpuX86`]: create one with a memory size, load an image with
//! [`cpu_x86::CpuX86::load_program`], seed the entry state, then drive it with
//! [`cpu_x86::CpuX86::step`] or [`cpu_x86::CpuX86::run`].

pub mod bus;
pub mod cpu_common;
pub mod cpu_x86;
pub mod memerror;

pub use cpu_common::error::CpuError;
pub use cpu_x86::{
    step::{RunLimit, RunOutcome, StepResult, StopReason},
    CpuX86,
};
