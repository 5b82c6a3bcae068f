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

    rx86_headless::lib.rs

    Headless frontend: reads the configuration, builds the machine, loads its
    images and runs it to completion.

*/

//! rx86 headless front-end main library component.

#![forbid(unsafe_code)]

use anyhow::Context;

use rx86_config::ConfigFileParams;
use rx86_core::{CpuX86, RunLimit, RunOutcome, StopReason};

/// Build a machine from a parsed configuration: allocate memory, set the processor mode,
/// load every image in order and seed the entry state.
pub fn build_machine(config: &ConfigFileParams) -> Result<CpuX86, anyhow::Error> {
    let mut cpu = CpuX86::new(config.machine.memory_size);
    cpu.set_protected_mode(config.machine.protected_mode);

    for image in &config.images {
        let file = std::fs::File::open(&image.path)
            .with_context(|| format!("Couldn't open image {}", image.path.display()))?;
        let len = cpu
            .load_program_from_reader(image.address, std::io::BufReader::new(file))
            .with_context(|| format!("Couldn't load image {} at {:08X}", image.path.display(), image.address))?;
        println!("Loaded {} ({} bytes) at {:08X}", image.path.display(), len, image.address);
    }

    cpu.set_entry(config.entry.eip, &config.entry.registers());
    cpu.set_trace(config.run.trace);
    Ok(cpu)
}

/// Run the machine under the configured limits and print the outcome. Returns true if the
/// run ended without a fault.
pub fn run_machine(cpu: &mut CpuX86, config: &ConfigFileParams) -> bool {
    let limit = RunLimit {
        max_instructions: config.run.max_instructions,
        cancel: None,
    };

    let outcome = cpu.run(&limit);
    let clean = match &outcome {
        RunOutcome::Stopped(StopReason::Halted) => {
            println!("Halted after {} instructions.", cpu.instruction_count());
            true
        }
        RunOutcome::Stopped(StopReason::InstructionLimit) => {
            println!("Instruction limit reached after {} instructions.", cpu.instruction_count());
            true
        }
        RunOutcome::Stopped(StopReason::Cancelled) => {
            println!("Cancelled after {} instructions.", cpu.instruction_count());
            true
        }
        RunOutcome::Fault(err) => {
            eprintln!("error: {} (after {} instructions)", err, cpu.instruction_count());
            false
        }
    };

    if config.run.dump_on_exit {
        println!("{}", cpu.dump_state());
    }
    clean
}

pub fn run() {
    env_logger::init();

    let config = match rx86_config::read_config_file("./rx86.toml") {
        Ok(config) => config,
        Err(e) => match e.downcast_ref::<std::io::Error>() {
            Some(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!(
                    "Configuration file not found! Please create rx86.toml in the current directory \
                               or provide the path to a configuration file with --config_file."
                );
                std::process::exit(1);
            }
            Some(e) => {
                eprintln!("Unknown IO error reading configuration file:\n{}", e);
                std::process::exit(1);
            }
            None => {
                eprintln!(
                    "Failed to parse configuration file. There may be a typo or otherwise invalid toml:\n{}",
                    e
                );
                std::process::exit(1);
            }
        },
    };

    if config.images.is_empty() {
        eprintln!("No images to load. Add an [[image]] section to the configuration or pass --run_bin.");
        std::process::exit(1);
    }

    let mut cpu = match build_machine(&config) {
        Ok(cpu) => cpu,
        Err(e) => {
            log::error!("Failed to build machine: {:?}", e);
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    };

    if !run_machine(&mut cpu, &config) {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx86_config::{read_config, CmdLineArgs, ImageEntry};
    use rx86_core::cpu_common::Register32;

    fn temp_image(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("rx86_headless_{}_{}.bin", name, std::process::id()));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_build_and_run() {
        // mov eax, 0x2A ; hlt
        let path = temp_image("run", &[0xB8, 0x2A, 0x00, 0x00, 0x00, 0xF4]);
        let mut config = read_config("[machine]\nmemory_size = 0x10000\n[entry]\neip = 0x100\nebx = 7\n", CmdLineArgs::default()).unwrap();
        config.images.push(ImageEntry {
            path: path.clone(),
            address: 0x100,
        });
        config.run.dump_on_exit = false;

        let mut cpu = build_machine(&config).unwrap();
        assert_eq!(cpu.eip(), 0x100);
        assert_eq!(cpu.register(Register32::EBX), 7);
        assert!(run_machine(&mut cpu, &config));
        assert_eq!(cpu.register(Register32::EAX), 0x2A);
        assert_eq!(cpu.instruction_count(), 2);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_fault_reported() {
        let path = temp_image("fault", &[0xFF]);
        let mut config = read_config("[machine]\nmemory_size = 0x1000\n", CmdLineArgs::default()).unwrap();
        config.images.push(ImageEntry { path: path.clone(), address: 0 });
        config.run.dump_on_exit = false;

        let mut cpu = build_machine(&config).unwrap();
        assert!(!run_machine(&mut cpu, &config));
        assert_eq!(cpu.eip(), 0);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_image() {
        let mut config = read_config("", CmdLineArgs::default()).unwrap();
        config.images.push(ImageEntry {
            path: std::path::PathBuf::from("/nonexistent/rx86/image.bin"),
            address: 0,
        });
        assert!(build_machine(&config).is_err());
    }

    #[test]
    fn test_oversized_image() {
        let path = temp_image("big", &[0x90; 32]);
        let mut config = read_config("[machine]\nmemory_size = 16\n", CmdLineArgs::default()).unwrap();
        config.images.push(ImageEntry { path: path.clone(), address: 0 });
        let err = build_machine(&config).unwrap_err();
        assert!(err.downcast_ref::<rx86_core::CpuError>().is_some());

        std::fs::remove_file(path).ok();
    }
}
