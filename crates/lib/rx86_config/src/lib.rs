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

    rx86_config::lib.rs

    Configuration file parsing and command line overlay.

*/

//! The `rx86_config` crate parses rx86's TOML configuration file and overlays command line
//! arguments on top of it. Command line arguments always take priority over the file.
//!
//! Features:
//! - `use_bpaf`: Enable BPAF support for command line argument parsing.

mod bpaf_config;

use std::path::{Path, PathBuf};

use rx86_core::cpu_common::Register32;

pub use bpaf_config::{parse_address, CmdLineArgs};

#[cfg(feature = "use_bpaf")]
use bpaf_config::cli_args;

use cfg_if::cfg_if;
use serde_derive::Deserialize;

/// The flat-binary loader's memory size, 32MiB.
pub const DEFAULT_MEMORY_SIZE: usize = 32 * 1024 * 1024;

const fn _default_true() -> bool {
    true
}
const fn _default_memory_size() -> usize {
    DEFAULT_MEMORY_SIZE
}

#[derive(Debug, Deserialize)]
pub struct Machine {
    #[serde(default = "_default_memory_size")]
    pub memory_size: usize,
    #[serde(default)]
    pub protected_mode: bool,
}

impl Default for Machine {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            protected_mode: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ImageEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub address: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub eip: u32,
    pub eax: Option<u32>,
    pub ecx: Option<u32>,
    pub edx: Option<u32>,
    pub ebx: Option<u32>,
    pub esp: Option<u32>,
    pub ebp: Option<u32>,
    pub esi: Option<u32>,
    pub edi: Option<u32>,
}

impl Entry {
    /// The registers given a value in the [entry] section, in encoding order.
    pub fn registers(&self) -> Vec<(Register32, u32)> {
        [
            (Register32::EAX, self.eax),
            (Register32::ECX, self.ecx),
            (Register32::EDX, self.edx),
            (Register32::EBX, self.ebx),
            (Register32::ESP, self.esp),
            (Register32::EBP, self.ebp),
            (Register32::ESI, self.esi),
            (Register32::EDI, self.edi),
        ]
        .into_iter()
        .filter_map(|(reg, value)| value.map(|v| (reg, v)))
        .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub max_instructions: Option<u64>,
    #[serde(default = "_default_true")]
    pub dump_on_exit: bool,
    #[serde(default)]
    pub trace: bool,
}

impl Default for Run {
    fn default() -> Self {
        Self {
            max_instructions: None,
            dump_on_exit: true,
            trace: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFileParams {
    #[serde(default)]
    pub machine: Machine,
    #[serde(default, rename = "image")]
    pub images: Vec<ImageEntry>,
    #[serde(default)]
    pub entry: Entry,
    #[serde(default)]
    pub run: Run,
}

impl ConfigFileParams {
    pub fn overlay(&mut self, shell_args: CmdLineArgs) {
        // A command line image replaces a file image at the same address, or is appended.
        if let Some(path) = shell_args.run_bin {
            let address = shell_args.run_bin_addr.unwrap_or(0);
            if let Some(image) = self.images.iter_mut().find(|image| image.address == address) {
                image.path = path;
            }
            else {
                self.images.push(ImageEntry { path, address });
            }
        }

        if let Some(eip) = shell_args.entry_eip {
            self.entry.eip = eip;
        }

        if let Some(max_instructions) = shell_args.max_instructions {
            self.run.max_instructions = Some(max_instructions);
        }

        self.machine.protected_mode |= shell_args.protected_mode;
        self.run.dump_on_exit &= !shell_args.no_dump;
        self.run.trace |= shell_args.trace;
    }
}

pub fn read_config(toml_string: impl AsRef<str>, shell_args: CmdLineArgs) -> Result<ConfigFileParams, anyhow::Error> {
    let mut toml_args: ConfigFileParams = toml::from_str(toml_string.as_ref())?;

    log::debug!("toml_config: {:?}", toml_args);

    // Command line arguments override config file arguments
    toml_args.overlay(shell_args);

    Ok(toml_args)
}

fn shell_args() -> CmdLineArgs {
    let shell_args: CmdLineArgs;

    cfg_if! {
        if #[cfg(feature = "use_bpaf")] {
            log::debug!("Reading command line arguments...");
            shell_args = cli_args().run();
        } else {
            log::debug!("Argument reading disabled...");
            shell_args = CmdLineArgs::default();
        }
    }

    shell_args
}

/// Read the TOML configuration from a file path, parse and overlay command line arguments.
/// The path may be overridden with --config_file.
pub fn read_config_file<P>(default_path: P) -> Result<ConfigFileParams, anyhow::Error>
where
    P: AsRef<Path>,
{
    let shell_args = shell_args();

    let toml_string = if let Some(configfile_path) = shell_args.config_file.as_ref() {
        std::fs::read_to_string(configfile_path)?
    }
    else {
        std::fs::read_to_string(default_path)?
    };

    read_config(toml_string, shell_args)
}

/// Read the TOML configuration from a string, parse and overlay command line arguments.
pub fn read_config_string(toml_string: impl AsRef<str>) -> Result<ConfigFileParams, anyhow::Error> {
    read_config(toml_string, shell_args())
}
