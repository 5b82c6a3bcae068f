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

    rx86_config::bpaf_config::mod.rs

    Command line arguments. Every value here, when given, takes priority
    over the configuration file.

*/

use std::path::PathBuf;

#[cfg(feature = "use_bpaf")]
use bpaf::{Bpaf, Parser};

/// Parse an address given in decimal or with a 0x prefix.
pub fn parse_address(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    }
    else {
        s.parse::<u32>()
    };
    parsed.map_err(|e| format!("Bad address '{}': {}", s, e))
}

#[cfg(feature = "use_bpaf")]
fn run_bin_addr_arg() -> impl Parser<Option<u32>> {
    bpaf::long("run_bin_addr")
        .help("Load address for --run_bin (decimal or 0x-prefixed hex)")
        .argument::<String>("addr")
        .parse(|s| parse_address(&s))
        .optional()
}

#[cfg(feature = "use_bpaf")]
fn entry_eip_arg() -> impl Parser<Option<u32>> {
    bpaf::long("entry_eip")
        .help("Initial instruction pointer (decimal or 0x-prefixed hex)")
        .argument::<String>("addr")
        .parse(|s| parse_address(&s))
        .optional()
}

#[cfg_attr(feature = "use_bpaf", derive(Bpaf))]
#[cfg_attr(feature = "use_bpaf", bpaf(options, version, generate(cli_args)))]
#[derive(Debug, Default)]
pub struct CmdLineArgs {
    #[cfg_attr(feature = "use_bpaf", bpaf(long("config_file"), long("configfile")))]
    pub config_file: Option<PathBuf>,

    #[cfg_attr(feature = "use_bpaf", bpaf(long("run_bin"), long("runbin")))]
    pub run_bin: Option<PathBuf>,
    #[cfg_attr(feature = "use_bpaf", bpaf(external(run_bin_addr_arg)))]
    pub run_bin_addr: Option<u32>,
    #[cfg_attr(feature = "use_bpaf", bpaf(external(entry_eip_arg)))]
    pub entry_eip: Option<u32>,

    #[cfg_attr(feature = "use_bpaf", bpaf(long))]
    pub max_instructions: Option<u64>,

    #[cfg_attr(feature = "use_bpaf", bpaf(long("protected_mode"), switch))]
    pub protected_mode: bool,

    #[cfg_attr(feature = "use_bpaf", bpaf(long("no_dump"), long("nodump"), switch))]
    pub no_dump: bool,

    #[cfg_attr(feature = "use_bpaf", bpaf(long, switch))]
    pub trace: bool,
}
