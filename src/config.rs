//! Configuration module.
//!
//! This module defines the command-line interface (CLI) for the patch tool
//! using `clap`. It handles parsing arguments like the patch source, the
//! firmware image, and the toolchain commands.

use clap::Parser;
use std::path::PathBuf;

/// Injects assembled patch sections into a firmware image and repairs its
/// checksum table.
///
/// Patch ranges are declared in the assembly source with paired
/// `PATCH_<NAME>_START`/`PATCH_<NAME>_END` labels placed at their final
/// firmware addresses.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Assembly source declaring the patch sections
    pub source: PathBuf,

    /// Firmware image to patch
    #[arg(short, long)]
    pub firmware: PathBuf,

    /// Output path (defaults to rewriting the firmware in place, keeping a .bak copy)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Assembler command
    #[arg(long, default_value = "m68k-elf-as")]
    pub assembler: String,

    /// Section dump command
    #[arg(long, default_value = "m68k-elf-objdump")]
    pub objdump: String,

    /// Skip the post-apply read-back verification
    #[arg(long)]
    pub no_verify: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", help = "Set the logging level")]
    pub log_level: String,
}
