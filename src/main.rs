//! Entry point for the fwpatch tool.
//!
//! This file handles high-level application flow:
//! 1. Parse command-line arguments using `clap`.
//! 2. Initialize `tracing` logging at the requested level.
//! 3. Load the firmware image into a mutable buffer.
//! 4. Run the patch pipeline against the external toolchain.
//! 5. Back up the original image when rewriting in place, write the result.
//!
//! Error handling is done via `anyhow`.

use anyhow::{Context, Result};
use clap::Parser;
use memmap2::Mmap;
use std::fs::File;

use fwpatch::checksum::ChecksumLayout;
use fwpatch::config::Config;
use fwpatch::patcher::Patcher;
use fwpatch::toolchain::ExternalToolchain;

fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Map the firmware image and copy it into a mutable buffer
    let file = File::open(&config.firmware)
        .with_context(|| format!("failed to open {}", config.firmware.display()))?;
    let mmap = unsafe { Mmap::map(&file)? };
    let mut firmware = mmap.to_vec();
    if firmware.is_empty() {
        anyhow::bail!("firmware image {} is empty", config.firmware.display());
    }

    let toolchain = ExternalToolchain::new(&config.assembler, &config.objdump, std::env::temp_dir());
    let patcher = Patcher::new(toolchain, ChecksumLayout::default(), !config.no_verify);

    let report = patcher.run(&config.source, &mut firmware)?;

    // Keep the original image around when rewriting in place
    let output = config.output.unwrap_or_else(|| config.firmware.clone());
    if output == config.firmware {
        let backup = output.with_extension("bak");
        std::fs::copy(&config.firmware, &backup)
            .with_context(|| format!("failed to back up to {}", backup.display()))?;
        tracing::info!("original image saved to {}", backup.display());
    }
    std::fs::write(&output, &firmware)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Applied {} patch(es), repaired {} checksum segment(s), wrote {}",
        report.patches.len(),
        report.repairs.len(),
        output.display()
    );
    Ok(())
}
