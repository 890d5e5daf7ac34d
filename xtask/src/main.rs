//! Build script.
//!
//! Use `cargo xtask` to execute.

use clap::Parser;
use devx_cmd::cmd;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Build DMA log firmware image.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log ring buffer size in bytes.
    #[arg(long, default_value_t = 2048)]
    capacity: usize,

    /// Maximum number of bytes per DMA transfer.
    #[arg(long, default_value_t = 256)]
    stage: usize,

    /// Log message formatting buffer size in bytes.
    #[arg(long, default_value_t = 256)]
    message: usize,

    /// Build without link-time optimization.
    #[arg(long)]
    devrel: bool,
}

fn project_root() -> PathBuf {
    Path::new(&env!("CARGO_MANIFEST_DIR")).ancestors().nth(1).unwrap().to_path_buf()
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.stage == 0 || args.stage >= args.capacity {
        anyhow::bail!("DMA transfer size must be between 1 and {} bytes", args.capacity.saturating_sub(1));
    }
    if args.message == 0 {
        anyhow::bail!("message buffer size must be at least one byte");
    }

    let profile = if args.devrel { "--profile=devrel" } else { "--release" };
    let firmware = format!("dma_log_{}_{}_{}", args.capacity, args.stage, args.message);

    fs::create_dir_all(project_root().join("image"))?;

    let cargo = env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    let envs = [
        ("DMA_LOG_CAPACITY", args.capacity.to_string()),
        ("DMA_LOG_STAGE", args.stage.to_string()),
        ("DMA_LOG_MESSAGE", args.message.to_string()),
    ];

    let mut build = cmd!(&cargo, "build", profile);
    build.current_dir(project_root().join("dma-log-firmware"));
    for (var, value) in &envs {
        build.env(var, value);
    }
    build.run()?;

    let mut objcopy = cmd!(&cargo, "objcopy", profile, "--", "-O", "binary", format!("../image/{firmware}.bin"));
    objcopy.current_dir(project_root().join("dma-log-firmware"));
    for (var, value) in &envs {
        objcopy.env(var, value);
    }
    objcopy.run()?;

    println!();
    println!(
        "Built DMA log firmware image/{firmware}.bin (buffer {} bytes, transfer {} bytes, message {} bytes)",
        args.capacity, args.stage, args.message
    );

    Ok(())
}
