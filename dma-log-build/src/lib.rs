//! DMA log build tools.
//!
//! Reads the logger buffer sizes from environment variables in a build script
//! and writes them as constants for inclusion into the firmware.
//!
//! ```ignore
//! // build.rs
//! let cfg = dma_log_build::LogConfig::from_env().unwrap();
//! cfg.write_consts(&out.join("log_cfg.rs")).unwrap();
//!
//! // src/main.rs
//! include!(concat!(env!("OUT_DIR"), "/log_cfg.rs"));
//! ```

use displaydoc::Display;
use std::{env, fs, path::Path};
use thiserror::Error;

/// Environment variable specifying the ring buffer size in bytes.
pub const CAPACITY_VAR: &str = "DMA_LOG_CAPACITY";

/// Environment variable specifying the maximum DMA transfer size in bytes.
pub const STAGE_VAR: &str = "DMA_LOG_STAGE";

/// Environment variable specifying the formatting buffer size in bytes.
pub const MESSAGE_VAR: &str = "DMA_LOG_MESSAGE";

/// Error in logger configuration.
#[derive(Display, Error, Debug)]
pub enum Error {
    /// invalid value for {0}: {1:?}
    InvalidValue(&'static str, String),
    /// ring buffer size {0} is too small, at least 2 bytes are required
    CapacityTooSmall(usize),
    /// DMA transfer size must be at least one byte
    StageZero,
    /// DMA transfer size {stage} exceeds usable ring buffer capacity {usable}
    StageTooLarge { stage: usize, usable: usize },
    /// message buffer size must be at least one byte
    MessageZero,
    /// cannot write configuration: {0}
    Io(#[from] std::io::Error),
}

/// Logger buffer sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogConfig {
    /// Ring buffer size in bytes, one byte less is usable.
    pub capacity: usize,
    /// Maximum number of bytes per DMA transfer.
    pub stage: usize,
    /// Formatting buffer size; messages are cut off after one byte less.
    pub message: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { capacity: 2048, stage: 256, message: 256 }
    }
}

impl LogConfig {
    /// Reads the configuration from the environment of the build script.
    ///
    /// Unset variables keep their default values.
    /// Also instructs cargo to rerun the build script when they change.
    pub fn from_env() -> Result<Self, Error> {
        for var in [CAPACITY_VAR, STAGE_VAR, MESSAGE_VAR] {
            println!("cargo:rerun-if-env-changed={var}");
        }
        Self::from_vars(|var| env::var(var).ok())
    }

    /// Reads the configuration using the variable lookup function `get`.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut this = Self::default();

        for (var, value) in [
            (CAPACITY_VAR, &mut this.capacity),
            (STAGE_VAR, &mut this.stage),
            (MESSAGE_VAR, &mut this.message),
        ] {
            if let Some(text) = get(var) {
                *value = parse_size(&text).ok_or(Error::InvalidValue(var, text))?;
            }
        }

        this.validate()?;
        Ok(this)
    }

    /// Checks that the sizes can be used together.
    pub fn validate(&self) -> Result<(), Error> {
        if self.capacity < 2 {
            return Err(Error::CapacityTooSmall(self.capacity));
        }
        if self.stage == 0 {
            return Err(Error::StageZero);
        }
        if self.stage > self.capacity - 1 {
            return Err(Error::StageTooLarge { stage: self.stage, usable: self.capacity - 1 });
        }
        if self.message == 0 {
            return Err(Error::MessageZero);
        }
        Ok(())
    }

    /// Rust source defining the sizes as constants.
    pub fn consts(&self) -> String {
        format!(
            "/// Log ring buffer size in bytes.\n\
             pub const LOG_CAPACITY: usize = {};\n\
             /// Maximum number of bytes per log DMA transfer.\n\
             pub const LOG_STAGE: usize = {};\n\
             /// Log message formatting buffer size in bytes.\n\
             pub const LOG_MESSAGE: usize = {};\n",
            self.capacity, self.stage, self.message
        )
    }

    /// Writes the constants to the file at `path`.
    pub fn write_consts(&self, path: &Path) -> Result<(), Error> {
        fs::write(path, self.consts())?;
        Ok(())
    }
}

/// Parses a size given in decimal, hexadecimal (`0x`) or kibibytes (`k` suffix).
fn parse_size(text: &str) -> Option<usize> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else if let Some(kib) = text.strip_suffix('k').or_else(|| text.strip_suffix('K')) {
        kib.trim().parse::<usize>().ok()?.checked_mul(1024)
    } else {
        text.parse().ok()
    }
}
