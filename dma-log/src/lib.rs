//! Non-blocking logger that drains a ring buffer through a DMA-driven UART transmitter.
//!
//! Log messages are formatted into a bounded stack buffer and appended to a
//! [ring buffer](RingBuffer). The transmit engine moves up to `STAGE` bytes at a
//! time from the ring buffer into a staging buffer and hands it to the
//! [UART DMA transmitter](UartDma). When the transfer completes, the DMA interrupt
//! handler calls [`DmaLog::on_tx_complete`], which immediately starts the next
//! transfer if more data is pending.
//!
//! ```ignore
//! static LOG: DmaLog<Usart1Dma, 2048, 256, 256> = DmaLog::new();
//!
//! // Startup.
//! LOG.init(usart1_dma, report).ok();
//!
//! // Any context.
//! dma_log::emit!(LOG, "temperature: {} C\n", temp);
//!
//! // Main loop.
//! LOG.process();
//!
//! // DMA transfer complete interrupt.
//! LOG.on_tx_complete();
//! ```
//!
//! Messages are never blocking and never allocate. When the ring buffer is full,
//! excess bytes are dropped and counted, see [`Status`].
//!
//! # Critical section implementation
//!
//! This crate uses [`critical-section`](https://github.com/rust-embedded/critical-section) to
//! protect the ring buffer and the engine state against the transfer complete interrupt.
//! You must import a crate that provides a `critical-section` implementation
//! suitable for the current target.
//!
//! For example, for single-core privileged-mode Cortex-M targets, you can add the following to your Cargo.toml.
//!
//! ```toml
//! [dependencies]
//! cortex-m = { version = "0.7.6", features = ["critical-section-single-core"]}
//! ```
//!
//! # Diagnostics
//!
//! DMA faults and flush timeouts are never written into the ring buffer.
//! They are passed to the report function given to [`DmaLog::init`], which should
//! write them to a separate, usually blocking, debug output.
//! With the `defmt` feature enabled they are also logged using `defmt`.

#![cfg_attr(not(test), no_std)]

macro_rules! log_debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        #[cfg(feature = "defmt")]
        defmt::debug!($fmt $(, $arg)*);
        #[cfg(not(feature = "defmt"))]
        {
            $(let _ = &$arg;)*
        }
    };
}

macro_rules! log_warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        #[cfg(feature = "defmt")]
        defmt::warn!($fmt $(, $arg)*);
        #[cfg(not(feature = "defmt"))]
        {
            $(let _ = &$arg;)*
        }
    };
}

mod clock;
mod engine;
mod error;
mod format;
mod logger;
mod ring_buffer;

pub use clock::Clock;
pub use engine::{StartError, State, UartDma};
pub use error::{Diagnostic, Error};
pub use logger::{DmaLog, Report, Status, DEFAULT_FLUSH_TIMEOUT_MS, FLUSH_POLL_MS};
pub use ring_buffer::RingBuffer;

/// Formats a message and appends it to a [`DmaLog`].
///
/// ```ignore
/// dma_log::emit!(LOG, "sector 0x{:06x} erased\n", addr);
/// ```
#[macro_export]
macro_rules! emit {
    ($log:expr, $($arg:tt)+) => {
        $log.emit(::core::format_args!($($arg)+))
    };
}
