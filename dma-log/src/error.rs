//! Errors and diagnostics.

use displaydoc::Display;

/// Logger error.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// flush timed out with {residual} bytes not transmitted
    FlushTimeout {
        /// Bytes remaining in the ring buffer.
        residual: usize,
    },
    /// last DMA transfer did not complete in time
    TransferTimeout,
}

/// Out-of-band diagnostic.
///
/// Diagnostics are passed to the report function and must not be logged
/// through the ring buffer they are about.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Diagnostic {
    /// DMA TX failed: 0x{code:02x}, {lost} bytes lost
    DmaFault {
        /// Fault code reported by the transmitter.
        code: u8,
        /// Staged bytes that were discarded.
        lost: usize,
    },
    /// DMA TX busy, {pending} bytes pending
    DmaBusy {
        /// Bytes waiting in the ring buffer for the next attempt.
        pending: usize,
    },
    /// WARNING: {residual} bytes not transmitted
    FlushTimeout {
        /// Bytes remaining in the ring buffer.
        residual: usize,
    },
    /// WARNING: DMA transfer still in flight
    TransferTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(Diagnostic::DmaFault { code: 0x1f, lost: 12 }.to_string(), "DMA TX failed: 0x1f, 12 bytes lost");
        assert_eq!(Diagnostic::DmaBusy { pending: 5 }.to_string(), "DMA TX busy, 5 bytes pending");
        assert_eq!(Diagnostic::FlushTimeout { residual: 7 }.to_string(), "WARNING: 7 bytes not transmitted");
        assert_eq!(Diagnostic::TransferTimeout.to_string(), "WARNING: DMA transfer still in flight");
        assert_eq!(Error::TransferTimeout.to_string(), "last DMA transfer did not complete in time");
        assert_eq!(Error::FlushTimeout { residual: 3 }.to_string(), "flush timed out with 3 bytes not transmitted");
    }
}
