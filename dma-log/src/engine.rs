//! Transmit engine.

use core::fmt;
use displaydoc::Display;

use crate::{ring_buffer::RingBuffer, Diagnostic};

/// UART transmitter driven by DMA.
///
/// The transmitter signals completion of every accepted transfer exactly once
/// by having the transfer complete interrupt handler call
/// [`DmaLog::on_tx_complete`](crate::DmaLog::on_tx_complete).
pub trait UartDma {
    /// Starts transmitting `data` in the background.
    ///
    /// `data` points into the staging buffer of the logger.
    /// It stays unmodified until completion has been signalled, provided the
    /// logger is not moved meanwhile, i.e. it is placed in a `static`.
    /// The transmitter must not access it after signalling completion.
    fn start(&mut self, data: &[u8]) -> Result<(), StartError>;
}

/// Error starting a UART DMA transfer.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartError {
    /// transmitter is busy
    Busy,
    /// transmitter fault 0x{0:02x}
    Fault(u8),
}

/// Transmit engine state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// No transfer in flight.
    #[default]
    Idle,
    /// A DMA transfer over the staging buffer is in flight.
    Transmitting,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Transmitting => write!(f, "BUSY"),
        }
    }
}

/// Moves data from the ring buffer to the UART DMA transmitter.
pub(crate) struct Engine<T, const STAGE: usize> {
    state: State,
    tx: Option<T>,
    staging: [u8; STAGE],
    busy_retries: u32,
}

impl<T: UartDma, const STAGE: usize> Engine<T, STAGE> {
    pub const fn new() -> Self {
        Self { state: State::Idle, tx: None, staging: [0; STAGE], busy_retries: 0 }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Number of transfers the transmitter refused as busy.
    pub fn busy_retries(&self) -> u32 {
        self.busy_retries
    }

    /// Attaches a transmitter, replacing the previous one and resetting the busy counter.
    ///
    /// Fails and returns `tx` while a transfer is in flight.
    pub fn attach(&mut self, tx: T) -> Result<(), T> {
        if self.state == State::Transmitting {
            return Err(tx);
        }
        self.tx = Some(tx);
        self.busy_retries = 0;
        Ok(())
    }

    /// Starts a transfer if idle and data is available.
    ///
    /// A busy transmitter is retried on the next call without being reported.
    pub fn kick<const SIZE: usize>(&mut self, ring: &mut RingBuffer<SIZE>) -> Option<Diagnostic> {
        match self.state {
            State::Idle => self.start(ring, false),
            State::Transmitting => None,
        }
    }

    /// Handles completion of the transfer in flight and starts the next one.
    ///
    /// Spurious completions while idle are ignored.
    /// If the transmitter is busy the engine goes idle and reports it;
    /// the main loop retries.
    pub fn complete<const SIZE: usize>(&mut self, ring: &mut RingBuffer<SIZE>) -> Option<Diagnostic> {
        match self.state {
            State::Idle => None,
            State::Transmitting => {
                self.state = State::Idle;
                self.start(ring, true)
            }
        }
    }

    fn start<const SIZE: usize>(&mut self, ring: &mut RingBuffer<SIZE>, report_busy: bool) -> Option<Diagnostic> {
        let tx = self.tx.as_mut()?;
        if ring.is_empty() {
            return None;
        }

        // Bytes stay in the ring buffer until the transmitter accepted them.
        let n = ring.peek(&mut self.staging);
        match tx.start(&self.staging[..n]) {
            Ok(()) => {
                ring.consume(n);
                self.state = State::Transmitting;
                None
            }
            Err(StartError::Busy) => {
                self.busy_retries = self.busy_retries.wrapping_add(1);
                let pending = ring.len();
                log_debug!("DMA TX busy, {} bytes pending", pending);
                report_busy.then_some(Diagnostic::DmaBusy { pending })
            }
            Err(StartError::Fault(code)) => {
                ring.consume(n);
                log_warn!("DMA TX failed: 0x{:02x}, {} bytes lost", code, n);
                Some(Diagnostic::DmaFault { code, lost: n })
            }
        }
    }
}
