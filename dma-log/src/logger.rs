//! Logger.

use core::{cell::RefCell, fmt};
use critical_section::Mutex;

use crate::{
    engine::Engine, format::Scratch, ring_buffer::RingBuffer, Clock, Diagnostic, Error, State, UartDma,
};

/// Default timeout for [`DmaLog::flush`] in milliseconds.
pub const DEFAULT_FLUSH_TIMEOUT_MS: u32 = 5_000;

/// Interval between attempts to make progress during [`DmaLog::flush`] in milliseconds.
pub const FLUSH_POLL_MS: u32 = 10;

/// Receives diagnostics out-of-band.
pub type Report = fn(&Diagnostic);

fn ignore(_: &Diagnostic) {}

/// Logger status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    /// Bytes waiting in the ring buffer.
    pub occupancy: usize,
    /// Usable ring buffer capacity in bytes.
    pub capacity: usize,
    /// Transmit engine state.
    pub state: State,
    /// Bytes dropped because the ring buffer was full.
    pub dropped_bytes: u32,
    /// Messages cut off at the maximum message length.
    pub truncated_messages: u32,
    /// Failed DMA transfers.
    pub dma_faults: u32,
    /// Transfers refused by the busy transmitter and retried later.
    pub busy_retries: u32,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Buffer: {}/{} bytes, DMA: {}, dropped: {} bytes, truncated: {}, faults: {}, busy: {}",
            self.occupancy,
            self.capacity,
            self.state,
            self.dropped_bytes,
            self.truncated_messages,
            self.dma_faults,
            self.busy_retries
        )
    }
}

/// State shared between thread and interrupt context.
struct Inner<T, const SIZE: usize, const STAGE: usize> {
    ring: RingBuffer<SIZE>,
    engine: Engine<T, STAGE>,
    report: Report,
    dropped_bytes: u32,
    truncated_messages: u32,
    dma_faults: u32,
}

impl<T: UartDma, const SIZE: usize, const STAGE: usize> Inner<T, SIZE, STAGE> {
    fn push(&mut self, data: &[u8]) -> usize {
        let n = self.ring.push(data);
        self.dropped_bytes = self.dropped_bytes.wrapping_add((data.len() - n) as u32);
        n
    }
}

/// Non-blocking logger transmitting over UART DMA.
///
/// * `SIZE` is the ring buffer size, of which `SIZE - 1` bytes are usable.
/// * `STAGE` is the maximum number of bytes per DMA transfer.
/// * `MSG` is the size of the formatting buffer; messages are cut off after `MSG - 1` bytes.
///
/// The logger must be placed in a `static`, since the transmitter reads the
/// staging buffer in the background.
pub struct DmaLog<T, const SIZE: usize, const STAGE: usize, const MSG: usize> {
    inner: Mutex<RefCell<Inner<T, SIZE, STAGE>>>,
}

impl<T: UartDma, const SIZE: usize, const STAGE: usize, const MSG: usize> Default for DmaLog<T, SIZE, STAGE, MSG> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: UartDma, const SIZE: usize, const STAGE: usize, const MSG: usize> DmaLog<T, SIZE, STAGE, MSG> {
    const VALID: () = {
        assert!(STAGE >= 1, "DMA transfer size must be at least one byte");
        assert!(STAGE < SIZE, "DMA transfer size must not exceed usable ring buffer capacity");
        assert!(MSG >= 1, "message buffer must be at least one byte");
    };

    /// Creates a logger without transmitter.
    ///
    /// Messages are buffered but not transmitted until [`init`](Self::init) is called.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;

        Self {
            inner: Mutex::new(RefCell::new(Inner {
                ring: RingBuffer::new(),
                engine: Engine::new(),
                report: ignore,
                dropped_bytes: 0,
                truncated_messages: 0,
                dma_faults: 0,
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner<T, SIZE, STAGE>) -> R) -> R {
        critical_section::with(|cs| f(&mut *self.inner.borrow_ref_mut(cs)))
    }

    /// Initializes logging to the UART DMA transmitter `tx`.
    ///
    /// Discards buffered data, resets the counters and sets the engine idle.
    /// `report` receives diagnostics; it must not log through this logger.
    ///
    /// Calling this again replaces transmitter and report function.
    /// While a transfer is in flight this fails and returns `tx`.
    pub fn init(&self, tx: T, report: Report) -> Result<(), T> {
        self.with(|inner| {
            inner.engine.attach(tx)?;
            inner.ring.clear();
            inner.report = report;
            inner.dropped_bytes = 0;
            inner.truncated_messages = 0;
            inner.dma_faults = 0;
            Ok(())
        })?;

        log_debug!("DMA log initialized: {} bytes buffer, {} bytes per transfer", SIZE - 1, STAGE);
        Ok(())
    }

    /// Formats a message and appends it to the ring buffer.
    ///
    /// Use the [`emit!`](crate::emit) macro for convenience.
    /// Output beyond `MSG - 1` bytes and bytes that do not fit into the
    /// ring buffer are dropped.
    ///
    /// Never blocks. Can be called from interrupt context.
    pub fn emit(&self, args: fmt::Arguments) {
        let mut buf = [0; MSG];
        let (n, truncated) = Scratch::format(&mut buf[..MSG - 1], args);

        self.with(|inner| {
            if truncated {
                inner.truncated_messages = inner.truncated_messages.wrapping_add(1);
            }
            if n > 0 {
                inner.push(&buf[..n]);
            }
        });
    }

    /// Appends raw bytes to the ring buffer.
    ///
    /// Returns the number of bytes accepted.
    pub fn write(&self, data: &[u8]) -> usize {
        self.with(|inner| inner.push(data))
    }

    /// Starts transmitting buffered data, if no transfer is in flight.
    ///
    /// Call regularly from the main loop. Must not be called from interrupt context.
    pub fn process(&self) {
        self.drive(|engine, ring| engine.kick(ring));
    }

    /// Signals completion of the current DMA transfer.
    ///
    /// Call from the transfer complete interrupt handler.
    /// Starts the next transfer if data is pending.
    pub fn on_tx_complete(&self) {
        self.drive(|engine, ring| engine.complete(ring));
    }

    fn drive(&self, f: impl FnOnce(&mut Engine<T, STAGE>, &mut RingBuffer<SIZE>) -> Option<Diagnostic>) {
        let pending = self.with(|inner| {
            let diag = f(&mut inner.engine, &mut inner.ring)?;
            if let Diagnostic::DmaFault { .. } = diag {
                inner.dma_faults = inner.dma_faults.wrapping_add(1);
            }
            Some((inner.report, diag))
        });

        // Report outside of critical section.
        if let Some((report, diag)) = pending {
            report(&diag);
        }
    }

    /// Waits until all buffered data has been handed to the transmitter.
    ///
    /// The last transfer may still be in flight when this returns, see [`drain`](Self::drain).
    ///
    /// Gives up after `timeout_ms` milliseconds, reporting the number of bytes
    /// not transmitted. A transfer in flight is never cancelled.
    pub fn flush<C: Clock>(&self, clock: &mut C, timeout_ms: u32) -> Result<(), Error> {
        if self.poll_until(clock, timeout_ms, |log| log.occupancy() == 0) {
            return Ok(());
        }

        let residual = self.occupancy();
        log_warn!("flush timeout: {} bytes not transmitted", residual);
        self.report(&Diagnostic::FlushTimeout { residual });
        Err(Error::FlushTimeout { residual })
    }

    /// Flushes and then waits until the last DMA transfer has completed.
    ///
    /// Both steps share the deadline of `timeout_ms` milliseconds.
    /// Use before a reset, so that no buffered byte is cut off.
    /// The UART may still be shifting out the last byte when this returns.
    pub fn drain<C: Clock>(&self, clock: &mut C, timeout_ms: u32) -> Result<(), Error> {
        let start = clock.millis();
        self.flush(clock, timeout_ms)?;

        let remaining = timeout_ms.saturating_sub(clock.millis().wrapping_sub(start));
        if self.poll_until(clock, remaining, |log| log.state() == State::Idle) {
            return Ok(());
        }

        log_warn!("drain timeout: DMA transfer still in flight");
        self.report(&Diagnostic::TransferTimeout);
        Err(Error::TransferTimeout)
    }

    /// Pumps the engine until `done` holds, polling every [`FLUSH_POLL_MS`].
    ///
    /// Returns false once `timeout_ms` milliseconds have elapsed.
    fn poll_until<C: Clock>(&self, clock: &mut C, timeout_ms: u32, done: impl Fn(&Self) -> bool) -> bool {
        let start = clock.millis();

        loop {
            self.process();
            if done(self) {
                return true;
            }

            let elapsed = clock.millis().wrapping_sub(start);
            if elapsed >= timeout_ms {
                return false;
            }

            clock.delay_ms(FLUSH_POLL_MS.min(timeout_ms - elapsed));
        }
    }

    fn report(&self, diag: &Diagnostic) {
        let report = self.with(|inner| inner.report);
        report(diag);
    }

    /// Number of bytes waiting in the ring buffer.
    pub fn occupancy(&self) -> usize {
        self.with(|inner| inner.ring.len())
    }

    /// Transmit engine state.
    pub fn state(&self) -> State {
        self.with(|inner| inner.engine.state())
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.with(|inner| Status {
            occupancy: inner.ring.len(),
            capacity: RingBuffer::<SIZE>::CAPACITY,
            state: inner.engine.state(),
            dropped_bytes: inner.dropped_bytes,
            truncated_messages: inner.truncated_messages,
            dma_faults: inner.dma_faults,
            busy_retries: inner.engine.busy_retries(),
        })
    }

    /// Writes a one-line status summary to `sink`.
    pub fn write_status(&self, sink: &mut impl fmt::Write) -> fmt::Result {
        writeln!(sink, "{}", self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;
    use std::{cell::RefCell as StdRefCell, string::String, vec::Vec};

    #[derive(Default)]
    struct Wire;

    impl UartDma for Wire {
        fn start(&mut self, _data: &[u8]) -> Result<(), crate::StartError> {
            Ok(())
        }
    }

    std::thread_local! {
        static REPORTED: StdRefCell<Vec<Diagnostic>> = StdRefCell::new(Vec::new());
    }

    fn record(diag: &Diagnostic) {
        REPORTED.with(|r| r.borrow_mut().push(*diag));
    }

    #[test]
    fn emit_truncates_at_message_size() {
        let log = DmaLog::<Wire, 64, 16, 8>::new();
        log.init(Wire::default(), record).ok();

        crate::emit!(log, "{}", "0123456789");
        assert_eq!(log.occupancy(), 7);
        assert_eq!(log.status().truncated_messages, 1);
    }

    #[test]
    fn emit_counts_dropped_bytes() {
        let log = DmaLog::<Wire, 8, 4, 32>::new();
        log.init(Wire::default(), record).ok();

        crate::emit!(log, "ABCDEFGHIJ");
        let status = log.status();
        assert_eq!(status.occupancy, 7);
        assert_eq!(status.dropped_bytes, 3);
        assert_eq!(status.truncated_messages, 0);
        assert_eq!(log.write(b"x"), 0);
        assert_eq!(log.status().dropped_bytes, 4);
    }

    #[test]
    fn init_resets_while_idle() {
        let log = DmaLog::<Wire, 16, 4, 16>::new();
        log.write(b"before init");
        assert_eq!(log.init(Wire::default(), record).ok(), Some(()));
        assert_eq!(log.occupancy(), 0);
        assert_eq!(log.state(), State::Idle);

        log.write(b"abc");
        assert!(log.init(Wire::default(), record).is_ok());
        assert_eq!(log.occupancy(), 0);
    }

    #[test]
    fn init_refused_while_transmitting() {
        let log = DmaLog::<Wire, 16, 4, 16>::new();
        log.init(Wire::default(), record).ok();
        log.write(b"abcdef");
        log.process();
        assert_eq!(log.state(), State::Transmitting);

        assert!(log.init(Wire::default(), record).is_err());
        assert_eq!(log.state(), State::Transmitting);
        assert_eq!(log.occupancy(), 2);
    }

    #[test]
    fn process_before_init_keeps_data() {
        let log = DmaLog::<Wire, 16, 4, 16>::new();
        log.write(b"abc");
        log.process();
        assert_eq!(log.state(), State::Idle);
        assert_eq!(log.occupancy(), 3);
    }

    #[test]
    fn status_line() {
        let log = DmaLog::<Wire, 64, 16, 32>::new();
        log.init(Wire::default(), record).ok();
        crate::emit!(log, "Hello DMA Log!\n");

        let mut line = String::new();
        log.write_status(&mut line).unwrap();
        assert_eq!(line, "Buffer: 15/63 bytes, DMA: IDLE, dropped: 0 bytes, truncated: 0, faults: 0, busy: 0\n");

        log.process();
        line.clear();
        write!(line, "{}", log.status()).unwrap();
        assert_eq!(line, "Buffer: 0/63 bytes, DMA: BUSY, dropped: 0 bytes, truncated: 0, faults: 0, busy: 0");
    }

    #[test]
    fn reporter_not_called_without_diagnostics() {
        REPORTED.with(|r| r.borrow_mut().clear());
        let log = DmaLog::<Wire, 16, 4, 16>::new();
        log.init(Wire::default(), record).ok();
        log.write(b"abcdefgh");
        log.process();
        log.on_tx_complete();
        log.on_tx_complete();
        log.on_tx_complete();
        assert!(REPORTED.with(|r| r.borrow().is_empty()));
    }
}
