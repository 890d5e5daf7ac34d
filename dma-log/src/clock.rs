//! Time source for bounded waiting.

use embedded_hal::blocking::delay::DelayMs;

/// Monotonic millisecond clock with blocking delay.
///
/// The tick may wrap around, elapsed time is computed by wrapping subtraction.
pub trait Clock: DelayMs<u32> {
    /// Current tick in milliseconds.
    fn millis(&mut self) -> u32;
}
