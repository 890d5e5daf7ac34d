//! Clock for bounded waiting.

use dma_log::Clock;
use embedded_hal::blocking::delay::DelayMs;

use crate::app::monotonics;

/// Millisecond clock based on the system timer, delaying by busy waiting.
///
/// Keeps working from the idle task while interrupts are serviced.
pub struct MonoClock {
    cycles_per_ms: u32,
}

impl MonoClock {
    /// Creates the clock for a CPU running at `sysclk` Hz.
    pub fn new(sysclk: u32) -> Self {
        Self { cycles_per_ms: sysclk / 1000 }
    }
}

impl DelayMs<u32> for MonoClock {
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            cortex_m::asm::delay(self.cycles_per_ms);
        }
    }
}

impl Clock for MonoClock {
    fn millis(&mut self) -> u32 {
        monotonics::now().duration_since_epoch().to_millis() as u32
    }
}
